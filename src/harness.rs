use crate::config::{load_configs, Config};
use crate::data::DatasetKind;
use crate::error::Result;
use crate::models::ModelKind;
use crate::train::{train_and_evaluate, TrainOutcome};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Loss curves for one run, keyed `model_<index>` in the losses file.
#[derive(Debug, Clone, Serialize)]
pub struct LossHistory {
    pub train_losses: Vec<f32>,
    pub val_losses: Vec<f32>,
}

/// The three files a `(model, dataset)` pair reads and writes.
pub struct RunPaths {
    pub configs: PathBuf,
    pub results_csv: PathBuf,
    pub losses_json: PathBuf,
}

impl RunPaths {
    pub fn new(model: ModelKind, dataset: DatasetKind, config_dir: &Path, output_dir: &Path) -> Self {
        let suffix = format!("{}_{}", model.as_str(), dataset.as_str());
        RunPaths {
            configs: config_dir.join(format!("best_configs_{suffix}.json")),
            results_csv: output_dir.join(format!("results_{suffix}.csv")),
            losses_json: output_dir.join(format!("losses_{suffix}.json")),
        }
    }
}

/// One CSV row: the run index, the configuration verbatim, then the derived
/// columns. Kept as an ordered map so the column order is stable across the
/// header and every row.
fn result_record(index: usize, config: &Config, outcome: &TrainOutcome) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert("model_index".to_string(), Value::from(index as u64));
    for (key, value) in config.fields() {
        record.insert(key.clone(), value.clone());
    }
    record.insert("num_params".to_string(), Value::from(outcome.num_params as u64));
    record.insert("accuracy".to_string(), Value::from(outcome.report.accuracy));
    record.insert("f1".to_string(), Value::from(outcome.report.f1));
    record.insert("precision".to_string(), Value::from(outcome.report.precision));
    record.insert("recall".to_string(), Value::from(outcome.report.recall));
    record
}

fn value_to_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append one record to the results CSV, writing the header first only when
/// the file is empty. A rerun that appends to an existing file therefore
/// never duplicates the header.
fn append_csv_row(path: &Path, record: &Map<String, Value>) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    let mut writer = csv::Writer::from_writer(file);
    if needs_header {
        writer.write_record(record.keys())?;
    }
    writer.write_record(record.values().map(value_to_field))?;
    writer.flush()?;
    Ok(())
}

fn write_csv(path: &Path, records: &[Map<String, Value>]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    if let Some(first) = records.first() {
        writer.write_record(first.keys())?;
    }
    for record in records {
        writer.write_record(record.values().map(value_to_field))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_losses(path: &Path, losses: &[(String, LossHistory)]) -> Result<()> {
    let mut map = Map::new();
    for (key, history) in losses {
        map.insert(key.clone(), serde_json::to_value(history)?);
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &map)?;
    Ok(())
}

/// Train every configuration in the tuned list for `(model, dataset)`,
/// persisting results as they arrive.
///
/// After each run one row is appended to the results CSV and the losses
/// file is rewritten whole, so a crash mid-sweep loses at most the run in
/// flight. Both files are rewritten from the in-memory state once the sweep
/// completes.
pub fn run_all(
    model: ModelKind,
    dataset: DatasetKind,
    config_dir: &Path,
    output_dir: &Path,
    data_root: Option<&Path>,
) -> Result<()> {
    fs::create_dir_all(output_dir)?;
    let paths = RunPaths::new(model, dataset, config_dir, output_dir);
    let configs = load_configs(&paths.configs)?;
    info!(
        "{} configurations for {} on {}",
        configs.len(),
        model.as_str(),
        dataset.as_str()
    );

    let mut records: Vec<Map<String, Value>> = Vec::with_capacity(configs.len());
    let mut losses: Vec<(String, LossHistory)> = Vec::with_capacity(configs.len());

    for (index, config) in configs.iter().enumerate() {
        info!("training model {}/{}", index + 1, configs.len());
        let outcome = train_and_evaluate(config, model, dataset, data_root)?;
        info!(
            "model {}: accuracy {:.4}, f1 {:.4}",
            index, outcome.report.accuracy, outcome.report.f1
        );

        let record = result_record(index, config, &outcome);
        append_csv_row(&paths.results_csv, &record)?;
        records.push(record);

        losses.push((
            format!("model_{index}"),
            LossHistory {
                train_losses: outcome.train_losses,
                val_losses: outcome.val_losses,
            },
        ));
        write_losses(&paths.losses_json, &losses)?;
    }

    write_csv(&paths.results_csv, &records)?;
    write_losses(&paths.losses_json, &losses)?;
    info!("results written to {}", paths.results_csv.display());
    info!("loss histories written to {}", paths.losses_json.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ClassificationReport;
    use pretty_assertions::assert_eq;

    fn outcome() -> TrainOutcome {
        TrainOutcome {
            train_losses: vec![1.0, 0.5],
            val_losses: vec![1.1, 0.6],
            report: ClassificationReport {
                accuracy: 0.9,
                f1: 0.89,
                precision: 0.91,
                recall: 0.9,
            },
            num_params: 1234,
        }
    }

    fn config() -> Config {
        serde_json::from_str(r#"{"batch_size": 32, "learning_rate": 0.001}"#).unwrap()
    }

    #[test]
    fn record_column_order_is_index_config_derived() {
        let record = result_record(0, &config(), &outcome());
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "model_index",
                "batch_size",
                "learning_rate",
                "num_params",
                "accuracy",
                "f1",
                "precision",
                "recall"
            ]
        );
    }

    #[test]
    fn append_writes_header_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let record = result_record(0, &config(), &outcome());
        append_csv_row(&path, &record).unwrap();
        append_csv_row(&path, &result_record(1, &config(), &outcome())).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("model_index,batch_size"));
        assert!(lines[1].starts_with("0,32,"));
        assert!(lines[2].starts_with("1,32,"));
    }

    #[test]
    fn rewrite_matches_incremental_output() {
        let dir = tempfile::tempdir().unwrap();
        let incremental = dir.path().join("a.csv");
        let rewritten = dir.path().join("b.csv");

        let records: Vec<_> = (0..3)
            .map(|i| result_record(i, &config(), &outcome()))
            .collect();
        for record in &records {
            append_csv_row(&incremental, record).unwrap();
        }
        write_csv(&rewritten, &records).unwrap();

        assert_eq!(
            fs::read_to_string(&incremental).unwrap(),
            fs::read_to_string(&rewritten).unwrap()
        );
    }

    #[test]
    fn losses_file_keys_runs_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("losses.json");
        let losses = vec![
            (
                "model_0".to_string(),
                LossHistory {
                    train_losses: vec![1.0],
                    val_losses: vec![2.0],
                },
            ),
            (
                "model_1".to_string(),
                LossHistory {
                    train_losses: vec![0.5],
                    val_losses: vec![0.7],
                },
            ),
        ];
        write_losses(&path, &losses).unwrap();

        let parsed: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let keys: Vec<&str> = parsed.keys().map(String::as_str).collect();
        assert_eq!(keys, ["model_0", "model_1"]);
        assert_eq!(parsed["model_0"]["train_losses"][0], 1.0);
        assert_eq!(parsed["model_1"]["val_losses"][0], 0.7);
    }
}
