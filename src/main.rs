use clap::Parser;
use permubench::{DatasetKind, ModelKind};
use std::path::PathBuf;

/// Train a tuned configuration sweep for one model family on one dataset.
#[derive(Parser)]
#[command(name = "permubench", version, about)]
struct Cli {
    /// Model family to train
    #[arg(long, value_enum)]
    model_type: ModelKind,

    /// Dataset (and permutation variant) to train on
    #[arg(long, value_enum)]
    dataset: DatasetKind,

    /// Directory holding the best_configs_*.json files
    #[arg(long)]
    config_path: PathBuf,

    /// Directory to write results_*.csv and losses_*.json into
    #[arg(long)]
    output_path: PathBuf,

    /// Directory holding the raw dataset files
    #[arg(long)]
    data_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    permubench::run_all(
        cli.model_type,
        cli.dataset,
        &cli.config_path,
        &cli.output_path,
        Some(&cli.data_path),
    )?;
    Ok(())
}
