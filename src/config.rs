use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// One hyperparameter set; the unit of one training run.
///
/// Kept as a raw JSON object (insertion-ordered) rather than a fixed struct:
/// which width keys exist depends on the model type, and every field is
/// copied verbatim into the result record. Typed access goes through
/// [`Config::get_f32`] / [`Config::get_usize`], which turn absent or
/// non-numeric keys into fatal configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(Map<String, Value>);

impl Config {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Config(map)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get_f32(&self, key: &str) -> Result<f32> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| BenchError::MissingKey(key.to_string()))?;
        value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| BenchError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    pub fn get_usize(&self, key: &str) -> Result<usize> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| BenchError::MissingKey(key.to_string()))?;
        value
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| BenchError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    pub fn batch_size(&self) -> Result<usize> {
        self.get_usize("batch_size")
    }

    pub fn learning_rate(&self) -> Result<f32> {
        self.get_f32("learning_rate")
    }
}

/// Load an ordered configuration list from a JSON file.
/// List order is evaluation order and assigns each configuration its index.
pub fn load_configs(path: &Path) -> Result<Vec<Config>> {
    let text = fs::read_to_string(path)?;
    let configs: Vec<Config> = serde_json::from_str(&text)?;
    Ok(configs)
}
