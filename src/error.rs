use thiserror::Error;

/// Every failure in this crate is fatal: the harness never retries a
/// configuration, it propagates the error up to `main` and aborts the run.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Shape mismatch: shape {shape:?} has {elements} elements but data length is {len}")]
    ShapeDataMismatch {
        shape: Vec<usize>,
        elements: usize,
        len: usize,
    },

    #[error("Dimension {dim} out of bounds for shape {shape:?}")]
    DimensionOutOfBounds { dim: usize, shape: Vec<usize> },

    #[error("Configuration is missing required key `{0}`")]
    MissingKey(String),

    #[error("Configuration key `{key}` has non-numeric value {value}")]
    InvalidValue { key: String, value: String },

    #[error("Unknown model type `{0}` (expected MLP, MLP_3CH, CNN or CNN_3CH)")]
    UnknownModelType(String),

    #[error("Unknown dataset `{0}`")]
    UnknownDataset(String),

    #[error("Dataset path is required for {0} but none was given")]
    MissingDataPath(String),

    #[error("Shuffle order {axis} permutations differ between training and test loading")]
    ShuffleOrderMismatch { axis: &'static str },

    #[error("Invalid dataset file: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
