//! Benchmark harness for small vision models under pixel permutation.
//!
//! Trains tuned MLP and CNN configurations on MNIST, Fashion-MNIST,
//! CIFAR-10 and PCam, in their plain and pixel-shuffled variants, and
//! records loss curves plus test-set metrics for every run. The tensor
//! core is a CPU autograd engine; everything above it (data loading,
//! model factory, training loop, result persistence) lives in the
//! harness modules.

pub mod autograd;
pub mod config;
pub mod data;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod models;
pub mod nn;
pub mod ops;
pub mod tensor;
pub mod train;

pub use config::{load_configs, Config};
pub use data::{
    ensure_shuffle_consistency, load_testing_data, load_training_data, DataLoader, DatasetKind,
    ShuffleOrder,
};
pub use error::{BenchError, Result};
pub use harness::run_all;
pub use metrics::{classification_report, ClassificationReport};
pub use models::{build_model, ModelKind};
pub use nn::{Adam, Conv2d, Flatten, Linear, MaxPool2d, Module, ReLU, Sequential};
pub use tensor::{RawTensor, Tensor, TensorOps};
pub use train::{train_and_evaluate, EarlyStopping, TrainOutcome, MAX_EPOCHS, PATIENCE, VAL_SPLIT};
