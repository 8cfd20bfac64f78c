use crate::config::Config;
use crate::error::{BenchError, Result};
use crate::nn::{Conv2d, Flatten, Linear, MaxPool2d, ReLU, Sequential};
use std::fmt;
use std::str::FromStr;

/// Which architecture a run trains. The `_3CH` variants are the same
/// architectures sized for three-channel input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    #[value(name = "MLP")]
    Mlp,
    #[value(name = "MLP_3CH")]
    Mlp3ch,
    #[value(name = "CNN")]
    Cnn,
    #[value(name = "CNN_3CH")]
    Cnn3ch,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Mlp => "MLP",
            ModelKind::Mlp3ch => "MLP_3CH",
            ModelKind::Cnn => "CNN",
            ModelKind::Cnn3ch => "CNN_3CH",
        }
    }

    /// MLPs consume flat vectors; convolutional models consume NCHW batches.
    pub fn flattens_input(&self) -> bool {
        matches!(self, ModelKind::Mlp | ModelKind::Mlp3ch)
    }

    pub fn channels(&self) -> usize {
        match self {
            ModelKind::Mlp | ModelKind::Cnn => 1,
            ModelKind::Mlp3ch | ModelKind::Cnn3ch => 3,
        }
    }
}

impl FromStr for ModelKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MLP" => Ok(ModelKind::Mlp),
            "MLP_3CH" => Ok(ModelKind::Mlp3ch),
            "CNN" => Ok(ModelKind::Cnn),
            "CNN_3CH" => Ok(ModelKind::Cnn3ch),
            other => Err(BenchError::UnknownModelType(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantiate a freshly initialized model from a hyperparameter set.
///
/// MLP widths come from `fc1_hidden`/`fc2_hidden`/`fc3_hidden`; CNN channel
/// counts from `cha_input`/`cha_hidden` and the head width from `fc_hidden`.
/// A configuration missing a key its model type needs is rejected here,
/// before any data is loaded.
pub fn build_model(
    kind: ModelKind,
    config: &Config,
    image_dim: usize,
    num_classes: usize,
) -> Result<Sequential> {
    let channels = kind.channels();
    match kind {
        ModelKind::Mlp | ModelKind::Mlp3ch => {
            let input_dim = channels * image_dim * image_dim;
            let fc1 = config.get_usize("fc1_hidden")?;
            let fc2 = config.get_usize("fc2_hidden")?;
            let fc3 = config.get_usize("fc3_hidden")?;
            Ok(Sequential::new(vec![
                Box::new(Linear::new(input_dim, fc1, true)),
                Box::new(ReLU),
                Box::new(Linear::new(fc1, fc2, true)),
                Box::new(ReLU),
                Box::new(Linear::new(fc2, fc3, true)),
                Box::new(ReLU),
                Box::new(Linear::new(fc3, num_classes, true)),
            ]))
        }
        ModelKind::Cnn | ModelKind::Cnn3ch => {
            let cha_input = config.get_usize("cha_input")?;
            let cha_hidden = config.get_usize("cha_hidden")?;
            let fc_hidden = config.get_usize("fc_hidden")?;
            // Two stride-2 pools quarter each spatial side; padding keeps
            // the convolutions size-preserving.
            let pooled = image_dim / 4;
            Ok(Sequential::new(vec![
                Box::new(Conv2d::new(channels, cha_input, 3, 1, 1, true)),
                Box::new(ReLU),
                Box::new(MaxPool2d::new(2, 2)),
                Box::new(Conv2d::new(cha_input, cha_hidden, 3, 1, 1, true)),
                Box::new(ReLU),
                Box::new(MaxPool2d::new(2, 2)),
                Box::new(Flatten),
                Box::new(Linear::new(cha_hidden * pooled * pooled, fc_hidden, true)),
                Box::new(ReLU),
                Box::new(Linear::new(fc_hidden, num_classes, true)),
            ]))
        }
    }
}
