pub mod cifar;
pub mod mnist;
pub mod pcam;
pub mod transforms;

pub use mnist::{load_mnist_images, load_mnist_labels};
pub use transforms::{normalize, shuffle_pixels, to_one_hot};

use crate::error::{BenchError, Result};
use crate::tensor::{RawTensor, Tensor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

/// Seed for the spatial pixel permutations. Training and test loading both
/// derive their `ShuffleOrder` from this constant, which is what makes the
/// consistency check meaningful rather than vacuous.
pub const SHUFFLE_SEED: u64 = 42;

/// Seed for the train/validation index split.
const SPLIT_SEED: u64 = 7;

// ===== DATASET ENUM =====

/// The closed set of dataset variants the harness knows about.
///
/// Each base dataset comes in a plain flavor and a "shuffled" flavor where a
/// fixed row/column permutation is applied identically to every image, used
/// to probe model robustness to spatial structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DatasetKind {
    #[value(name = "MNIST")]
    Mnist,
    #[value(name = "MNISTshuffled")]
    MnistShuffled,
    #[value(name = "FashMNIST")]
    FashMnist,
    #[value(name = "FashMNISTshuffled")]
    FashMnistShuffled,
    #[value(name = "CIFAR10")]
    Cifar10,
    #[value(name = "CIFAR10shuffled")]
    Cifar10Shuffled,
    #[value(name = "PCam")]
    PCam,
    #[value(name = "PCamshuffled")]
    PCamShuffled,
}

impl DatasetKind {
    /// Name as it appears in config and output file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Mnist => "MNIST",
            DatasetKind::MnistShuffled => "MNISTshuffled",
            DatasetKind::FashMnist => "FashMNIST",
            DatasetKind::FashMnistShuffled => "FashMNISTshuffled",
            DatasetKind::Cifar10 => "CIFAR10",
            DatasetKind::Cifar10Shuffled => "CIFAR10shuffled",
            DatasetKind::PCam => "PCam",
            DatasetKind::PCamShuffled => "PCamshuffled",
        }
    }

    /// Whether this variant applies a fixed spatial pixel permutation.
    pub fn is_shuffled(&self) -> bool {
        matches!(
            self,
            DatasetKind::MnistShuffled
                | DatasetKind::FashMnistShuffled
                | DatasetKind::Cifar10Shuffled
                | DatasetKind::PCamShuffled
        )
    }

    /// Image side length in pixels.
    pub fn image_dim(&self) -> usize {
        match self {
            DatasetKind::Mnist
            | DatasetKind::MnistShuffled
            | DatasetKind::FashMnist
            | DatasetKind::FashMnistShuffled => 28,
            DatasetKind::Cifar10 | DatasetKind::Cifar10Shuffled => 32,
            DatasetKind::PCam | DatasetKind::PCamShuffled => 96,
        }
    }

    /// Number of image channels.
    pub fn channels(&self) -> usize {
        match self {
            DatasetKind::Mnist
            | DatasetKind::MnistShuffled
            | DatasetKind::FashMnist
            | DatasetKind::FashMnistShuffled => 1,
            _ => 3,
        }
    }

    /// Number of target classes.
    pub fn num_classes(&self) -> usize {
        match self {
            DatasetKind::PCam | DatasetKind::PCamShuffled => 2,
            _ => 10,
        }
    }

    /// Directory under the dataset root where this dataset's files live.
    fn subdir(&self) -> &'static str {
        match self {
            DatasetKind::Mnist | DatasetKind::MnistShuffled => "mnist",
            DatasetKind::FashMnist | DatasetKind::FashMnistShuffled => "fashion-mnist",
            DatasetKind::Cifar10 | DatasetKind::Cifar10Shuffled => "cifar-10-batches-bin",
            DatasetKind::PCam | DatasetKind::PCamShuffled => "pcam",
        }
    }

    /// PCam has no default location; a dataset root must be given for it.
    fn requires_data_path(&self) -> bool {
        matches!(self, DatasetKind::PCam | DatasetKind::PCamShuffled)
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MNIST" => Ok(DatasetKind::Mnist),
            "MNISTshuffled" => Ok(DatasetKind::MnistShuffled),
            "FashMNIST" => Ok(DatasetKind::FashMnist),
            "FashMNISTshuffled" => Ok(DatasetKind::FashMnistShuffled),
            "CIFAR10" => Ok(DatasetKind::Cifar10),
            "CIFAR10shuffled" => Ok(DatasetKind::Cifar10Shuffled),
            "PCam" => Ok(DatasetKind::PCam),
            "PCamshuffled" => Ok(DatasetKind::PCamShuffled),
            other => Err(BenchError::UnknownDataset(other.to_string())),
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== SHUFFLE ORDER =====

/// A fixed pair of index permutations (rows, columns) applied identically to
/// every image of a "shuffled" dataset variant.
///
/// Invariant: the order used while loading training data and the order used
/// while loading test data must be identical; see
/// [`ensure_shuffle_consistency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleOrder {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl ShuffleOrder {
    /// Derive the permutation pair for a given image size from a seed.
    /// The same (dim, seed) pair always yields the same permutations.
    pub fn seeded(image_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows: Vec<usize> = (0..image_dim).collect();
        let mut cols: Vec<usize> = (0..image_dim).collect();
        rows.shuffle(&mut rng);
        cols.shuffle(&mut rng);
        ShuffleOrder { rows, cols }
    }
}

/// Verify that the permutations produced during training-data loading match
/// the ones produced during test-data loading. A mismatch means train and
/// test images were scrambled differently, which silently invalidates every
/// metric, so it is a fatal error.
pub fn ensure_shuffle_consistency(
    train: Option<&ShuffleOrder>,
    test: Option<&ShuffleOrder>,
) -> Result<()> {
    if let (Some(a), Some(b)) = (train, test) {
        if a.rows != b.rows {
            return Err(BenchError::ShuffleOrderMismatch { axis: "row" });
        }
        if a.cols != b.cols {
            return Err(BenchError::ShuffleOrderMismatch { axis: "column" });
        }
    }
    Ok(())
}

// ===== DATA LOADER =====

/// Mini-batch iterator over an in-memory dataset.
///
/// Yields `(inputs, targets)` pairs; inputs are shaped
/// `[batch, ...data_shape]` and targets `[batch, ...target_shape]`.
/// The final batch may be smaller than `batch_size`.
#[derive(Debug)]
pub struct DataLoader {
    data: Vec<f32>,
    targets: Vec<f32>,
    data_shape: Vec<usize>, // per-sample shape
    target_shape: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
    indices: Vec<usize>,
    current: usize,
}

impl DataLoader {
    pub fn new(
        data: Vec<f32>,
        targets: Vec<f32>,
        data_shape: &[usize],   // e.g. [1, 28, 28] for MNIST
        target_shape: &[usize], // e.g. [10] for one-hot
        batch_size: usize,
        shuffle: bool,
    ) -> Self {
        let num_samples = data.len() / data_shape.iter().product::<usize>();
        let mut indices: Vec<usize> = (0..num_samples).collect();

        if shuffle {
            indices.shuffle(&mut rand::rng());
        }

        DataLoader {
            data,
            targets,
            data_shape: data_shape.to_vec(),
            target_shape: target_shape.to_vec(),
            batch_size,
            shuffle,
            indices,
            current: 0,
        }
    }

    /// Rewind to the first batch, reshuffling sample order if enabled.
    pub fn reset(&mut self) {
        self.current = 0;
        if self.shuffle {
            self.indices.shuffle(&mut rand::rng());
        }
    }

    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    /// Number of batches per full pass.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }
}

impl Iterator for DataLoader {
    type Item = (Tensor, Tensor);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.indices.len() {
            return None;
        }

        let end = (self.current + self.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.current..end];
        let actual_batch = batch_indices.len();

        let sample_size: usize = self.data_shape.iter().product();
        let target_size: usize = self.target_shape.iter().product();

        let mut batch_data = Vec::with_capacity(actual_batch * sample_size);
        let mut batch_targets = Vec::with_capacity(actual_batch * target_size);

        for &idx in batch_indices {
            let data_start = idx * sample_size;
            let target_start = idx * target_size;
            batch_data.extend_from_slice(&self.data[data_start..data_start + sample_size]);
            batch_targets
                .extend_from_slice(&self.targets[target_start..target_start + target_size]);
        }

        self.current = end;

        let mut batch_shape = vec![actual_batch];
        batch_shape.extend_from_slice(&self.data_shape);
        let mut target_batch_shape = vec![actual_batch];
        target_batch_shape.extend_from_slice(&self.target_shape);

        Some((
            RawTensor::new(batch_data, &batch_shape, false),
            RawTensor::new(batch_targets, &target_batch_shape, false),
        ))
    }
}

// ===== SPLIT LOADING =====

enum Split {
    Train,
    Test,
}

/// Raw images (flat, CHW per sample, normalized to [0, 1]) and labels for one
/// split of a dataset.
fn load_raw(dataset: DatasetKind, split: Split, data_root: Option<&Path>) -> Result<(Vec<f32>, Vec<u8>)> {
    if dataset.requires_data_path() && data_root.is_none() {
        return Err(BenchError::MissingDataPath(dataset.as_str().to_string()));
    }
    let base = data_root.unwrap_or_else(|| Path::new("data"));
    let dir = base.join(dataset.subdir());

    let (images, labels) = match dataset {
        DatasetKind::Mnist
        | DatasetKind::MnistShuffled
        | DatasetKind::FashMnist
        | DatasetKind::FashMnistShuffled => {
            let (img_name, lbl_name) = match split {
                Split::Train => ("train-images-idx3-ubyte", "train-labels-idx1-ubyte"),
                Split::Test => ("t10k-images-idx3-ubyte", "t10k-labels-idx1-ubyte"),
            };
            let images = mnist::load_mnist_images(dir.join(img_name))?;
            let labels = mnist::load_mnist_labels(dir.join(lbl_name))?;
            (images, labels)
        }
        DatasetKind::Cifar10 | DatasetKind::Cifar10Shuffled => match split {
            Split::Train => cifar::load_train_batches(&dir)?,
            Split::Test => cifar::load_batch(dir.join("test_batch.bin"))?,
        },
        DatasetKind::PCam | DatasetKind::PCamShuffled => match split {
            Split::Train => pcam::load_split(&dir, "train")?,
            Split::Test => pcam::load_split(&dir, "test")?,
        },
    };

    let sample_size = dataset.channels() * dataset.image_dim() * dataset.image_dim();
    if images.len() != labels.len() * sample_size {
        return Err(BenchError::InvalidData(format!(
            "{}: {} pixels for {} labels (expected {} per sample)",
            dataset.as_str(),
            images.len(),
            labels.len(),
            sample_size
        )));
    }
    Ok((images, labels))
}

/// Build the training and validation loaders for a dataset.
///
/// The train/validation split is an index split (seeded, so repeated runs see
/// the same partition) at ratio `1 - val_split` / `val_split`. For shuffled
/// variants the generated `ShuffleOrder` is returned so the caller can check
/// it against the one produced by [`load_testing_data`].
pub fn load_training_data(
    dataset: DatasetKind,
    batch_size: usize,
    val_split: f32,
    data_root: Option<&Path>,
) -> Result<(DataLoader, DataLoader, Option<ShuffleOrder>)> {
    let (mut images, labels) = load_raw(dataset, Split::Train, data_root)?;

    let order = if dataset.is_shuffled() {
        let order = ShuffleOrder::seeded(dataset.image_dim(), SHUFFLE_SEED);
        shuffle_pixels(&mut images, dataset.channels(), dataset.image_dim(), &order);
        Some(order)
    } else {
        None
    };

    let targets = to_one_hot(&labels, dataset.num_classes());
    let sample_size = dataset.channels() * dataset.image_dim() * dataset.image_dim();
    let target_size = dataset.num_classes();

    let (train_idx, val_idx) = transforms::split_indices(labels.len(), val_split, SPLIT_SEED);
    let (train_images, train_targets) =
        transforms::gather(&images, &targets, &train_idx, sample_size, target_size);
    let (val_images, val_targets) =
        transforms::gather(&images, &targets, &val_idx, sample_size, target_size);

    let data_shape = [
        dataset.channels(),
        dataset.image_dim(),
        dataset.image_dim(),
    ];
    let train_loader = DataLoader::new(
        train_images,
        train_targets,
        &data_shape,
        &[target_size],
        batch_size,
        true,
    );
    let val_loader = DataLoader::new(
        val_images,
        val_targets,
        &data_shape,
        &[target_size],
        batch_size,
        false,
    );

    Ok((train_loader, val_loader, order))
}

/// Build the test loader for a dataset.
///
/// Shuffled variants regenerate their own `ShuffleOrder` here rather than
/// accepting the training one, so the returned order can prove that both
/// loading paths scrambled pixels the same way.
pub fn load_testing_data(
    dataset: DatasetKind,
    batch_size: usize,
    data_root: Option<&Path>,
) -> Result<(DataLoader, Option<ShuffleOrder>)> {
    let (mut images, labels) = load_raw(dataset, Split::Test, data_root)?;

    let order = if dataset.is_shuffled() {
        let order = ShuffleOrder::seeded(dataset.image_dim(), SHUFFLE_SEED);
        shuffle_pixels(&mut images, dataset.channels(), dataset.image_dim(), &order);
        Some(order)
    } else {
        None
    };

    let targets = to_one_hot(&labels, dataset.num_classes());
    let data_shape = [
        dataset.channels(),
        dataset.image_dim(),
        dataset.image_dim(),
    ];
    let loader = DataLoader::new(
        images,
        targets,
        &data_shape,
        &[dataset.num_classes()],
        batch_size,
        false,
    );

    Ok((loader, order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shuffle_order_is_deterministic_per_seed() {
        let a = ShuffleOrder::seeded(28, SHUFFLE_SEED);
        let b = ShuffleOrder::seeded(28, SHUFFLE_SEED);
        assert_eq!(a, b);
        let c = ShuffleOrder::seeded(28, SHUFFLE_SEED + 1);
        assert_ne!(a, c);
    }

    #[test]
    fn shuffle_order_is_a_permutation() {
        let order = ShuffleOrder::seeded(32, 123);
        let mut rows = order.rows.clone();
        rows.sort_unstable();
        assert_eq!(rows, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn consistency_check_accepts_equal_orders() {
        let a = ShuffleOrder::seeded(28, 1);
        let b = ShuffleOrder::seeded(28, 1);
        assert!(ensure_shuffle_consistency(Some(&a), Some(&b)).is_ok());
        // plain datasets produce no orders at all
        assert!(ensure_shuffle_consistency(None, None).is_ok());
    }

    #[test]
    fn consistency_check_rejects_mismatch() {
        let a = ShuffleOrder::seeded(28, 1);
        let b = ShuffleOrder::seeded(28, 2);
        let err = ensure_shuffle_consistency(Some(&a), Some(&b)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::BenchError::ShuffleOrderMismatch { .. }
        ));
    }

    #[test]
    fn dataset_dimension_lookup() {
        assert_eq!(DatasetKind::Mnist.image_dim(), 28);
        assert_eq!(DatasetKind::Cifar10Shuffled.image_dim(), 32);
        assert_eq!(DatasetKind::PCam.image_dim(), 96);
        assert_eq!(DatasetKind::PCam.num_classes(), 2);
        assert_eq!(DatasetKind::FashMnist.channels(), 1);
        assert_eq!(DatasetKind::Cifar10.channels(), 3);
    }

    #[test]
    fn dataset_parses_from_cli_names() {
        use std::str::FromStr;
        assert_eq!(
            DatasetKind::from_str("FashMNISTshuffled").unwrap(),
            DatasetKind::FashMnistShuffled
        );
        assert!(DatasetKind::from_str("Imagenet").is_err());
    }

    #[test]
    fn loader_batches_cover_all_samples() {
        let data: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let targets = to_one_hot(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1], 2);
        let mut loader = DataLoader::new(data, targets, &[1], &[2], 4, false);
        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = (&mut loader).map(|(x, _)| x.borrow().shape[0]).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn pcam_requires_data_root() {
        let err = load_training_data(DatasetKind::PCam, 8, 0.2, None).unwrap_err();
        assert!(matches!(err, BenchError::MissingDataPath(_)));
    }
}
