use super::ShuffleOrder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Normalize data in-place: (x - mean) / std
pub fn normalize(data: &mut [f32], mean: f32, std: f32) {
    for x in data.iter_mut() {
        *x = (*x - mean) / std;
    }
}

/// Convert label indices to one-hot encoding
/// labels: [0, 1, 2, ...] -> one-hot vectors concatenated
#[must_use]
pub fn to_one_hot(labels: &[u8], num_classes: usize) -> Vec<f32> {
    let mut one_hot = vec![0.0; labels.len() * num_classes];
    for (i, &label) in labels.iter().enumerate() {
        let idx = i * num_classes + label as usize;
        if let Some(slot) = one_hot.get_mut(idx) {
            *slot = 1.0;
        }
    }
    one_hot
}

/// Apply a fixed row/column permutation to every image in-place.
///
/// `images` holds flat CHW samples of side `image_dim`; the same
/// `ShuffleOrder` is applied to each channel of each image:
/// `out[r][c] = in[rows[r]][cols[c]]`.
pub fn shuffle_pixels(images: &mut [f32], channels: usize, image_dim: usize, order: &ShuffleOrder) {
    assert_eq!(order.rows.len(), image_dim, "row order length mismatch");
    assert_eq!(order.cols.len(), image_dim, "column order length mismatch");

    let plane = image_dim * image_dim;
    assert!(
        images.len().is_multiple_of(channels * plane),
        "image buffer is not whole CHW samples"
    );
    // Permuting plane by plane covers every channel of every sample.
    let mut scratch = vec![0.0; plane];
    for chunk in images.chunks_exact_mut(plane) {
        for r in 0..image_dim {
            let src_row = order.rows[r] * image_dim;
            for c in 0..image_dim {
                scratch[r * image_dim + c] = chunk[src_row + order.cols[c]];
            }
        }
        chunk.copy_from_slice(&scratch);
    }
}

/// Split `0..n` into train and validation index sets.
///
/// The permutation is seeded so every run of the harness sees the same
/// partition; validation takes the trailing `val_split` fraction.
pub fn split_indices(n: usize, val_split: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    assert!((0.0..1.0).contains(&val_split), "val_split must be in [0, 1)");
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let val_count = (n as f32 * val_split).round() as usize;
    let train_count = n - val_count;
    let val = indices.split_off(train_count);
    (indices, val)
}

/// Gather samples (and their targets) by index into fresh, contiguous
/// buffers for a `DataLoader`.
pub fn gather(
    images: &[f32],
    targets: &[f32],
    indices: &[usize],
    sample_size: usize,
    target_size: usize,
) -> (Vec<f32>, Vec<f32>) {
    let mut out_images = Vec::with_capacity(indices.len() * sample_size);
    let mut out_targets = Vec::with_capacity(indices.len() * target_size);
    for &idx in indices {
        out_images.extend_from_slice(&images[idx * sample_size..(idx + 1) * sample_size]);
        out_targets.extend_from_slice(&targets[idx * target_size..(idx + 1) * target_size]);
    }
    (out_images, out_targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let mut data = vec![0.0, 0.5, 1.0];
        normalize(&mut data, 0.5, 0.5);
        assert_eq!(data, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_to_one_hot() {
        let labels = vec![0, 2, 1];
        let one_hot = to_one_hot(&labels, 3);
        // Expected: [1,0,0, 0,0,1, 0,1,0]
        assert_eq!(one_hot, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn shuffle_pixels_permutes_rows_and_columns() {
        // 2x2 image, swap both rows and both columns: full 180° mirror
        let order = ShuffleOrder {
            rows: vec![1, 0],
            cols: vec![1, 0],
        };
        let mut img = vec![1.0, 2.0, 3.0, 4.0];
        shuffle_pixels(&mut img, 1, 2, &order);
        assert_eq!(img, vec![4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn shuffle_pixels_identity_order_is_noop() {
        let order = ShuffleOrder {
            rows: vec![0, 1],
            cols: vec![0, 1],
        };
        let mut img = vec![1.0, 2.0, 3.0, 4.0];
        shuffle_pixels(&mut img, 1, 2, &order);
        assert_eq!(img, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let (train_a, val_a) = split_indices(100, 0.2, 9);
        let (train_b, val_b) = split_indices(100, 0.2, 9);
        assert_eq!(train_a, train_b);
        assert_eq!(val_a, val_b);
        assert_eq!(train_a.len(), 80);
        assert_eq!(val_a.len(), 20);

        let mut all: Vec<usize> = train_a.iter().chain(val_a.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
