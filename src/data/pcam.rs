use crate::error::{BenchError, Result};
use std::fs;
use std::path::Path;

/// PatchCamelyon, pre-exported from the upstream HDF5 archives into flat
/// binary dumps: `<split>_x.bin` holds one 3x96x96 channel-planar u8 image
/// per sample and `<split>_y.bin` one 0/1 label byte per sample.
const SAMPLE_LEN: usize = 3 * 96 * 96;

/// Load one PCam split ("train" or "test") from a directory of dumps.
/// Returns (pixels normalized to [0, 1] in CHW order, labels).
pub fn load_split(dir: &Path, split: &str) -> Result<(Vec<f32>, Vec<u8>)> {
    let labels = fs::read(dir.join(format!("{split}_y.bin")))?;
    let pixels = fs::read(dir.join(format!("{split}_x.bin")))?;

    if pixels.len() != labels.len() * SAMPLE_LEN {
        return Err(BenchError::InvalidData(format!(
            "pcam {split}: {} pixel bytes for {} labels (expected {SAMPLE_LEN} per sample)",
            pixels.len(),
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l > 1) {
        return Err(BenchError::InvalidData(format!(
            "pcam {split}: label {bad} outside the binary {{0, 1}} range"
        )));
    }

    let images: Vec<f32> = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
    Ok((images, labels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_matching_dumps() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("test_y.bin"), [0u8, 1]).unwrap();
        fs::write(dir.path().join("test_x.bin"), vec![128u8; 2 * SAMPLE_LEN]).unwrap();

        let (images, labels) = load_split(dir.path(), "test").unwrap();
        assert_eq!(labels, vec![0, 1]);
        assert_eq!(images.len(), 2 * SAMPLE_LEN);
    }

    #[test]
    fn rejects_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train_y.bin"), [0u8, 1]).unwrap();
        fs::write(dir.path().join("train_x.bin"), vec![0u8; SAMPLE_LEN]).unwrap();
        assert!(matches!(
            load_split(dir.path(), "train"),
            Err(BenchError::InvalidData(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_label() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train_y.bin"), [2u8]).unwrap();
        fs::write(dir.path().join("train_x.bin"), vec![0u8; SAMPLE_LEN]).unwrap();
        assert!(load_split(dir.path(), "train").is_err());
    }
}
