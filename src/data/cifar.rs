use crate::error::{BenchError, Result};
use std::fs;
use std::path::Path;

/// One CIFAR-10 binary record: a label byte followed by 3072 pixel bytes
/// (1024 red, 1024 green, 1024 blue), i.e. already channel-planar.
const RECORD_LEN: usize = 1 + 3 * 32 * 32;

/// Load one CIFAR-10 binary batch file.
/// Returns (pixels normalized to [0, 1] in CHW order, labels).
pub fn load_batch<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, Vec<u8>)> {
    let bytes = fs::read(&path)?;
    if bytes.is_empty() || !bytes.len().is_multiple_of(RECORD_LEN) {
        return Err(BenchError::InvalidData(format!(
            "{}: length {} is not a multiple of the {RECORD_LEN}-byte CIFAR record",
            path.as_ref().display(),
            bytes.len()
        )));
    }

    let num_records = bytes.len() / RECORD_LEN;
    let mut images = Vec::with_capacity(num_records * (RECORD_LEN - 1));
    let mut labels = Vec::with_capacity(num_records);

    for record in bytes.chunks_exact(RECORD_LEN) {
        labels.push(record[0]);
        images.extend(record[1..].iter().map(|&p| f32::from(p) / 255.0));
    }

    Ok((images, labels))
}

/// Load and concatenate the five CIFAR-10 training batches.
pub fn load_train_batches(dir: &Path) -> Result<(Vec<f32>, Vec<u8>)> {
    let mut images = Vec::new();
    let mut labels = Vec::new();
    for i in 1..=5 {
        let (imgs, lbls) = load_batch(dir.join(format!("data_batch_{i}.bin")))?;
        images.extend(imgs);
        labels.extend(lbls);
    }
    Ok((images, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.bin");
        let mut f = fs::File::create(&path).unwrap();
        // two records: label 3 with all-zero pixels, label 7 with all-255
        f.write_all(&[3u8]).unwrap();
        f.write_all(&[0u8; RECORD_LEN - 1]).unwrap();
        f.write_all(&[7u8]).unwrap();
        f.write_all(&[255u8; RECORD_LEN - 1]).unwrap();

        let (images, labels) = load_batch(&path).unwrap();
        assert_eq!(labels, vec![3, 7]);
        assert_eq!(images.len(), 2 * 3072);
        assert_eq!(images[0], 0.0);
        assert_eq!(images[3072], 1.0);
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        fs::write(&path, [0u8; 100]).unwrap();
        assert!(matches!(
            load_batch(&path),
            Err(BenchError::InvalidData(_))
        ));
    }
}
