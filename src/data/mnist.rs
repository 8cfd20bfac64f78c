use crate::error::{BenchError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load images from an IDX format file (MNIST and Fashion-MNIST).
/// Returns flattened image data (all images concatenated), normalized to [0, 1].
pub fn load_mnist_images<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let mut file = File::open(path)?;

    // Read header (16 bytes)
    let mut header = [0u8; 16];
    file.read_exact(&mut header)?;

    // Parse header (big-endian)
    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != 0x0000_0803 {
        return Err(BenchError::InvalidData(format!(
            "invalid IDX image magic number: 0x{magic:08x}"
        )));
    }

    let num_images = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let rows = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let cols = u32::from_be_bytes([header[12], header[13], header[14], header[15]]) as usize;

    let num_pixels = num_images * rows * cols;
    let mut pixels = vec![0u8; num_pixels];
    file.read_exact(&mut pixels)?;

    let data: Vec<f32> = pixels.iter().map(|&p| f32::from(p) / 255.0).collect();
    Ok(data)
}

/// Load labels from an IDX format file.
pub fn load_mnist_labels<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;

    // Read header (8 bytes)
    let mut header = [0u8; 8];
    file.read_exact(&mut header)?;

    let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    if magic != 0x0000_0801 {
        return Err(BenchError::InvalidData(format!(
            "invalid IDX label magic number: 0x{magic:08x}"
        )));
    }

    let num_labels = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let mut labels = vec![0u8; num_labels];
    file.read_exact(&mut labels)?;

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_idx_images(path: &Path, images: &[u8], count: u32, dim: u32) {
        let mut f = File::create(path).unwrap();
        f.write_all(&0x0000_0803u32.to_be_bytes()).unwrap();
        f.write_all(&count.to_be_bytes()).unwrap();
        f.write_all(&dim.to_be_bytes()).unwrap();
        f.write_all(&dim.to_be_bytes()).unwrap();
        f.write_all(images).unwrap();
    }

    #[test]
    fn roundtrips_idx_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imgs");
        write_idx_images(&path, &[0, 128, 255, 64], 1, 2);

        let data = load_mnist_images(&path).unwrap();
        assert_eq!(data.len(), 4);
        assert!((data[1] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(data[2], 1.0);
    }

    #[test]
    fn rejects_wrong_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad");
        let mut f = File::create(&path).unwrap();
        f.write_all(&[0u8; 16]).unwrap();
        assert!(matches!(
            load_mnist_images(&path),
            Err(BenchError::InvalidData(_))
        ));
    }
}
