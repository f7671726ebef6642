// ============================================================
// Layer 4 — Dense u8 Array
// ============================================================
// An in-memory stack of images with shape (N, H, W, C), stored
// row-major exactly like the numpy arrays it is saved as:
//
//   index(n, y, x, c) = ((n * H + y) * W + x) * C + c
//
// The whole dataset is held in memory at once.

use anyhow::{ensure, Context, Result};
use std::{fs, path::Path};

use crate::data::npy;
use crate::domain::traits::Persistable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct U8Array {
    shape: [usize; 4],
    data:  Vec<u8>,
}

impl U8Array {
    /// Wrap raw bytes, checking they fill `shape` exactly
    pub fn new(shape: [usize; 4], data: Vec<u8>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        ensure!(
            data.len() == expected,
            "array data has {} bytes but shape {:?} needs {}",
            data.len(),
            shape,
            expected
        );
        Ok(Self { shape, data })
    }

    /// An empty stack that images of (height, width, channels) can be pushed onto
    pub fn with_capacity(count: usize, height: usize, width: usize, channels: usize) -> Self {
        Self {
            shape: [0, height, width, channels],
            data:  Vec::with_capacity(count * height * width * channels),
        }
    }

    /// Append one image. Its byte length must match one sample exactly.
    pub fn push(&mut self, pixels: &[u8]) -> Result<()> {
        ensure!(
            pixels.len() == self.sample_len(),
            "image has {} bytes but each sample of shape {:?} needs {}",
            pixels.len(),
            &self.shape[1..],
            self.sample_len()
        );
        self.data.extend_from_slice(pixels);
        self.shape[0] += 1;
        Ok(())
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Number of images (first dimension)
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    pub fn channels(&self) -> usize {
        self.shape[3]
    }

    /// Bytes per image: H * W * C
    pub fn sample_len(&self) -> usize {
        self.shape[1] * self.shape[2] * self.shape[3]
    }

    /// Borrow the pixels of image `index`
    pub fn sample(&self, index: usize) -> Option<&[u8]> {
        if index >= self.len() {
            return None;
        }
        let n = self.sample_len();
        Some(&self.data[index * n..(index + 1) * n])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Saved as a numpy `.npy` file with dtype `|u1`
impl Persistable for U8Array {
    fn save(&self, path: &Path) -> Result<()> {
        let bytes = npy::encode(&self.shape, &self.data)?;
        fs::write(path, bytes)
            .with_context(|| format!("Cannot write array to '{}'", path.display()))?;
        tracing::debug!("Saved array {:?} to '{}'", self.shape, path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| {
            format!(
                "Cannot read '{}'. Have you run 'prepare' first?",
                path.display()
            )
        })?;
        let (shape, data) = npy::decode(&bytes)
            .with_context(|| format!("Malformed .npy file '{}'", path.display()))?;

        let shape: [usize; 4] = shape.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!(
                "'{}' has shape {:?}, expected 4 dimensions (N, H, W, C)",
                path.display(),
                shape
            )
        })?;
        Self::new(shape, data.to_vec())
    }
}
