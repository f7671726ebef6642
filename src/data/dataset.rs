use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;

use crate::data::{array::U8Array, preprocessor};
use crate::domain::normalization::Normalization;

/// One normalised (image, mask) pair, both flattened row-major HWC.
/// `image` has 3 channels; `mask` has as many channels as the network head.
#[derive(Debug, Clone)]
pub struct SegmentationItem {
    pub image: Vec<f32>,
    pub mask:  Vec<f32>,
}

pub struct SegmentationDataset {
    items: Vec<SegmentationItem>,
}

impl SegmentationDataset {
    pub fn new(items: Vec<SegmentationItem>) -> Self { Self { items } }

    /// Normalise the prepared arrays into dataset items.
    ///
    /// Images use `policy` over the whole array; masks are rescaled to
    /// [0, 1] and reduced to their first `mask_channels` channels.
    pub fn from_arrays(
        images:        &U8Array,
        masks:         &U8Array,
        policy:        Normalization,
        mask_channels: usize,
    ) -> Result<Self> {
        ensure!(
            images.len() == masks.len(),
            "x_train has {} images but y_train has {} masks",
            images.len(),
            masks.len()
        );
        ensure!(
            images.height() == masks.height() && images.width() == masks.width(),
            "image shape {:?} and mask shape {:?} differ spatially",
            images.shape(),
            masks.shape()
        );
        ensure!(
            mask_channels >= 1 && mask_channels <= masks.channels(),
            "cannot take {} channels from masks with {}",
            mask_channels,
            masks.channels()
        );

        let pixels = images.as_slice();
        let image_values = preprocessor::normalize(pixels, policy);
        let image_len = images.sample_len();

        let items = image_values
            .chunks_exact(image_len)
            .enumerate()
            .map(|(i, image)| {
                // index is in range: both arrays have the same length
                let mask = masks.sample(i).unwrap_or_default();
                SegmentationItem {
                    image: image.to_vec(),
                    mask:  select_channels(mask, masks.channels(), mask_channels),
                }
            })
            .collect();

        Ok(Self { items })
    }

    pub fn sample_count(&self) -> usize { self.items.len() }

    pub fn into_items(self) -> Vec<SegmentationItem> { self.items }
}

/// Keep the first `keep` of every `channels` interleaved values, rescaled to [0, 1]
fn select_channels(pixels: &[u8], channels: usize, keep: usize) -> Vec<f32> {
    if keep == channels {
        return preprocessor::to_unit_range(pixels);
    }
    pixels
        .chunks_exact(channels)
        .flat_map(|px| preprocessor::to_unit_range(&px[..keep]))
        .collect()
}

impl Dataset<SegmentationItem> for SegmentationDataset {
    fn get(&self, index: usize) -> Option<SegmentationItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
