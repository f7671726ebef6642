// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait to stack SegmentationItems
// into device tensors.
//
// Items are stored channels-last (H, W, C) like the image files
// and the .npy arrays. Burn's Conv2d wants channels-first, so
// the stacked batch is permuted once here:
//
//   Vec of N items × (H·W·C) floats
//       │  flatten + reshape
//       ▼
//   [N, H, W, C]
//       │  permute [0, 3, 1, 2]
//       ▼
//   [N, C, H, W]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SegmentationItem;

/// Input image channels (RGB)
pub const IMAGE_CHANNELS: usize = 3;

// ─── SegmentationBatch ────────────────────────────────────────────────────────
/// A batch ready for the U-Net forward pass, channels-first.
#[derive(Debug, Clone)]
pub struct SegmentationBatch<B: Backend> {
    /// Normalised photographs, shape [batch, 3, height, width]
    pub images: Tensor<B, 4>,

    /// Target masks in [0, 1], shape [batch, mask_channels, height, width]
    pub masks: Tensor<B, 4>,
}

// ─── SegmentationBatcher ──────────────────────────────────────────────────────
/// Holds the target device and the fixed image geometry.
#[derive(Clone, Debug)]
pub struct SegmentationBatcher<B: Backend> {
    device:        B::Device,
    height:        usize,
    width:         usize,
    mask_channels: usize,
}

impl<B: Backend> SegmentationBatcher<B> {
    pub fn new(device: B::Device, height: usize, width: usize, mask_channels: usize) -> Self {
        Self { device, height, width, mask_channels }
    }
}

impl<B: Backend> Batcher<SegmentationItem, SegmentationBatch<B>> for SegmentationBatcher<B> {
    fn batch(&self, items: Vec<SegmentationItem>) -> SegmentationBatch<B> {
        let n = items.len();

        let image_flat: Vec<f32> = items.iter().flat_map(|s| s.image.iter().copied()).collect();
        let mask_flat:  Vec<f32> = items.iter().flat_map(|s| s.mask.iter().copied()).collect();

        let images = channels_last_to_tensor(
            image_flat,
            [n, self.height, self.width, IMAGE_CHANNELS],
            &self.device,
        );
        let masks = channels_last_to_tensor(
            mask_flat,
            [n, self.height, self.width, self.mask_channels],
            &self.device,
        );

        SegmentationBatch { images, masks }
    }
}

/// Build an [N, C, H, W] tensor from flat channels-last values of `shape` = [N, H, W, C]
pub fn channels_last_to_tensor<B: Backend>(
    values: Vec<f32>,
    shape:  [usize; 4],
    device: &B::Device,
) -> Tensor<B, 4> {
    Tensor::<B, 4>::from_data(TensorData::new(values, shape), device).permute([0, 3, 1, 2])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_is_channels_first() {
        let device  = Default::default();
        let batcher = SegmentationBatcher::<TestBackend>::new(device, 2, 4, 1);

        let item = SegmentationItem {
            image: vec![0.5; 2 * 4 * 3],
            mask:  vec![1.0; 2 * 4],
        };
        let batch = batcher.batch(vec![item.clone(), item]);

        assert_eq!(batch.images.dims(), [2, 3, 2, 4]);
        assert_eq!(batch.masks.dims(),  [2, 1, 2, 4]);
    }

    #[test]
    fn test_channel_values_land_on_their_plane() {
        let device = Default::default();
        // one 1x2 image: pixel0 = (1, 2, 3), pixel1 = (4, 5, 6)
        let tensor = channels_last_to_tensor::<TestBackend>(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            [1, 1, 2, 3],
            &device,
        );

        let values = tensor.into_data().to_vec::<f32>().unwrap();
        // channel-major: R plane, G plane, B plane
        assert_eq!(values, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
