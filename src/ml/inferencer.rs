// ============================================================
// Layer 5 — Predictor
// ============================================================
// Rebuilds the trained network from train_config.json, loads a
// weights file into it, and turns (N, H, W, 3) raw images into
// one 8-bit mask per image (output channel 0).
//
// Normalisation runs once over the whole input batch, then the
// forward passes run `batch_size` images at a time.

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::path::Path;

use crate::data::{array::U8Array, batcher::IMAGE_CHANNELS, preprocessor};
use crate::domain::normalization::Normalization;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::UNet;

pub type InferBackend = burn::backend::Wgpu;

pub struct Predictor<B: Backend> {
    model:         UNet<B>,
    normalization: Normalization,
    batch_size:    usize,
    height:        usize,
    width:         usize,
    device:        B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(
        model:         UNet<B>,
        normalization: Normalization,
        batch_size:    usize,
        height:        usize,
        width:         usize,
        device:        B::Device,
    ) -> Self {
        Self { model, normalization, batch_size: batch_size.max(1), height, width, device }
    }

    /// Load the network named by `weights`, or the best/final weights
    /// in the checkpoint directory when `weights` is `None`
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        weights:      Option<&Path>,
        batch_size:   usize,
        device:       B::Device,
    ) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let path  = ckpt_manager.resolve_weights(weights)?;
        let model = cfg.model.init::<B>(&device)?;
        let model = ckpt_manager.load_weights(model, &path, &device)?;
        tracing::info!("Model loaded from '{}' ({} normalisation)", path.display(), cfg.normalization);

        Ok(Self::new(model, cfg.normalization, batch_size, cfg.model.height, cfg.model.width, device))
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// One mask per input image, H*W bytes each, in input order
    pub fn predict(&self, images: &U8Array) -> Result<Vec<Vec<u8>>> {
        let (h, w) = (self.height, self.width);
        ensure!(
            images.height() == h && images.width() == w && images.channels() == IMAGE_CHANNELS,
            "images have shape {:?} but the network expects (N, {h}, {w}, {IMAGE_CHANNELS})",
            images.shape()
        );

        if images.is_empty() {
            return Ok(Vec::new());
        }

        let values     = preprocessor::normalize(images.as_slice(), self.normalization);
        let per_sample = images.sample_len();
        let mut masks  = Vec::with_capacity(images.len());

        for chunk in values.chunks(self.batch_size * per_sample) {
            let count  = chunk.len() / per_sample;
            let input  = Tensor::<B, 4>::from_data(
                TensorData::new(chunk.to_vec(), [count, h, w, IMAGE_CHANNELS]),
                &self.device,
            );
            let output = self.model.forward_channels_last(input);

            let first = output
                .slice([0..count, 0..h, 0..w, 0..1])
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read predictions: {e:?}"))?;

            masks.extend(first.chunks(h * w).map(preprocessor::to_mask_pixels));
            tracing::debug!("Predicted {}/{} masks", masks.len(), images.len());
        }

        Ok(masks)
    }
}
