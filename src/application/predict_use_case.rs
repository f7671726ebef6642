// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Orchestrates mask prediction for a folder of raw photographs:
//
//   Step 1: Load the trained network          (Layer 5 - ml)
//   Step 2: List *_raw.jpg inputs             (Layer 4 - scanner)
//   Step 3: Decode into one (N, H, W, 3) batch (Layer 4 - loader)
//   Step 4: Predict one mask per image        (Layer 5 - ml)
//   Step 5: Write <id>_mask.png per input     (Layer 4 - loader)

use anyhow::{Context, Result};
use burn::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{array::U8Array, batcher::IMAGE_CHANNELS, loader, scanner::RawScanner};
use crate::domain::traits::RawSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Predictor;

#[derive(Debug, Clone)]
pub struct PredictConfig {
    /// Directory holding *_raw.jpg files
    pub input_dir:      String,
    /// Where <id>_mask.png files are written (created if missing)
    pub output_dir:     String,
    pub checkpoint_dir: String,
    /// Explicit weights file; best weights, then final model, otherwise
    pub weights:        Option<String>,
    /// Images per forward pass
    pub batch_size:     usize,
}

// ─── PredictUseCase ───────────────────────────────────────────────────────────
pub struct PredictUseCase<B: Backend> {
    config:    PredictConfig,
    predictor: Predictor<B>,
}

impl<B: Backend> PredictUseCase<B> {
    /// Load the network once so several folders can share it
    pub fn new(config: PredictConfig, device: B::Device) -> Result<Self> {
        let ckpt_manager = CheckpointManager::new(&config.checkpoint_dir)?;
        let predictor    = Predictor::from_checkpoint(
            &ckpt_manager,
            config.weights.as_deref().map(Path::new),
            config.batch_size,
            device,
        )?;
        Ok(Self { config, predictor })
    }

    /// Returns the number of masks written
    pub fn execute(&self) -> Result<usize> {
        let cfg = &self.config;

        let out = PathBuf::from(&cfg.output_dir);
        fs::create_dir_all(&out)
            .with_context(|| format!("Cannot create output directory '{}'", out.display()))?;

        // ── Step 2: List inputs ───────────────────────────────────────────────
        let raws = RawScanner::new(&cfg.input_dir).load_raws()?;

        // ── Step 3: Decode ────────────────────────────────────────────────────
        let (height, width) = (self.predictor.height(), self.predictor.width());
        let mut images      = U8Array::with_capacity(raws.len(), height, width, IMAGE_CHANNELS);
        for raw in &raws {
            images.push(loader::load_rgb(&raw.path, height, width)?.as_raw())?;
        }

        // ── Step 4: Predict ───────────────────────────────────────────────────
        let masks = self.predictor.predict(&images)?;

        // ── Step 5: Write masks ───────────────────────────────────────────────
        for (raw, mask) in raws.iter().zip(masks) {
            let path = out.join(raw.id.predicted_mask_file_name());
            loader::save_mask(&path, height, width, mask)?;
        }

        tracing::info!("Wrote {} masks to '{}'", raws.len(), out.display());
        Ok(raws.len())
    }
}
