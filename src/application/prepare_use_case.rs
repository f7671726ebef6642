// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns two image folders into the dense arrays training reads:
//
//   Step 1: Pair raws with masks by identifier   (Layer 4 - scanner)
//   Step 2: Decode and size-check every image    (Layer 4 - loader)
//   Step 3: Stack into (N, H, W, 3) u8 arrays    (Layer 4 - array)
//   Step 4: Write x_train.npy, y_train.npy and train_ids.json
//
// Index i of both arrays and of train_ids.json is the same sample.
// No split happens here; training holds out the validation tail.

use anyhow::{ensure, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::{array::U8Array, batcher::IMAGE_CHANNELS, loader, scanner::PairScanner};
use crate::domain::{
    sample::SampleId,
    traits::{PairSource, Persistable},
};

pub const X_TRAIN:   &str = "x_train.npy";
pub const Y_TRAIN:   &str = "y_train.npy";
pub const TRAIN_IDS: &str = "train_ids.json";

#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub raws_dir:   String,
    pub masks_dir:  String,
    /// Where the .npy files and the id list are written
    pub output_dir: String,
    pub height:     usize,
    pub width:      usize,
}

/// The stacked arrays plus the identifier of every row
#[derive(Debug)]
pub struct PreparedSet {
    pub ids:    Vec<SampleId>,
    pub images: U8Array,
    pub masks:  U8Array,
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Build and persist the training arrays
    pub fn execute(&self) -> Result<PreparedSet> {
        let cfg = &self.config;

        // ── Step 1: Pair files ────────────────────────────────────────────────
        let pairs = PairScanner::new(&cfg.raws_dir, &cfg.masks_dir).load_pairs()?;

        // ── Step 2+3: Decode into stacks ──────────────────────────────────────
        let mut ids    = Vec::with_capacity(pairs.len());
        let mut images = U8Array::with_capacity(pairs.len(), cfg.height, cfg.width, IMAGE_CHANNELS);
        let mut masks  = U8Array::with_capacity(pairs.len(), cfg.height, cfg.width, IMAGE_CHANNELS);

        for pair in pairs {
            let raw  = loader::load_rgb(&pair.raw, cfg.height, cfg.width)?;
            let mask = loader::load_rgb(&pair.mask, cfg.height, cfg.width)?;
            images.push(raw.as_raw())?;
            masks.push(mask.as_raw())?;
            tracing::debug!("Loaded sample '{}'", pair.id);
            ids.push(pair.id);
        }

        // ── Step 4: Persist ───────────────────────────────────────────────────
        let out = PathBuf::from(&cfg.output_dir);
        fs::create_dir_all(&out)
            .with_context(|| format!("Cannot create output directory '{}'", out.display()))?;

        images.save(&out.join(X_TRAIN))?;
        masks.save(&out.join(Y_TRAIN))?;

        let ids_path = out.join(TRAIN_IDS);
        fs::write(&ids_path, serde_json::to_string_pretty(&ids)?)
            .with_context(|| format!("Cannot write '{}'", ids_path.display()))?;

        tracing::info!(
            "Saved {} samples of shape {:?} to '{}'",
            ids.len(),
            &images.shape()[1..],
            out.display()
        );

        Ok(PreparedSet { ids, images, masks })
    }
}

/// Load x_train.npy and y_train.npy from `dir`, checking they line up
pub fn load_prepared(dir: &Path) -> Result<(U8Array, U8Array)> {
    let images = U8Array::load(&dir.join(X_TRAIN))
        .with_context(|| format!("Have you run 'prepare' into '{}'?", dir.display()))?;
    let masks  = U8Array::load(&dir.join(Y_TRAIN))?;

    ensure!(
        images.shape() == masks.shape(),
        "{X_TRAIN} has shape {:?} but {Y_TRAIN} has shape {:?}",
        images.shape(),
        masks.shape()
    );
    ensure!(!images.is_empty(), "{X_TRAIN} holds no samples");

    Ok((images, masks))
}
