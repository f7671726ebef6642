// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores network weights with Burn's named
// MessagePack recorder at full precision, so a reloaded network
// produces the same outputs bit for bit.
//
// File naming convention:
//   checkpoints/
//     weights00000000.mpk     ← after training step 0
//     weights00000001.mpk     ← after training step 1 (every N steps)
//     ...
//     weights_checkpoint.mpk  ← best monitored loss so far
//     model.mpk               ← network at the end of training
//     train_config.json       ← network + normalisation config
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::UNet;

/// Best-weights file stem
pub const BEST_WEIGHTS: &str = "weights_checkpoint";

/// Final-model file stem
pub const FINAL_MODEL: &str = "model";

pub const CONFIG_FILE: &str = "train_config.json";

/// Extension the recorder appends to every weights file
pub const WEIGHTS_EXTENSION: &str = "mpk";

type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Manages saving and loading of weight files and the training config.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Save the periodic weights file for training step `step`
    pub fn save_step<B: Backend>(&self, model: &UNet<B>, step: usize) -> Result<PathBuf> {
        self.record(model, self.step_path(step))
    }

    /// Overwrite the best-weights file
    pub fn save_best<B: Backend>(&self, model: &UNet<B>) -> Result<PathBuf> {
        self.save_weights(model, BEST_WEIGHTS)
    }

    pub fn save_final<B: Backend>(&self, model: &UNet<B>) -> Result<PathBuf> {
        self.save_weights(model, FINAL_MODEL)
    }

    /// Write `model`'s parameters to `{dir}/{name}.mpk`
    pub fn save_weights<B: Backend>(&self, model: &UNet<B>, name: &str) -> Result<PathBuf> {
        self.record(model, self.weights_path(name))
    }

    fn record<B: Backend>(&self, model: &UNet<B>, path: PathBuf) -> Result<PathBuf> {
        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;

        tracing::debug!("Saved weights to '{}'", path.display());
        Ok(path)
    }

    /// Load a weights file into `model`.
    ///
    /// The model must have the architecture the weights were saved
    /// from, or loading fails.
    pub fn load_weights<B: Backend>(
        &self,
        model:  UNet<B>,
        path:   &Path,
        device: &B::Device,
    ) -> Result<UNet<B>> {
        let record = WeightsRecorder::new()
            .load(path.to_path_buf(), device)
            .with_context(|| {
                format!("Cannot load weights '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Pick the weights file to predict with.
    ///
    /// An explicit path wins. Otherwise the best-weights file, then
    /// the final model.
    pub fn resolve_weights(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            let with_ext = path.with_extension(WEIGHTS_EXTENSION);
            if path.is_file() || with_ext.is_file() {
                return Ok(path.to_path_buf());
            }
            bail!("Weights file '{}' does not exist", path.display());
        }

        for candidate in [self.best_path(), self.final_path()] {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        bail!(
            "No weights found in '{}'. Have you run 'train' first?",
            self.dir.display()
        )
    }

    pub fn weights_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{WEIGHTS_EXTENSION}"))
    }

    pub fn step_path(&self, step: usize) -> PathBuf {
        self.weights_path(&format!("weights{step:08}"))
    }

    pub fn best_path(&self) -> PathBuf {
        self.weights_path(BEST_WEIGHTS)
    }

    pub fn final_path(&self) -> PathBuf {
        self.weights_path(FINAL_MODEL)
    }

    /// Save the training configuration to JSON.
    ///
    /// Must run before training starts so `predict` can rebuild
    /// the network and reuse the normalisation policy.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed training config '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{Activation, OutputActivation, UNetConfig};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn tiny() -> UNetConfig {
        UNetConfig::new(4, 4, 1)
            .with_depth(1)
            .with_base_filters(2)
            .with_activation(Activation::Elu)
            .with_output_activation(OutputActivation::Sigmoid)
    }

    #[test]
    fn test_weights_round_trip_is_bit_identical() {
        let dir    = TempDir::new().unwrap();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();

        let trained: UNet<TestBackend> = tiny().init(&device).unwrap();
        let path = ckpt.save_final(&trained).unwrap();
        assert_eq!(path, ckpt.final_path());

        let fresh: UNet<TestBackend> = tiny().init(&device).unwrap();
        let loaded = ckpt.load_weights(fresh, &path, &device).unwrap();

        let input    = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device).mul_scalar(0.25);
        let expected = trained.forward(input.clone()).into_data().to_vec::<f32>().unwrap();
        let actual   = loaded.forward(input).into_data().to_vec::<f32>().unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_step_files_are_zero_padded() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let model: UNet<TestBackend> = tiny().init(&Default::default()).unwrap();

        let path = ckpt.save_step(&model, 7).unwrap();
        assert_eq!(path, ckpt.step_path(7));
        assert_eq!(path.file_name().unwrap(), "weights00000007.mpk");
        assert!(path.exists());
    }

    #[test]
    fn test_resolve_prefers_best_then_final() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let model: UNet<TestBackend> = tiny().init(&Default::default()).unwrap();

        assert!(ckpt.resolve_weights(None).is_err());

        ckpt.save_final(&model).unwrap();
        assert_eq!(ckpt.resolve_weights(None).unwrap(), ckpt.final_path());

        ckpt.save_best(&model).unwrap();
        assert_eq!(ckpt.resolve_weights(None).unwrap(), ckpt.best_path());

        let explicit = ckpt.final_path();
        assert_eq!(ckpt.resolve_weights(Some(&explicit)).unwrap(), explicit);
        assert!(ckpt.resolve_weights(Some(Path::new("missing.mpk"))).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("nested")).unwrap();

        assert!(ckpt.load_config().is_err());

        let cfg = TrainConfig::default();
        ckpt.save_config(&cfg).unwrap();
        let back = ckpt.load_config().unwrap();
        assert_eq!(back.model.height, cfg.model.height);
        assert_eq!(back.normalization, cfg.normalization);
    }
}
