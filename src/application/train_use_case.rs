// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load x_train.npy / y_train.npy   (Layer 4 - data)
//   Step 2: Normalise into dataset items     (Layer 4 - data)
//   Step 3: Split off the validation tail    (Layer 4 - data)
//   Step 4: Save config                      (Layer 6 - infra)
//   Step 5: Run training loop                (Layer 5 - ml)
//   Step 6: Save the final model             (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr};

use crate::application::prepare_use_case::load_prepared;
use crate::data::{
    batcher::IMAGE_CHANNELS,
    dataset::SegmentationDataset,
    splitter::split_trailing,
};
use crate::domain::normalization::Normalization;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::{Activation, OutputActivation, UNetConfig};
use crate::ml::trainer::{self, TrainingReport};

// ─── Profiles ─────────────────────────────────────────────────────────────────
/// The two network/optimiser presets the tool ships with.
///
///   rgb-mask    800×1200, 4 stages, ReLU, 3-channel ReLU head, AdaGrad with decay
///   binary-mask 800×1216, 5 stages, ELU + dropout 0.05, 1-channel sigmoid head, Adam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    #[default]
    RgbMask,
    BinaryMask,
}

impl Profile {
    pub fn image_size(self) -> (usize, usize) {
        match self {
            Self::RgbMask    => (800, 1200),
            Self::BinaryMask => (800, 1216),
        }
    }

    pub fn model_config(self) -> UNetConfig {
        let (height, width) = self.image_size();
        match self {
            Self::RgbMask => UNetConfig::new(height, width, 3)
                .with_depth(4)
                .with_activation(Activation::Relu)
                .with_output_activation(OutputActivation::Relu)
                .with_dropout(0.0),
            Self::BinaryMask => UNetConfig::new(height, width, 1)
                .with_depth(5)
                .with_activation(Activation::Elu)
                .with_output_activation(OutputActivation::Sigmoid)
                .with_dropout(0.05),
        }
    }

    pub fn optimizer(self) -> OptimizerKind {
        match self {
            Self::RgbMask    => OptimizerKind::AdaGrad,
            Self::BinaryMask => OptimizerKind::Adam,
        }
    }

    pub fn learning_rate(self) -> f64 {
        match self {
            Self::RgbMask    => 1e-2,
            Self::BinaryMask => 1e-4,
        }
    }

    pub fn lr_decay(self) -> f64 {
        match self {
            Self::RgbMask    => 0.01,
            Self::BinaryMask => 0.0,
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb-mask"    => Ok(Self::RgbMask),
            "binary-mask" => Ok(Self::BinaryMask),
            other => Err(format!(
                "unknown profile '{other}' (expected 'rgb-mask' or 'binary-mask')"
            )),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RgbMask    => f.write_str("rgb-mask"),
            Self::BinaryMask => f.write_str("binary-mask"),
        }
    }
}

/// First-order optimiser used for the weight updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerKind {
    /// Adaptive per-parameter moments
    Adam,
    /// Accumulated squared gradients, learning rate decayed per step
    AdaGrad,
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adam"    => Ok(Self::Adam),
            "adagrad" => Ok(Self::AdaGrad),
            other => Err(format!("unknown optimizer '{other}' (expected 'adam' or 'adagrad')")),
        }
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved to train_config.json so `predict` can rebuild the exact network
// and apply the same normalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Directory holding x_train.npy / y_train.npy
    pub data_dir:         String,
    pub checkpoint_dir:   String,
    pub logs_dir:         String,
    pub profile:          Profile,
    pub model:            UNetConfig,
    pub optimizer:        OptimizerKind,
    pub lr:               f64,
    pub lr_decay:         f64,
    pub batch_size:       usize,
    pub epochs:           usize,
    /// Save weights every N training steps
    pub checkpoint_every: usize,
    /// Trailing fraction held out for validation
    pub validation_split: f64,
    pub normalization:    Normalization,
    /// Seed for shuffling training batches
    pub seed:             u64,
}

impl TrainConfig {
    /// Defaults for `profile`
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            data_dir:         ".".to_string(),
            checkpoint_dir:   "checkpoints".to_string(),
            logs_dir:         "logs".to_string(),
            profile,
            model:            profile.model_config(),
            optimizer:        profile.optimizer(),
            lr:               profile.learning_rate(),
            lr_decay:         profile.lr_decay(),
            batch_size:       10,
            epochs:           5,
            checkpoint_every: 1,
            validation_split: 0.2,
            normalization:    Normalization::UnitScale,
            seed:             42,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        ensure!(self.batch_size >= 1, "batch size must be at least 1");
        ensure!(self.epochs >= 1, "epochs must be at least 1");
        ensure!(self.checkpoint_every >= 1, "checkpoint interval must be at least 1 step");
        ensure!(
            (0.0..1.0).contains(&self.validation_split),
            "validation split {} must be in [0, 1)",
            self.validation_split
        );
        ensure!(self.lr > 0.0, "learning rate must be positive");
        Ok(())
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline on the default GPU backend
    pub fn execute(&self) -> Result<TrainingReport> {
        self.execute_on::<trainer::TrainBackend>(trainer::default_device())
    }

    /// Execute the full training pipeline end to end on backend `B`
    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainingReport> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Load prepared arrays ──────────────────────────────────────
        tracing::info!("Loading prepared arrays from '{}'", cfg.data_dir);
        let (images, masks) = load_prepared(Path::new(&cfg.data_dir))?;

        ensure!(
            images.height() == cfg.model.height
                && images.width() == cfg.model.width
                && images.channels() == IMAGE_CHANNELS,
            "x_train has shape {:?} but the network expects (N, {}, {}, {})",
            images.shape(),
            cfg.model.height,
            cfg.model.width,
            IMAGE_CHANNELS
        );

        // ── Step 2: Normalise ─────────────────────────────────────────────────
        let dataset = SegmentationDataset::from_arrays(
            &images,
            &masks,
            cfg.normalization,
            cfg.model.out_channels,
        )?;
        drop((images, masks));
        tracing::info!("Built {} samples ({} normalisation)", dataset.sample_count(), cfg.normalization);

        // ── Step 3: Trailing validation split ─────────────────────────────────
        let (train_items, val_items) = split_trailing(dataset.into_items(), cfg.validation_split);
        ensure!(!train_items.is_empty(), "no training samples left after the validation split");
        tracing::info!(
            "Split: {} train, {} validation",
            train_items.len(),
            val_items.len()
        );

        let train_dataset = SegmentationDataset::new(train_items);
        let val_dataset   = SegmentationDataset::new(val_items);

        // ── Step 4: Save config for inference ─────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.logs_dir)?;

        // ── Step 5: Run training loop (Layer 5) ───────────────────────────────
        let (model, report) = trainer::train_model::<B>(
            cfg,
            train_dataset,
            val_dataset,
            &ckpt_manager,
            &metrics,
            &device,
        )?;

        // ── Step 6: Final model ───────────────────────────────────────────────
        let path = ckpt_manager.save_final(&model)?;
        tracing::info!("Final model saved to '{}'", path.display());

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::prepare_use_case::{PrepareConfig, PrepareUseCase};
    use crate::infra::checkpoint::CONFIG_FILE;
    use crate::ml::inferencer::Predictor;
    use crate::ml::model::UNet;
    use burn::backend::{Autodiff, NdArray};
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    const H: usize = 4;
    const W: usize = 8;

    /// Prepares two gradient photos with half-filled masks and
    /// returns a tiny binary-mask config reading them
    fn prepared_run(root: &Path, normalization: Normalization) -> TrainConfig {
        let raws  = root.join("raws");
        let masks = root.join("masks");
        fs::create_dir_all(&raws).unwrap();
        fs::create_dir_all(&masks).unwrap();

        for (id, offset) in [("a", 0u32), ("b", 60)] {
            RgbImage::from_fn(W as u32, H as u32, |x, y| {
                let v = (offset + x * 25 + y * 10) as u8;
                Rgb([v, v / 2, 255 - v])
            })
            .save(raws.join(format!("{id}_raw.jpg")))
            .unwrap();
            RgbImage::from_fn(W as u32, H as u32, |x, _| {
                if x < W as u32 / 2 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
            })
            .save(masks.join(format!("{id}_mask.jpg")))
            .unwrap();
        }

        let data_dir = root.join("data");
        PrepareUseCase::new(PrepareConfig {
            raws_dir:   raws.display().to_string(),
            masks_dir:  masks.display().to_string(),
            output_dir: data_dir.display().to_string(),
            height:     H,
            width:      W,
        })
        .execute()
        .unwrap();

        let mut cfg = TrainConfig::for_profile(Profile::BinaryMask);
        cfg.data_dir         = data_dir.display().to_string();
        cfg.checkpoint_dir   = root.join("ckpt").display().to_string();
        cfg.logs_dir         = root.join("logs").display().to_string();
        cfg.model            = UNetConfig::new(H, W, 1)
            .with_depth(1)
            .with_base_filters(2)
            .with_activation(Activation::Elu)
            .with_output_activation(OutputActivation::Sigmoid)
            .with_dropout(0.0);
        cfg.lr               = 1e-3;
        cfg.batch_size       = 1;
        cfg.epochs           = 1;
        cfg.validation_split = 0.5;
        cfg.normalization    = normalization;
        cfg.seed             = 3;
        cfg
    }

    #[test]
    fn test_pipeline_saves_config_and_final_model() {
        let root = TempDir::new().unwrap();
        let cfg  = prepared_run(root.path(), Normalization::Standardize);

        let report = TrainUseCase::new(cfg.clone())
            .execute_on::<Autodiff<NdArray>>(Default::default())
            .unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.epochs.len(), 1);

        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        assert!(ckpt.final_path().exists());
        assert!(ckpt.best_path().exists());
        assert!(Path::new(&cfg.checkpoint_dir).join(CONFIG_FILE).exists());

        let saved = ckpt.load_config().unwrap();
        assert_eq!(saved.normalization, Normalization::Standardize);
        assert_eq!((saved.model.height, saved.model.width), (H, W));
    }

    #[test]
    fn test_predictor_reuses_trained_normalization() {
        let root = TempDir::new().unwrap();
        let cfg  = prepared_run(root.path(), Normalization::Standardize);
        TrainUseCase::new(cfg.clone())
            .execute_on::<Autodiff<NdArray>>(Default::default())
            .unwrap();

        let device      = Default::default();
        let ckpt        = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let (images, _) = load_prepared(Path::new(&cfg.data_dir)).unwrap();

        let restored = Predictor::<NdArray>::from_checkpoint(&ckpt, None, 2, device).unwrap();
        let from_ckpt = restored.predict(&images).unwrap();

        let with = |normalization| {
            let model: UNet<NdArray> = cfg.model.init(&device).unwrap();
            let model = ckpt.load_weights(model, &ckpt.best_path(), &device).unwrap();
            Predictor::new(model, normalization, 2, H, W, device)
                .predict(&images)
                .unwrap()
        };

        assert_eq!(from_ckpt, with(Normalization::Standardize));
        assert_ne!(from_ckpt, with(Normalization::UnitScale));
    }

    #[test]
    fn test_rejects_arrays_of_another_size() {
        let root    = TempDir::new().unwrap();
        let mut cfg = prepared_run(root.path(), Normalization::UnitScale);
        cfg.model.height = H * 2;

        let err = TrainUseCase::new(cfg.clone())
            .execute_on::<Autodiff<NdArray>>(Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("x_train has shape"), "{err}");
        assert!(!Path::new(&cfg.checkpoint_dir).join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_profiles_build_valid_networks() {
        for profile in [Profile::RgbMask, Profile::BinaryMask] {
            let cfg = TrainConfig::for_profile(profile);
            cfg.validate().unwrap();
        }
    }

    #[test]
    fn test_profile_heads() {
        assert_eq!(Profile::RgbMask.model_config().out_channels, 3);
        assert_eq!(Profile::RgbMask.model_config().depth, 4);
        assert_eq!(Profile::BinaryMask.model_config().out_channels, 1);
        assert_eq!(Profile::BinaryMask.model_config().depth, 5);
    }

    #[test]
    fn test_rgb_profile_rejects_five_stages() {
        // 1200 is divisible by 16 but not by 32
        let mut cfg = TrainConfig::for_profile(Profile::RgbMask);
        cfg.model.depth = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validation_split_bounds() {
        let mut cfg = TrainConfig::default();
        cfg.validation_split = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip_keeps_model() {
        let cfg  = TrainConfig::for_profile(Profile::BinaryMask);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.profile, Profile::BinaryMask);
        assert_eq!(back.model.width, 1216);
        assert_eq!(back.model.activation, Activation::Elu);
        assert_eq!(back.optimizer, OptimizerKind::Adam);
    }
}
