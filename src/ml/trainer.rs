// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and an
// Adam or AdaGrad optimiser.
//
// Per training step:
//   forward → Dice loss → backward → optimiser step
//   → if step % checkpoint_every == 0: save weights{step:08}
//
// Per epoch:
//   validation pass on model.valid() (inner backend, no dropout)
//   → best-weights tracking → metrics.csv row + preview image
//
// Epoch losses are averaged per sample: each batch loss is
// weighted by the number of items in the batch, so a short final
// batch counts for what it holds.
//
// The step counter runs across epochs. The best-weights file is
// chosen by validation loss, or by training loss when the
// validation tail is empty.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdaGradConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::{OptimizerKind, TrainConfig};
use crate::data::{batcher::SegmentationBatcher, dataset::SegmentationDataset, preprocessor};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::UNet;

pub type TrainBackend = Autodiff<Wgpu>;

pub fn default_device() -> WgpuDevice {
    WgpuDevice::default()
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs:           Vec<EpochMetrics>,
    /// Optimiser steps taken across all epochs
    pub steps:            usize,
    /// Periodic weight files written
    pub checkpoints:      usize,
    /// Lowest monitored loss, the one stored in the best-weights file
    pub best_loss:        f64,
}

/// Build a fresh network from `cfg.model` and train it
pub fn train_model<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: SegmentationDataset,
    val_dataset:   SegmentationDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<(UNet<B>, TrainingReport)> {
    let model: UNet<B> = cfg.model.init(device)?;
    tracing::info!(
        "Model ready: {} stages, {} → {} channels, {}x{} input",
        cfg.model.depth,
        cfg.model.base_filters,
        cfg.model.bottleneck_channels(),
        cfg.model.height,
        cfg.model.width,
    );

    fit(cfg, model, train_dataset, val_dataset, ckpt_manager, metrics, device)
}

/// Train an existing network with the optimiser named in `cfg`
pub fn fit<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    model:         UNet<B>,
    train_dataset: SegmentationDataset,
    val_dataset:   SegmentationDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<(UNet<B>, TrainingReport)> {
    match cfg.optimizer {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new().with_epsilon(1e-8).init::<B, UNet<B>>();
            train_loop(cfg, model, optim, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
        OptimizerKind::AdaGrad => {
            let optim = AdaGradConfig::new()
                .with_lr_decay(cfg.lr_decay)
                .init::<B, UNet<B>>();
            train_loop(cfg, model, optim, train_dataset, val_dataset, ckpt_manager, metrics, device)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn train_loop<B, O>(
    cfg:           &TrainConfig,
    mut model:     UNet<B>,
    mut optim:     O,
    train_dataset: SegmentationDataset,
    val_dataset:   SegmentationDataset,
    ckpt_manager:  &CheckpointManager,
    metrics:       &MetricsLogger,
    device:        &B::Device,
) -> Result<(UNet<B>, TrainingReport)>
where
    B: AutodiffBackend,
    O: Optimizer<UNet<B>, B>,
{
    let (height, width)  = (cfg.model.height, cfg.model.width);
    let mask_channels    = cfg.model.out_channels;
    let has_validation   = val_dataset.sample_count() > 0;

    // ── Training data loader (AutodiffBackend, shuffled) ──────────────────────
    let train_batcher = SegmentationBatcher::<B>::new(device.clone(), height, width, mask_channels);
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend, array order) ────────────────────
    let val_batcher = SegmentationBatcher::<B::InnerBackend>::new(device.clone(), height, width, mask_channels);
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    tracing::info!("Logging epoch metrics to '{}'", metrics.csv_path().display());
    if !has_validation {
        tracing::warn!("Validation split is empty; best weights will track training loss");
    }

    let mut step        = 0usize;
    let mut checkpoints = 0usize;
    let mut best_loss   = f64::INFINITY;
    let mut history     = Vec::with_capacity(cfg.epochs);

    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss = LossMean::default();

        for batch in train_loader.iter() {
            let items  = batch.images.dims()[0];
            let output = model.forward_loss(batch.images, batch.masks);

            let loss_val: f64 = output.loss.clone().into_scalar().elem::<f64>();
            train_loss.add(loss_val, items);

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);

            if step % cfg.checkpoint_every == 0 {
                ckpt_manager.save_step(&model, step)?;
                checkpoints += 1;
            }
            tracing::debug!("step {step}: loss={loss_val:.5}");
            step += 1;
        }

        let avg_train_loss = train_loss.value();

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();

        let mut val_loss = LossMean::default();
        let mut preview  = None;

        for batch in val_loader.iter() {
            let items  = batch.images.dims()[0];
            let output = model_valid.forward_loss(batch.images, batch.masks);
            val_loss.add(output.loss.into_scalar().elem::<f64>(), items);

            if preview.is_none() {
                preview = Some(first_mask(output.predictions, height, width)?);
            }
        }

        let avg_val_loss = val_loss.value();

        let m = EpochMetrics::new(epoch, avg_train_loss, avg_val_loss);

        // ── Best weights ──────────────────────────────────────────────────────
        if m.is_improvement(best_loss) {
            best_loss = m.monitored_loss();
            ckpt_manager.save_best(&model)?;
            tracing::info!("Epoch {epoch}: loss improved to {best_loss:.4}, best weights saved");
        }

        // ── Logs ──────────────────────────────────────────────────────────────
        metrics.log(&m)?;
        if let Some(pixels) = preview {
            metrics.save_preview(epoch, height, width, pixels)?;
        }

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | train_dice={:.4} | val_loss={:.4} | val_dice={:.4}",
            epoch, cfg.epochs, m.train_loss, m.train_dice, m.val_loss, m.val_dice,
        );

        history.push(m);
    }

    tracing::info!("Training complete: {step} steps, {checkpoints} periodic checkpoints");

    let report = TrainingReport { epochs: history, steps: step, checkpoints, best_loss };
    Ok((model, report))
}

/// Running mean of batch losses weighted by batch size
#[derive(Debug, Default)]
struct LossMean {
    sum:   f64,
    items: usize,
}

impl LossMean {
    fn add(&mut self, batch_loss: f64, items: usize) {
        self.sum   += batch_loss * items as f64;
        self.items += items;
    }

    /// NaN when no batch was seen
    fn value(&self) -> f64 {
        if self.items > 0 { self.sum / self.items as f64 } else { f64::NAN }
    }
}

/// Channel 0 of the first prediction in a batch as 8-bit pixels
fn first_mask<B: Backend>(predictions: Tensor<B, 4>, height: usize, width: usize) -> Result<Vec<u8>> {
    let values = predictions
        .slice([0..1, 0..1, 0..height, 0..width])
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read prediction values: {e:?}"))?;
    Ok(preprocessor::to_mask_pixels(&values))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::Profile;
    use crate::data::dataset::SegmentationItem;
    use crate::domain::normalization::Normalization;
    use crate::ml::model::{Activation, OutputActivation, UNetConfig};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    const H: usize = 4;
    const W: usize = 4;

    fn tiny_config(root: &TempDir) -> TrainConfig {
        let mut cfg = TrainConfig::for_profile(Profile::BinaryMask);
        cfg.checkpoint_dir   = root.path().join("ckpt").display().to_string();
        cfg.logs_dir         = root.path().join("logs").display().to_string();
        cfg.model            = UNetConfig::new(H, W, 1)
            .with_depth(1)
            .with_base_filters(2)
            .with_activation(Activation::Elu)
            .with_output_activation(OutputActivation::Sigmoid)
            .with_dropout(0.0);
        cfg.optimizer        = OptimizerKind::Adam;
        cfg.lr               = 1e-3;
        cfg.batch_size       = 1;
        cfg.epochs           = 1;
        cfg.checkpoint_every = 1;
        cfg.validation_split = 0.2;
        cfg.normalization    = Normalization::UnitScale;
        cfg
    }

    fn item() -> SegmentationItem {
        SegmentationItem {
            image: (0..H * W * 3).map(|i| (i % 7) as f32 / 7.0).collect(),
            mask:  vec![1.0; H * W],
        }
    }

    fn loss_of(model: &UNet<TestBackend>, device: &<TestBackend as Backend>::Device) -> f32 {
        use burn::data::dataloader::batcher::Batcher;
        let batcher = SegmentationBatcher::<NdArray>::new(device.clone(), H, W, 1);
        let batch   = batcher.batch(vec![item()]);
        model.valid().forward_loss(batch.images, batch.masks).loss.into_scalar()
    }

    #[test]
    fn test_one_epoch_reduces_dice_loss() {
        let root    = TempDir::new().unwrap();
        let mut cfg = tiny_config(&root);
        cfg.lr      = 1e-2;
        let device  = Default::default();
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.logs_dir).unwrap();

        let model: UNet<TestBackend> = cfg.model.init(&device).unwrap();
        let before = loss_of(&model, &device);

        // two identical pairs: one trains, the trailing one validates
        let dataset        = vec![item(), item()];
        let (train, val)   = crate::data::splitter::split_trailing(dataset, cfg.validation_split);
        let (model, report) = fit(
            &cfg,
            model,
            SegmentationDataset::new(train),
            SegmentationDataset::new(val),
            &ckpt,
            &metrics,
            &device,
        )
        .unwrap();

        let after = loss_of(&model, &device);
        assert!(after < before, "loss did not improve: {before} -> {after}");

        assert_eq!(report.steps, 1);
        assert_eq!(report.epochs.len(), 1);
        assert!(report.best_loss.is_finite());
    }

    #[test]
    fn test_checkpoints_follow_interval() {
        let root    = TempDir::new().unwrap();
        let mut cfg = tiny_config(&root);
        cfg.epochs           = 2;
        cfg.checkpoint_every = 2;
        cfg.validation_split = 0.0;

        let device  = Default::default();
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.logs_dir).unwrap();

        // 3 samples, batch 1, 2 epochs → steps 0..=5, saved at 0, 2, 4
        let dataset = SegmentationDataset::new(vec![item(), item(), item()]);
        let (_, report) = train_model::<TestBackend>(
            &cfg,
            dataset,
            SegmentationDataset::new(Vec::new()),
            &ckpt,
            &metrics,
            &device,
        )
        .unwrap();

        assert_eq!(report.steps, 6);
        assert_eq!(report.checkpoints, 3);
        for step in [0, 2, 4] {
            assert!(ckpt.step_path(step).exists(), "missing checkpoint for step {step}");
        }
        assert!(!ckpt.step_path(1).exists());

        // no validation tail: best weights still written from training loss
        assert!(ckpt.best_path().exists());
        assert!(report.epochs.iter().all(|m| m.val_loss.is_nan()));
    }

    #[test]
    fn test_adagrad_profile_trains() {
        let root    = TempDir::new().unwrap();
        let mut cfg = tiny_config(&root);
        cfg.optimizer = OptimizerKind::AdaGrad;
        cfg.lr        = 1e-2;
        cfg.lr_decay  = 0.01;

        let device  = Default::default();
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.logs_dir).unwrap();

        let (_, report) = train_model::<TestBackend>(
            &cfg,
            SegmentationDataset::new(vec![item()]),
            SegmentationDataset::new(vec![item()]),
            &ckpt,
            &metrics,
            &device,
        )
        .unwrap();

        let m = &report.epochs[0];
        assert!((-1.0..=0.0).contains(&m.val_loss));
        assert!(metrics.csv_path().exists());
        assert!(metrics.preview_path(1).exists());
    }

    #[test]
    fn test_loss_mean_weights_batches_by_size() {
        let mut mean = LossMean::default();
        assert!(mean.value().is_nan());

        mean.add(-0.5, 2);
        mean.add(-1.0, 1);
        assert!((mean.value() - (-2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_short_final_batch_counts_per_sample() {
        use burn::data::dataloader::batcher::Batcher;

        let root    = TempDir::new().unwrap();
        let mut cfg = tiny_config(&root);
        cfg.batch_size = 2;

        let device  = Default::default();
        let ckpt    = CheckpointManager::new(&cfg.checkpoint_dir).unwrap();
        let metrics = MetricsLogger::new(&cfg.logs_dir).unwrap();

        let with_mask = |fill: f32| SegmentationItem { mask: vec![fill; H * W], ..item() };
        let val_items = vec![with_mask(1.0), with_mask(0.0), with_mask(0.5)];

        let (model, report) = train_model::<TestBackend>(
            &cfg,
            SegmentationDataset::new(vec![item()]),
            SegmentationDataset::new(val_items.clone()),
            &ckpt,
            &metrics,
            &device,
        )
        .unwrap();

        // validation batches in array order: [v0, v1] then [v2]
        let batcher = SegmentationBatcher::<NdArray>::new(device, H, W, 1);
        let valid   = model.valid();
        let loss    = |items: Vec<SegmentationItem>| -> f64 {
            let batch = batcher.batch(items);
            valid.forward_loss(batch.images, batch.masks).loss.into_scalar() as f64
        };
        let full  = loss(val_items[..2].to_vec());
        let short = loss(val_items[2..].to_vec());

        let expected = (2.0 * full + short) / 3.0;
        let reported = report.epochs[0].val_loss;
        assert!((reported - expected).abs() < 1e-5, "{reported} != {expected}");
    }
}
