// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The network, its objective, and the loops that train it and
// run it.
//
//   model.rs      — U-Net: encoder stages with skip outputs,
//                   bottleneck, transposed-conv decoder stages,
//                   1x1 head with sigmoid or ReLU
//
//   loss.rs       — Soft Dice coefficient and Dice loss
//
//   trainer.rs    — Training loop: forward, Dice loss, backward,
//                   optimiser step, step checkpoints, validation,
//                   best-weights tracking
//
//   inferencer.rs — Loads trained weights and predicts one mask
//                   per raw image
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Ronneberger et al. (2015) U-Net

/// U-Net segmentation architecture
pub mod model;

/// Dice coefficient and loss
pub mod loss;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Predictor: loads weights and produces masks
pub mod inferencer;
