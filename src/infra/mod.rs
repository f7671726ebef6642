// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by both training and prediction:
//
//   checkpoint.rs — Saving and loading network weights with
//                   Burn's full-precision MessagePack recorder.
//                   Also saves/loads TrainConfig as JSON so
//                   prediction can rebuild the network.
//
//   metrics.rs    — Per-epoch loss/Dice rows in a CSV file and
//                   a preview mask image per epoch.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Weight files and training config persistence
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
