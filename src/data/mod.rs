// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from image files on disk to device tensor batches.
//
//   raws/*_raw.jpg + masks/*_mask.jpg
//       │
//       ▼
//   PairScanner          → joins raws and masks by identifier
//       │
//       ▼
//   loader               → decodes each file, checks its shape
//       │
//       ▼
//   U8Array (+ npy)      → (N, H, W, 3) stack, saved as x_train.npy / y_train.npy
//       │
//       ▼
//   preprocessor         → normalises pixels to f32
//       │
//       ▼
//   splitter             → trailing validation hold-out
//       │
//       ▼
//   SegmentationDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   SegmentationBatcher  → stacks samples into [N, C, H, W] tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Directory scanning and raw/mask pairing
pub mod scanner;

/// Image decoding and mask PNG encoding
pub mod loader;

/// Dense (N, H, W, C) u8 arrays
pub mod array;

/// numpy .npy reader and writer
pub mod npy;

/// Pixel normalisation shared by training and prediction
pub mod preprocessor;

/// Trailing train/validation split
pub mod splitter;

/// Implements Burn's Dataset trait for segmentation samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
