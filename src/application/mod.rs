// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal per command: prepare arrays, train, or predict masks.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Image folders → x_train.npy / y_train.npy
pub mod prepare_use_case;

// The training workflow
pub mod train_use_case;

// Raw images → predicted mask files
pub mod predict_use_case;
