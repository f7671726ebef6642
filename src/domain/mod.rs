// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that name the core concepts of the system:
// which files make up a training sample, how pixel values are
// normalised, and the abstractions the other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Sample identifiers and the filename conventions they come from
pub mod sample;

// The pixel normalisation policy shared by training and prediction
pub mod normalization;

// Core abstractions (traits) that other layers implement
pub mod traits;
