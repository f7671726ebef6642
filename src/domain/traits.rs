// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits rather than to
// concrete directory scanners or file formats, so a different
// source (a manifest file, an archive) only has to implement
// the trait.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::path::Path;

use crate::domain::sample::{ImagePair, RawImage};

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Any component that can produce (raw, mask) training pairs.
///
/// Implementations:
///   - PairScanner → joins a raws directory with a masks directory
pub trait PairSource {
    /// Return every pair, ordered by identifier.
    /// An unpaired raw or mask is an error, never silently dropped.
    fn load_pairs(&self) -> Result<Vec<ImagePair>>;
}

// ─── RawSource ────────────────────────────────────────────────────────────────
/// Any component that can list raw photographs awaiting prediction.
///
/// Implementations:
///   - RawScanner → lists *_raw.jpg files in a directory
pub trait RawSource {
    fn load_raws(&self) -> Result<Vec<RawImage>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved and restored from disk.
///
/// Implementations:
///   - U8Array → .npy dense array dump
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &Path) -> Result<()>;

    /// Load a component's state from the given path.
    fn load(path: &Path) -> Result<Self>;
}
