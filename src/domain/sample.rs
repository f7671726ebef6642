// ============================================================
// Layer 3 — Sample Domain Types
// ============================================================
// A training sample is a photograph plus its hand-drawn mask.
// The two files live in different directories and are tied
// together only by their filename:
//
//   raws/street_01_raw.jpg   ─┐
//                             ├── SampleId("street_01")
//   masks/street_01_mask.jpg ─┘
//
// Predicted masks are written back under the same identifier:
//
//   predict_raws/street_01_raw.jpg → predict_masks/street_01_mask.png

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// Suffix of a raw photograph file
pub const RAW_SUFFIX: &str = "_raw.jpg";

/// Suffix of a ground-truth mask file
pub const MASK_SUFFIX: &str = "_mask.jpg";

/// Suffix of a mask written by the predictor
pub const PREDICTED_MASK_SUFFIX: &str = "_mask.png";

/// The identifier shared by a raw image and its mask:
/// the filename with its known suffix stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    /// Extract the identifier from `file_name` if it ends in `suffix`.
    /// Returns None for foreign files and for a bare suffix with no stem.
    pub fn from_file_name(file_name: &str, suffix: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(suffix)?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename of the mask the predictor writes for this sample
    pub fn predicted_mask_file_name(&self) -> String {
        format!("{}{}", self.0, PREDICTED_MASK_SUFFIX)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw photograph joined with its mask by identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub id:   SampleId,
    pub raw:  PathBuf,
    pub mask: PathBuf,
}

/// A raw photograph awaiting prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub id:   SampleId,
    pub path: PathBuf,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_known_suffix() {
        let id = SampleId::from_file_name("street_01_raw.jpg", RAW_SUFFIX).unwrap();
        assert_eq!(id.as_str(), "street_01");

        let id = SampleId::from_file_name("street_01_mask.jpg", MASK_SUFFIX).unwrap();
        assert_eq!(id.as_str(), "street_01");
    }

    #[test]
    fn test_rejects_foreign_files() {
        assert!(SampleId::from_file_name("notes.txt", RAW_SUFFIX).is_none());
        assert!(SampleId::from_file_name("a_raw.png", RAW_SUFFIX).is_none());
        assert!(SampleId::from_file_name("_raw.jpg", RAW_SUFFIX).is_none());
    }

    #[test]
    fn test_predicted_mask_name_replaces_suffix() {
        let id = SampleId::from_file_name("a_raw.jpg", RAW_SUFFIX).unwrap();
        assert_eq!(id.predicted_mask_file_name(), "a_mask.png");
    }
}
