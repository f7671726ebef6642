// ============================================================
// Layer 4 — Directory Scanner
// ============================================================
// Finds raw photographs and their masks on disk and joins them
// by identifier:
//
//   raws/  a_raw.jpg  b_raw.jpg  notes.txt
//   masks/ b_mask.jpg a_mask.jpg
//             │
//             ▼
//   [ (a, a_raw.jpg, a_mask.jpg), (b, b_raw.jpg, b_mask.jpg) ]
//
// Files without the expected suffix are ignored. A filename that
// is not UTF-8 stops the scan, as does a raw with no mask or a
// mask with no raw; the mismatch error lists every unmatched
// identifier. Output is sorted by identifier so repeated runs
// produce identical arrays.

use anyhow::{bail, Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::sample::{ImagePair, RawImage, SampleId, MASK_SUFFIX, RAW_SUFFIX};
use crate::domain::traits::{PairSource, RawSource};

/// Joins a raws directory with a masks directory
pub struct PairScanner {
    raws_dir:  PathBuf,
    masks_dir: PathBuf,
}

impl PairScanner {
    pub fn new(raws_dir: impl Into<PathBuf>, masks_dir: impl Into<PathBuf>) -> Self {
        Self {
            raws_dir:  raws_dir.into(),
            masks_dir: masks_dir.into(),
        }
    }
}

impl PairSource for PairScanner {
    fn load_pairs(&self) -> Result<Vec<ImagePair>> {
        let raws      = scan_dir(&self.raws_dir, RAW_SUFFIX)?;
        let mut masks = scan_dir(&self.masks_dir, MASK_SUFFIX)?;

        if raws.is_empty() {
            bail!(
                "No *{} files found in '{}'",
                RAW_SUFFIX,
                self.raws_dir.display()
            );
        }

        let mut pairs          = Vec::with_capacity(raws.len());
        let mut missing_masks  = Vec::new();

        for (id, raw) in raws {
            match masks.remove(&id) {
                Some(mask) => pairs.push(ImagePair { id, raw, mask }),
                None       => missing_masks.push(id.to_string()),
            }
        }

        // Whatever is left in `masks` had no raw counterpart
        let missing_raws: Vec<String> = masks.into_keys().map(|id| id.to_string()).collect();

        if !missing_masks.is_empty() || !missing_raws.is_empty() {
            bail!(
                "Unpaired samples: no mask in '{}' for [{}]; no raw in '{}' for [{}]",
                self.masks_dir.display(),
                missing_masks.join(", "),
                self.raws_dir.display(),
                missing_raws.join(", "),
            );
        }

        tracing::info!("Paired {} raw/mask samples", pairs.len());
        Ok(pairs)
    }
}

/// Lists raw photographs awaiting prediction
pub struct RawScanner {
    dir: PathBuf,
}

impl RawScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl RawSource for RawScanner {
    fn load_raws(&self) -> Result<Vec<RawImage>> {
        let raws: Vec<RawImage> = scan_dir(&self.dir, RAW_SUFFIX)?
            .into_iter()
            .map(|(id, path)| RawImage { id, path })
            .collect();

        if raws.is_empty() {
            bail!("No *{} files found in '{}'", RAW_SUFFIX, self.dir.display());
        }

        tracing::info!("Found {} images to predict", raws.len());
        Ok(raws)
    }
}

/// Map identifier → path for every file in `dir` ending in `suffix`
fn scan_dir(dir: &Path, suffix: &str) -> Result<BTreeMap<SampleId, PathBuf>> {
    let mut found = BTreeMap::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            bail!(
                "Filename '{}' in '{}' is not valid UTF-8",
                name.to_string_lossy(),
                dir.display()
            );
        };

        if let Some(id) = SampleId::from_file_name(name, suffix) {
            found.insert(id, entry.path());
        }
    }

    tracing::debug!("'{}': {} *{} files", dir.display(), found.len(), suffix);
    Ok(found)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn dirs() -> (TempDir, PathBuf, PathBuf) {
        let root  = TempDir::new().unwrap();
        let raws  = root.path().join("raws");
        let masks = root.path().join("masks");
        fs::create_dir_all(&raws).unwrap();
        fs::create_dir_all(&masks).unwrap();
        (root, raws, masks)
    }

    #[test]
    fn test_pairs_by_identifier_not_listing_order() {
        let (_root, raws, masks) = dirs();
        touch(&raws, "b_raw.jpg");
        touch(&raws, "a_raw.jpg");
        touch(&masks, "a_mask.jpg");
        touch(&masks, "b_mask.jpg");

        let pairs = PairScanner::new(&raws, &masks).load_pairs().unwrap();

        assert_eq!(pairs.len(), 2);
        for (pair, id) in pairs.iter().zip(["a", "b"]) {
            assert_eq!(pair.id.as_str(), id);
            assert_eq!(pair.raw, raws.join(format!("{id}_raw.jpg")));
            assert_eq!(pair.mask, masks.join(format!("{id}_mask.jpg")));
        }
    }

    #[test]
    fn test_ignores_foreign_files() {
        let (_root, raws, masks) = dirs();
        touch(&raws, "a_raw.jpg");
        touch(&raws, "readme.txt");
        touch(&masks, "a_mask.jpg");
        touch(&masks, "a_mask.png");

        let pairs = PairScanner::new(&raws, &masks).load_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_missing_mask_fails_loudly() {
        let (_root, raws, masks) = dirs();
        touch(&raws, "a_raw.jpg");
        touch(&raws, "b_raw.jpg");
        touch(&masks, "a_mask.jpg");

        let err = PairScanner::new(&raws, &masks).load_pairs().unwrap_err();
        assert!(err.to_string().contains("[b]"));
    }

    #[test]
    fn test_orphan_mask_fails_loudly() {
        let (_root, raws, masks) = dirs();
        touch(&raws, "a_raw.jpg");
        touch(&masks, "a_mask.jpg");
        touch(&masks, "z_mask.jpg");

        let err = PairScanner::new(&raws, &masks).load_pairs().unwrap_err();
        assert!(err.to_string().contains("[z]"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let root = TempDir::new().unwrap();
        let scanner = PairScanner::new(root.path().join("nope"), root.path());
        assert!(scanner.load_pairs().is_err());
    }

    #[test]
    fn test_raw_scanner_sorted() {
        let (_root, raws, _masks) = dirs();
        touch(&raws, "c_raw.jpg");
        touch(&raws, "a_raw.jpg");

        let found = RawScanner::new(&raws).load_raws().unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_filename_is_an_error() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let (_root, raws, masks) = dirs();
        touch(&raws, "a_raw.jpg");
        touch(&masks, "a_mask.jpg");
        fs::write(raws.join(OsStr::from_bytes(b"b\xff_raw.jpg")), b"").unwrap();

        let err = PairScanner::new(&raws, &masks).load_pairs().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not valid UTF-8"), "{msg}");
        assert!(msg.contains("b\u{FFFD}_raw.jpg"), "{msg}");

        assert!(RawScanner::new(&raws).load_raws().is_err());
    }
}
