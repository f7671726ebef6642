// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch and
// keeps a preview image of the first validation prediction.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average Dice loss over training batches
//   - train_dice: its Dice coefficient (-train_loss)
//   - val_loss:   average Dice loss on the validation tail
//   - val_dice:   its Dice coefficient (-val_loss)
//
// Output files:
//   logs/metrics.csv
//   logs/preview_epoch001.png, preview_epoch002.png, ...
//
// Example CSV output:
//   epoch,train_loss,train_dice,val_loss,val_dice
//   1,-0.412300,0.412300,-0.398100,0.398100
//   2,-0.587700,0.587700,-0.561000,0.561000
//
// An epoch with no validation batches records NaN for both
// validation columns.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::data::loader;

const CSV_HEADER: &str = "epoch,train_loss,train_dice,val_loss,val_dice";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Per-sample mean of negated Dice over the training batches, in [-1, 0]
    pub train_loss: f64,

    pub train_dice: f64,

    /// Average negated Dice on the validation tail
    pub val_loss: f64,

    pub val_dice: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self {
            epoch,
            train_loss,
            train_dice: -train_loss,
            val_loss,
            val_dice: -val_loss,
        }
    }

    /// Validation loss, or training loss when no validation batch ran
    pub fn monitored_loss(&self) -> f64 {
        if self.val_loss.is_nan() { self.train_loss } else { self.val_loss }
    }

    /// Returns true if this epoch improved over the previous best loss
    pub fn is_improvement(&self, best_loss: f64) -> bool {
        self.monitored_loss() < best_loss
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    dir:      PathBuf,
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logs directory and write the CSV header if the
    /// file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create logs directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");

        // appends across runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { dir, csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.train_dice,
            m.val_loss,
            m.val_dice,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );

        Ok(())
    }

    /// Write a grayscale preview of one predicted mask for `epoch`
    pub fn save_preview(&self, epoch: usize, height: usize, width: usize, pixels: Vec<u8>) -> Result<PathBuf> {
        let path = self.preview_path(epoch);
        loader::save_mask(&path, height, width, pixels)?;
        Ok(path)
    }

    pub fn preview_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("preview_epoch{epoch:03}.png"))
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
