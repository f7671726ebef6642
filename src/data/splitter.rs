// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Holds out the trailing fraction of the dataset for validation,
// in array order:
//
//   [ s0 s1 s2 s3 s4 s5 s6 s7 s8 s9 ]   validation_fraction = 0.2
//     └──────── training ───────┘└val┘
//
// The split index is floor(len * (1 - fraction)), so a tiny
// dataset keeps at least as many training samples as rounding
// allows. The split never shuffles; batch shuffling happens in
// the training DataLoader and only touches the training part.

/// Split `samples` into (train, validation), validation taken from the end.
///
/// # Arguments
/// * `samples`             - All available samples (consumed by this function)
/// * `validation_fraction` - Proportion held out, e.g. 0.2 = last 20%
pub fn split_trailing<T>(mut samples: Vec<T>, validation_fraction: f64) -> (Vec<T>, Vec<T>) {
    let total    = samples.len();
    let fraction = validation_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * (1.0 - fraction)) as usize;

    // Clamp to valid range to avoid panics on rounding at the edges
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}
