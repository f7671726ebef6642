// ============================================================
// Layer 4 — Pixel Preprocessor
// ============================================================
// Converts between 8-bit pixels and the f32 values the network
// sees. Both the trainer and the predictor call `normalize` with
// the policy stored in train_config.json, so there is exactly
// one code path per policy.
//
//   UnitScale:    v / 255
//   Standardize:  (v - mean) / std     mean, std over ALL values in the batch
//                                      (population std; a constant batch
//                                      keeps std = 1)
//
// Masks are always targets in [0, 1] (`to_unit_range`), and
// network outputs go back to 8-bit with `to_mask_pixels`.

use crate::domain::normalization::Normalization;

/// Normalise a whole batch of pixels according to `policy`
pub fn normalize(pixels: &[u8], policy: Normalization) -> Vec<f32> {
    match policy {
        Normalization::UnitScale => to_unit_range(pixels),
        Normalization::Standardize => {
            let (mean, std) = batch_stats(pixels);
            tracing::debug!("Standardising batch: mean={mean:.4}, std={std:.4}");
            pixels
                .iter()
                .map(|&v| ((v as f64 - mean) / std) as f32)
                .collect()
        }
    }
}

/// Linear rescale of 8-bit values to [0, 1]
pub fn to_unit_range(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&v| v as f32 / 255.0).collect()
}

/// Global mean and population standard deviation of a batch.
/// Returns std = 1 for an empty or constant batch.
pub fn batch_stats(pixels: &[u8]) -> (f64, f64) {
    if pixels.is_empty() {
        return (0.0, 1.0);
    }

    let n    = pixels.len() as f64;
    let mean = pixels.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var  = pixels
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    let std = var.sqrt();
    (mean, if std > 0.0 { std } else { 1.0 })
}

/// Network output in [0, 1] → 8-bit mask value.
/// Values outside the range (ReLU heads) are clamped.
pub fn to_mask_pixels(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0) as u8)
        .collect()
}
