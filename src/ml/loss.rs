// ============================================================
// Layer 5 — Dice Loss
// ============================================================
// Soft Dice coefficient between a predicted mask and the truth,
// over every element of the batch:
//
//            2 · Σ(pred · truth) + 1
//   dice = ───────────────────────────
//           Σ pred + Σ truth + 1
//
// The +1 keeps two empty masks at dice = 1 instead of 0/0.
// Training minimises -dice, so the loss lives in [-1, 0] for
// predictions and targets in [0, 1].

use burn::prelude::*;

/// Smoothing term added to numerator and denominator
pub const SMOOTH: f64 = 1.0;

/// Soft Dice coefficient, shape [1]
pub fn dice_coefficient<B: Backend, const D: usize>(
    pred:  Tensor<B, D>,
    truth: Tensor<B, D>,
) -> Tensor<B, 1> {
    let intersection = (pred.clone() * truth.clone()).sum();
    let numerator    = intersection.mul_scalar(2.0).add_scalar(SMOOTH);
    let denominator  = (pred.sum() + truth.sum()).add_scalar(SMOOTH);
    numerator / denominator
}

/// Training objective: the negated Dice coefficient
pub fn dice_loss<B: Backend, const D: usize>(
    pred:  Tensor<B, D>,
    truth: Tensor<B, D>,
) -> Tensor<B, 1> {
    dice_coefficient(pred, truth).neg()
}
