// ============================================================
// Layer 3 — Normalisation Policy
// ============================================================
// How 8-bit pixel values are turned into network inputs.
//
//   UnitScale   → x / 255                      (values in [0, 1])
//   Standardize → (x - mean) / std             (mean/std over the whole batch)
//
// The policy chosen at training time is stored in train_config.json
// and the predictor reads it back, so both stages always feed the
// network the same distribution.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    #[default]
    UnitScale,
    Standardize,
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unit-scale"  => Ok(Self::UnitScale),
            "standardize" => Ok(Self::Standardize),
            other => Err(format!(
                "unknown normalization '{other}' (expected 'unit-scale' or 'standardize')"
            )),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnitScale   => f.write_str("unit-scale"),
            Self::Standardize => f.write_str("standardize"),
        }
    }
}
