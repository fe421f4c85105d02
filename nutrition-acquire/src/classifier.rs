//! Nutritional-status classification from anthropometric z-scores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AcquireError;

/// Five ordered nutritional-status categories.
///
/// The derived ordering follows severity, from [`SevereDeficit`] up to
/// [`Excess`].
///
/// [`SevereDeficit`]: NutritionalStatus::SevereDeficit
/// [`Excess`]: NutritionalStatus::Excess
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NutritionalStatus {
    /// z < -3
    SevereDeficit,
    /// -3 <= z <= -2
    ModerateDeficit,
    /// -2 < z < -1
    MildDeficit,
    /// -1 <= z <= 2
    Normal,
    /// z > 2
    Excess,
}

impl NutritionalStatus {
    /// All categories in ascending order.
    pub const ALL: [NutritionalStatus; 5] = [
        NutritionalStatus::SevereDeficit,
        NutritionalStatus::ModerateDeficit,
        NutritionalStatus::MildDeficit,
        NutritionalStatus::Normal,
        NutritionalStatus::Excess,
    ];

    /// The label used for this category in the published dataset.
    pub fn label(&self) -> &'static str {
        match self {
            NutritionalStatus::SevereDeficit => "DESNUTRICIÓN SEVERA",
            NutritionalStatus::ModerateDeficit => "DESNUTRICIÓN MODERADA",
            NutritionalStatus::MildDeficit => "DESNUTRICIÓN LEVE",
            NutritionalStatus::Normal => "NORMAL",
            NutritionalStatus::Excess => "SOBREPESO/OBESIDAD",
        }
    }
}

impl fmt::Display for NutritionalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NutritionalStatus {
    type Err = AcquireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NutritionalStatus::ALL
            .into_iter()
            .find(|status| status.label() == s.trim())
            .ok_or_else(|| AcquireError::protocol(format!("unknown nutritional status '{s}'")))
    }
}

/// Maps a z-score onto its nutritional-status category.
///
/// The moderate band is closed at both ends, so `-3.0` and `-2.0` are
/// [`NutritionalStatus::ModerateDeficit`]. `-1.0` and `2.0` are
/// [`NutritionalStatus::Normal`]. NaN compares false everywhere and lands in
/// `Normal`.
pub fn classify(z: f64) -> NutritionalStatus {
    if z < -3.0 {
        NutritionalStatus::SevereDeficit
    } else if z <= -2.0 {
        NutritionalStatus::ModerateDeficit
    } else if z < -1.0 {
        NutritionalStatus::MildDeficit
    } else if z > 2.0 {
        NutritionalStatus::Excess
    } else {
        NutritionalStatus::Normal
    }
}
