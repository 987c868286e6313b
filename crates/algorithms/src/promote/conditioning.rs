//! Value conditioning of current and future landscapes onto [0, 100]

use serde::{Deserialize, Serialize};

/// Linear map of `x` from `from` onto `to`. A degenerate source range maps
/// to the lower end of `to`.
#[inline]
pub fn rescale_linear(x: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    let span = from.1 - from.0;
    if span.abs() < f64::EPSILON {
        return to.0;
    }
    to.0 + (x - from.0) / span * (to.1 - to.0)
}

/// Current landscape values are clamped to [0, 100]
#[inline]
pub fn condition_current(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// How future values are brought onto [0, 100], chosen from their range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FutureScaling {
    /// max ≤ 1: fractions, multiplied by 100
    Fraction,
    /// max ≤ 100: already percent
    Percent,
    /// max ≤ 255: byte range rescaled from [0, 255]
    Byte,
    /// Anything else: the observed range is stretched
    MinMax { min: f64, max: f64 },
}

impl FutureScaling {
    /// Pick the scaling from the minimum and maximum of the valid values
    pub fn detect(min: f64, max: f64) -> Self {
        if max <= 1.0 {
            FutureScaling::Fraction
        } else if max <= 100.0 {
            FutureScaling::Percent
        } else if max <= 255.0 {
            FutureScaling::Byte
        } else {
            FutureScaling::MinMax { min, max }
        }
    }

    /// Scale then clamp to [0, 100]
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        let scaled = match *self {
            FutureScaling::Fraction => x * 100.0,
            FutureScaling::Percent => x,
            FutureScaling::Byte => rescale_linear(x, (0.0, 255.0), (0.0, 100.0)),
            FutureScaling::MinMax { min, max } => rescale_linear(x, (min, max), (0.0, 100.0)),
        };
        scaled.clamp(0.0, 100.0)
    }
}
