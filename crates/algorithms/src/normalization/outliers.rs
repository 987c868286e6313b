//! Robust outlier bounds from the median absolute deviation

use foresight_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Scale that turns the MAD into a consistent estimator of σ under normality
pub const MAD_SCALE: f64 = 1.4826;

/// Default half-width of the bounds in scaled MADs
pub const DEFAULT_OUTLIER_K: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    #[inline]
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }
}

/// Median of an ascending slice
fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Bounds `[M − k·MAD, M + k·MAD]` intersected with the data range.
///
/// When the MAD is (close to) zero the data range itself is returned.
/// Non-finite values are ignored; fails with `EmptyRaster` if none remain.
pub fn mad_bounds(values: &[f32], k: f64) -> Result<OutlierBounds> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    if sorted.is_empty() {
        return Err(Error::EmptyRaster);
    }
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let median = median_sorted(&sorted);

    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
    deviations.sort_unstable_by(|a, b| a.total_cmp(b));
    let mad = median_sorted(&deviations) * MAD_SCALE;

    if mad <= f64::EPSILON * median.abs().max(1.0) {
        return Ok(OutlierBounds {
            lower: min,
            upper: max,
        });
    }

    Ok(OutlierBounds {
        lower: (median - k * mad).max(min),
        upper: (median + k * mad).min(max),
    })
}
