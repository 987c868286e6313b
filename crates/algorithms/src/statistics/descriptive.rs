//! Descriptive statistics over a working sample

use foresight_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tail percentiles used for trapezoidal endpoints and reporting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p90: f64,
    pub p95: f64,
}

impl Percentiles {
    pub fn as_array(&self) -> [f64; 4] {
        [self.p5, self.p10, self.p90, self.p95]
    }
}

/// Statistics recorded for every input layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBlock {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub count: usize,
    pub percentiles: Percentiles,
}

/// Compute the statistics block of a sample of valid values.
///
/// Non-finite values are ignored. Standard deviation is the population
/// standard deviation.
pub fn describe(values: &[f32]) -> Result<StatisticsBlock> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Err(Error::EmptyRaster);
    }
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let (mean, variance) = mean_variance(&sorted);

    Ok(StatisticsBlock {
        min: sorted[0] as f64,
        max: sorted[sorted.len() - 1] as f64,
        mean,
        std: variance.sqrt(),
        count: sorted.len(),
        percentiles: Percentiles {
            p5: percentile_sorted(&sorted, 5.0),
            p10: percentile_sorted(&sorted, 10.0),
            p90: percentile_sorted(&sorted, 90.0),
            p95: percentile_sorted(&sorted, 95.0),
        },
    })
}

/// Percentile `q` (0–100) of an ascending slice, linearly interpolated
/// between the two nearest order statistics.
pub fn percentile_sorted(sorted: &[f32], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0] as f64,
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * frac
        }
    }
}

/// Mean and population variance, accumulated in `f64`
pub fn mean_variance(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance)
}

/// Fisher–Pearson coefficient of skewness, `g1 = m3 / m2^(3/2)`.
///
/// Returns 0 for constant or empty samples.
pub fn skewness(values: &[f32]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let (m2, m3) = values.iter().fold((0.0_f64, 0.0_f64), |(m2, m3), &v| {
        let d = v as f64 - mean;
        (m2 + d * d, m3 + d * d * d)
    });
    let m2 = m2 / n;
    let m3 = m3 / n;
    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }
    m3 / m2.powf(1.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_describe_basic() {
        let values: Vec<f32> = (1..=100).map(|v| v as f32).collect();
        let stats = describe(&values).unwrap();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_relative_eq!(stats.mean, 50.5);
        assert_relative_eq!(stats.std, 28.866070047722118, epsilon = 1e-9);
        assert_relative_eq!(stats.percentiles.p5, 5.95, epsilon = 1e-9);
        assert_relative_eq!(stats.percentiles.p95, 95.05, epsilon = 1e-9);
    }

    #[test]
    fn test_describe_empty_fails() {
        assert!(matches!(describe(&[]), Err(Error::EmptyRaster)));
        assert!(matches!(describe(&[f32::NAN]), Err(Error::EmptyRaster)));
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0_f32, 10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile_sorted(&sorted, 50.0), 20.0);
        assert_relative_eq!(percentile_sorted(&sorted, 10.0), 4.0);
        assert_relative_eq!(percentile_sorted(&sorted, 100.0), 40.0);
    }

    #[test]
    fn test_skewness_signs() {
        assert_relative_eq!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0, epsilon = 1e-12);
        assert!(skewness(&[1.0, 1.0, 1.0, 2.0, 10.0]) > 1.0);
        assert!(skewness(&[-10.0, 1.0, 1.0, 1.0, 2.0]) < -1.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_skewness_known_value() {
        // m2 = 12.5, m3 = 45
        assert_relative_eq!(skewness(&[1.0, 2.0, 3.0, 10.0]), 1.018233764908628, epsilon = 1e-9);
    }

    #[test]
    fn test_large_offset_sample_keeps_precision() {
        // A 32-bit running sum of these drifts by whole units
        let mut values = vec![10_000.5_f32; 2_000_000];
        values.extend([10_000.0_f32, 10_001.0]);
        let (mean, variance) = mean_variance(&values);
        assert_relative_eq!(mean, 10_000.5, epsilon = 1e-9);
        assert_relative_eq!(variance, 0.5 / 2_000_002.0, epsilon = 1e-12);
        assert_relative_eq!(skewness(&values), 0.0, epsilon = 1e-6);
    }
}
