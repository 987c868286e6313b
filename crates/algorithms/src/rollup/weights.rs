//! Correlation-penalized layer weights

use foresight_core::{Error, Raster, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::combine::check_coregistered;

/// Default number of paired pixels used for the correlation matrix
pub const DEFAULT_CORRELATION_SAMPLE: usize = 1_000_000;

/// Raw weights at or below this are treated as zero
const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMethod {
    /// Down-weight layers by their mean absolute correlation with the others
    #[default]
    Optimized,
    /// `1/n` for every layer
    Equal,
}

/// Weights and redundancy scores of a pillar's layers, in input order.
///
/// `method` records how the weights were finally obtained, so an optimized
/// request that fell back reports `Equal`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerWeights {
    pub weights: Vec<f64>,
    pub redundancy: Vec<f64>,
    pub method: WeightMethod,
}

impl LayerWeights {
    pub fn equal(n: usize) -> Self {
        Self {
            weights: vec![1.0 / n as f64; n],
            redundancy: vec![0.0; n],
            method: WeightMethod::Equal,
        }
    }
}

/// Draw up to `max_samples` cells valid in every raster.
///
/// Cells are visited with a fixed stride over the row-major grid. Returns
/// one column of values per raster.
pub fn paired_sample(rasters: &[&Raster<f32>], max_samples: usize) -> Result<Vec<Vec<f32>>> {
    check_coregistered(rasters)?;
    let (rows, cols) = rasters[0].shape();
    let total = rows * cols;
    let stride = if max_samples == 0 {
        1
    } else {
        total.div_ceil(max_samples).max(1)
    };

    let mut columns: Vec<Vec<f32>> = vec![Vec::new(); rasters.len()];
    let mut cell = Vec::with_capacity(rasters.len());
    for idx in (0..total).step_by(stride) {
        let (r, c) = (idx / cols, idx % cols);
        cell.clear();
        for raster in rasters {
            let v = unsafe { raster.get_unchecked(r, c) };
            if raster.is_nodata(v) {
                break;
            }
            cell.push(v);
        }
        if cell.len() == rasters.len() {
            for (column, &v) in columns.iter_mut().zip(cell.iter()) {
                column.push(v);
            }
        }
    }
    Ok(columns)
}

/// Pairwise Pearson correlation of equally long columns.
///
/// Returns `None` for a singular covariance: fewer than two samples or a
/// constant column.
pub fn pearson_matrix(columns: &[Vec<f32>]) -> Option<Array2<f64>> {
    let n = columns.len();
    let m = columns.first()?.len();
    if m < 2 || columns.iter().any(|c| c.len() != m) {
        return None;
    }

    let means: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().map(|&v| v as f64).sum::<f64>() / m as f64)
        .collect();
    let centred: Vec<Vec<f64>> = columns
        .iter()
        .zip(&means)
        .map(|(c, &mean)| c.iter().map(|&v| v as f64 - mean).collect())
        .collect();
    let norms: Vec<f64> = centred
        .iter()
        .map(|c| c.iter().map(|d| d * d).sum::<f64>().sqrt())
        .collect();
    if norms.iter().any(|&s| !(s > 1e-12)) {
        return None;
    }

    let mut r = Array2::<f64>::eye(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let dot: f64 = centred[i].iter().zip(&centred[j]).map(|(a, b)| a * b).sum();
            let rho = (dot / (norms[i] * norms[j])).clamp(-1.0, 1.0);
            r[[i, j]] = rho;
            r[[j, i]] = rho;
        }
    }
    Some(r)
}

/// Derive weights for `columns.len()` layers from their paired sample.
///
/// In optimized mode each layer's redundancy is its mean absolute
/// correlation with the other layers, clamped to [0, 1], and its raw weight
/// is `1 − redundancy`. A singular correlation matrix, or raw weights that
/// are all zero, fall back to equal weights.
pub fn derive_weights(columns: &[Vec<f32>], method: WeightMethod) -> Result<LayerWeights> {
    let n = columns.len();
    if n == 0 {
        return Err(Error::InvalidParameter {
            name: "layers",
            value: "0".into(),
            reason: "a rollup needs at least one layer".into(),
        });
    }
    if n == 1 {
        return Ok(LayerWeights {
            weights: vec![1.0],
            redundancy: vec![0.0],
            method,
        });
    }
    if method == WeightMethod::Equal {
        return Ok(LayerWeights::equal(n));
    }

    let Some(r) = pearson_matrix(columns) else {
        warn!("correlation matrix is singular, using equal weights for {} layers", n);
        return Ok(LayerWeights::equal(n));
    };

    let redundancy: Vec<f64> = (0..n)
        .map(|i| {
            let sum: f64 = (0..n).filter(|&j| j != i).map(|j| r[[i, j]].abs()).sum();
            (sum / (n - 1) as f64).clamp(0.0, 1.0)
        })
        .collect();
    let raw: Vec<f64> = redundancy.iter().map(|r| 1.0 - r).collect();
    let total: f64 = raw.iter().sum();

    if raw.iter().all(|&w| w <= WEIGHT_EPSILON) || !(total > 0.0) {
        warn!("every layer is fully redundant, using equal weights for {} layers", n);
        return Ok(LayerWeights {
            weights: vec![1.0 / n as f64; n],
            redundancy,
            method: WeightMethod::Equal,
        });
    }

    let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
    debug!("optimized weights {:?} (redundancy {:?})", weights, redundancy);
    Ok(LayerWeights {
        weights,
        redundancy,
        method: WeightMethod::Optimized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(n: usize, f: impl Fn(usize) -> f32) -> Vec<f32> {
        (0..n).map(f).collect()
    }

    #[test]
    fn test_fully_correlated_pair() {
        let a = ramp(100, |i| i as f32);
        let b = ramp(100, |i| 2.0 * i as f32 + 1.0);
        let cols = vec![a, b];

        let equal = derive_weights(&cols, WeightMethod::Equal).unwrap();
        assert_eq!(equal.weights, vec![0.5, 0.5]);

        let opt = derive_weights(&cols, WeightMethod::Optimized).unwrap();
        assert_relative_eq!(opt.weights[0], 0.5);
        assert_relative_eq!(opt.weights[1], 0.5);
        assert_relative_eq!(opt.redundancy[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(opt.redundancy[1], 1.0, epsilon = 1e-9);
        assert_eq!(opt.method, WeightMethod::Equal);
    }

    #[test]
    fn test_independent_layer_gets_more_weight() {
        let a = ramp(200, |i| i as f32);
        let b = ramp(200, |i| i as f32 * 2.0 + 1.0);
        // Alternating sign pattern, uncorrelated with the ramps
        let c = ramp(200, |i| if (i / 2) % 2 == 0 { 1.0 } else { -1.0 });
        let w = derive_weights(&[a, b, c], WeightMethod::Optimized).unwrap();

        assert_eq!(w.method, WeightMethod::Optimized);
        assert_relative_eq!(w.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(w.weights.iter().all(|&x| x >= 0.0));
        assert!(w.weights[2] > w.weights[0]);
        assert_relative_eq!(w.weights[0], w.weights[1], epsilon = 1e-9);
    }

    #[test]
    fn test_constant_layer_falls_back() {
        let a = ramp(50, |i| i as f32);
        let b = vec![3.0; 50];
        let w = derive_weights(&[a, b], WeightMethod::Optimized).unwrap();
        assert_eq!(w.method, WeightMethod::Equal);
        assert_eq!(w.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_single_layer() {
        let w = derive_weights(&[vec![1.0, 2.0]], WeightMethod::Optimized).unwrap();
        assert_eq!(w.weights, vec![1.0]);
        assert!(derive_weights(&[], WeightMethod::Equal).is_err());
    }

    #[test]
    fn test_paired_sample_skips_partial_cells() {
        let mut a = Raster::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let mut b = Raster::from_vec(vec![5.0, -9999.0, 7.0, 8.0], 2, 2).unwrap();
        a.set_nodata(Some(-9999.0));
        b.set_nodata(Some(-9999.0));

        let cols = paired_sample(&[&a, &b], 100).unwrap();
        assert_eq!(cols[0], vec![1.0, 3.0, 4.0]);
        assert_eq!(cols[1], vec![5.0, 7.0, 8.0]);

        let strided = paired_sample(&[&a, &b], 2).unwrap();
        assert_eq!(strided[0], vec![1.0, 3.0]);
    }
}
