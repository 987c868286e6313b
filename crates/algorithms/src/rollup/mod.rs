//! Pillar rollup
//!
//! Combines the normalized layers of one pillar into a single [0, 1]
//! raster, weighting each layer by how little it duplicates the others.

mod combine;
mod weights;

pub use combine::{check_coregistered, weighted_mean};
pub use weights::{
    derive_weights, paired_sample, pearson_matrix, LayerWeights, WeightMethod,
    DEFAULT_CORRELATION_SAMPLE,
};

use foresight_core::{CancelFlag, Raster, Result, DEFAULT_NODATA};
use tracing::info;

/// Parameters for [`rollup_pillar`]
#[derive(Debug, Clone, Copy)]
pub struct RollupParams {
    pub method: WeightMethod,
    /// Maximum number of paired pixels for the correlation estimate
    pub sample_size: usize,
    pub block_size: usize,
    pub nodata: f32,
}

impl Default for RollupParams {
    fn default() -> Self {
        Self {
            method: WeightMethod::Optimized,
            sample_size: DEFAULT_CORRELATION_SAMPLE,
            block_size: 256,
            nodata: DEFAULT_NODATA,
        }
    }
}

/// Derive weights for a pillar's normalized layers and write their
/// weighted mean.
pub fn rollup_pillar(
    layers: &[&Raster<f32>],
    params: &RollupParams,
    cancel: &CancelFlag,
) -> Result<(Raster<f32>, LayerWeights)> {
    let weights = match params.method {
        WeightMethod::Equal => {
            check_coregistered(layers)?;
            LayerWeights::equal(layers.len())
        }
        WeightMethod::Optimized => {
            let columns = paired_sample(layers, params.sample_size)?;
            derive_weights(&columns, WeightMethod::Optimized)?
        }
    };
    info!(
        "rolling up {} layers with {:?} weights {:?}",
        layers.len(),
        weights.method,
        weights.weights
    );
    let raster = weighted_mean(layers, &weights.weights, params.nodata, params.block_size, cancel)?;
    Ok((raster, weights))
}
