//! # Foresight Algorithms
//!
//! The numerical core of the Climate Foresight pipeline. Every function is a
//! pure transformation over [`Raster`](foresight_core::Raster) values; reading,
//! committing and scheduling live in `foresight-pipeline`.
//!
//! ## Modules
//!
//! - **statistics**: Downsampled statistics, skew and transformation selection
//! - **normalization**: Fuzzy membership normalization to [0, 1]
//! - **alignment**: Reprojection, resampling and planning-area clipping onto a reference grid
//! - **rollup**: Correlation-weighted pillar rollup
//! - **landscape**: Current/future landscape aggregation and grid reconciliation
//! - **promote**: Monitor / Protect / Adapt / Transform scoring and MPAT products

pub mod alignment;
mod blocks;
pub mod landscape;
mod maybe_rayon;
pub mod normalization;
pub mod promote;
pub mod rollup;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alignment::{align_to_grid, resample_to_grid, Resampling};
    pub use crate::landscape::{
        current_landscape, reconcile_grids, resolve_future_mapping, simple_average, FutureAssignment,
        FutureMappingPlan, ReconcileParams,
    };
    pub use crate::normalization::{
        normalize_raster, plan_normalization, Membership, NormalizationBlock, NormalizationParams,
        NormalizationPlan, Orientation,
    };
    pub use crate::promote::{promote, PromoteOutputs, PromoteParams, Strategy};
    pub use crate::rollup::{
        derive_weights, paired_sample, rollup_pillar, weighted_mean, LayerWeights, RollupParams,
        WeightMethod,
    };
    pub use crate::statistics::{
        analyze_raster, LayerAnalysis, SelectorParams, StatisticsBlock, Transformation,
    };
    pub use foresight_core::prelude::*;
}
