//! Per-layer statistics and skew-correcting transformation selection
//!
//! - **sample**: Average downsampling to a bounded working sample
//! - **descriptive**: Min/max/mean/std, percentiles and Fisher–Pearson skew
//! - **transform**: log, sqrt, Box–Cox and Yeo–Johnson transformations and their fits
//! - **selector**: Pick the transformation that minimizes absolute skew

pub mod descriptive;
pub mod sample;
pub mod selector;
pub mod transform;

pub use descriptive::{describe, percentile_sorted, skewness, Percentiles, StatisticsBlock};
pub use sample::{downsample_average, downsample_factor, DEFAULT_SAMPLE_SIZE};
pub use selector::{
    analyze_raster, select_transformation, CandidateScore, LayerAnalysis, SelectorParams,
    TransformSelection,
};
pub use transform::{FitError, TransformKind, TransformParams, Transformation};
