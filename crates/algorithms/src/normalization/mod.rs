//! Fuzzy-membership normalization
//!
//! A layer is mapped to [0, 1] in three steps: the skew-correcting
//! transformation chosen by the statistics pass, clamping to MAD outlier
//! bounds, then a membership curve oriented by the layer's favor direction.

mod engine;
mod membership;
mod outliers;

pub use engine::{
    normalize_raster, plan_normalization, EndpointsMethod, NormalizationBlock,
    NormalizationParams, NormalizationPlan, Orientation,
};
pub use membership::{s_shape, trapezoidal, z_shape, Membership, MembershipKind};
pub use outliers::{mad_bounds, OutlierBounds, DEFAULT_OUTLIER_K, MAD_SCALE};
