//! Landscape rollup
//!
//! - **aggregate**: Simple average of pillar rollups or aligned future layers
//! - **mapping**: Pillar to future-climate layer assignment with default fallback
//! - **reconcile**: Shared grid and valid mask for current and future landscapes

mod aggregate;
mod mapping;
mod reconcile;

pub use aggregate::{current_landscape, simple_average};
pub use mapping::{resolve_future_mapping, FutureAssignment, FutureMappingPlan, PillarLookup};
pub use reconcile::{
    reconcile_grids, reference_side, ReconcileParams, ReconcileReport, ReferenceSide,
};
