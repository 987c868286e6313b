//! PROMOTe scoring
//!
//! Places each cell in the `(current, future)` condition plane and scores
//! it against the four management strategies:
//!
//! | Strategy  | Target `(current, future)` |
//! |-----------|----------------------------|
//! | Monitor   | (100, 100) |
//! | Protect   | (100, 0)   |
//! | Adapt     | (0, 100)   |
//! | Transform | (0, 0)     |
//!
//! Each score falls linearly from 100 at the target to 0 at distance
//! `√20000`. The MPAT matrix, MPAT strength, Adapt-Protect and Integrated
//! Condition Score rasters are derived from the four scores.
//!
//! Reference: Povak et al. (2024).

mod conditioning;
mod engine;
mod scores;

pub use conditioning::{condition_current, rescale_linear, FutureScaling};
pub use engine::{promote, ClassCounts, PromoteOutputs, PromoteParams, PromoteSummary};
pub use scores::{
    adapt_protect, integrated_condition, mpat_class, mpat_strength, strategy_scores, Strategy,
    ADAPT_PROTECT_FLOOR, MAX_DISTANCE,
};
