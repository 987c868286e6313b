//! # Foresight Pipeline
//!
//! Runs the Climate Foresight numerical stages against external
//! collaborators: a raster store, a catalog of committed artifacts, a run
//! context and a future-climate library. Local implementations of each are
//! provided so a run can be executed end to end from the command line.
//!
//! ## Modules
//!
//! - **config**: `CoreConfig` and retry policy
//! - **stages**: Idempotent statistics, normalize, pillar, landscape and promote stages
//! - **state**: Stage status machine and the readiness function
//! - **orchestrator**: Parallel rounds over ready tasks with retries
//! - **commit**: Write, upload and register artifacts, adopting race winners

pub mod catalog;
pub mod commit;
pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod stages;
pub mod state;
pub mod store;
pub mod temp;

pub use catalog::{Catalog, DataLayer, DataLayerKind, InMemoryCatalog, NewDataLayer, RaceLost, RasterInfo};
pub use config::{CoreConfig, RetryPolicy};
pub use context::{FutureClimateLibrary, FutureLayer, RunContext, StaticFutureLibrary, StaticRunContext};
pub use error::{PipelineError, Result};
pub use model::{InputLayer, LayerStatistics, MembershipOverride, Pillar, PillarWeights, RunRecord};
pub use orchestrator::{Orchestrator, RunReport};
pub use stages::{run_stage, StageContext};
pub use state::{ready_tasks, RunPlan, StageBook, StageKind, StageStatus};
pub use store::{LocalRasterStore, RasterStore};
