//! Stage entry points
//!
//! Each stage is idempotent: it first looks for the artifacts a previous
//! attempt committed under the same deterministic names and returns them
//! unchanged if they exist.
//!
//! | Stage | Computes | Commits |
//! |-------|----------|---------|
//! | statistics | C1 statistics and normalization plan | nothing, records on the layer |
//! | normalize | C2 membership raster | one normalized layer |
//! | pillar | C3 alignment + C4 weighted rollup | one pillar rollup |
//! | landscape | C5 S1..S5 | aligned futures, current and future landscapes |
//! | promote | C6 scores and MPAT products | eight rasters |

mod landscape;
mod normalize;
mod pillar;
mod promote;
mod statistics;

pub use landscape::run_landscape;
pub use normalize::run_normalize;
pub use pillar::run_pillar;
pub use promote::{run_promote, PROMOTE_PRODUCTS};
pub use statistics::{layer_normalization_params, run_statistics};

use crate::catalog::{Catalog, DataLayer, DataLayerKind};
use crate::commit::ArtifactKey;
use crate::config::CoreConfig;
use crate::context::{FutureClimateLibrary, RunContext};
use crate::error::{PipelineError, Result};
use crate::model::{LayerId, RunId, RunRecord};
use crate::naming;
use crate::state::StageKind;
use crate::store::RasterStore;
use foresight_algorithms::alignment::{align_to_grid, Resampling};
use foresight_core::{CancelFlag, Raster, ReferenceGrid};
use std::time::Instant;
use tracing::info;

/// Collaborators and settings shared by every stage of a run
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub config: &'a CoreConfig,
    pub store: &'a dyn RasterStore,
    pub catalog: &'a dyn Catalog,
    pub runs: &'a dyn RunContext,
    pub library: &'a dyn FutureClimateLibrary,
    pub cancel: &'a CancelFlag,
}

/// Run one task against the current run record
pub fn run_stage(ctx: &StageContext<'_>, run_id: RunId, task: StageKind) -> Result<Vec<DataLayer>> {
    ctx.cancel.check()?;
    let run = ctx.runs.get_run(run_id)?;
    let start = Instant::now();
    info!("run {}: starting {}", run_id, task);

    let artifacts = match task {
        StageKind::Statistics(layer) => run_statistics(ctx, &run, layer)?,
        StageKind::Normalize(layer) => vec![run_normalize(ctx, &run, layer)?],
        StageKind::Pillar(pillar) => vec![run_pillar(ctx, &run, pillar)?],
        StageKind::Landscape => run_landscape(ctx, &run)?,
        StageKind::Promote => run_promote(ctx, &run)?,
    };

    info!(
        "run {}: finished {} in {:.2?} ({} artifacts)",
        run_id,
        task,
        start.elapsed(),
        artifacts.len()
    );
    Ok(artifacts)
}

/// The run's explicit reference grid, or one derived from its planning area
pub fn reference_grid(config: &CoreConfig, run: &RunRecord) -> Result<ReferenceGrid> {
    match &run.reference_grid {
        Some(grid) => Ok(grid.clone()),
        None => Ok(run
            .planning_area
            .reference_grid(config.resolution, config.nodata)?),
    }
}

/// Open the committed normalized raster of `layer` on the reference grid
fn open_normalized_aligned(
    ctx: &StageContext<'_>,
    run: &RunRecord,
    layer: LayerId,
    grid: &ReferenceGrid,
) -> Result<Raster<f32>> {
    let key = ArtifactKey::new(
        run.id,
        naming::normalized_layer(run.id, layer),
        DataLayerKind::NormalizedLayer,
    );
    let committed = key
        .find(ctx.catalog)?
        .ok_or_else(|| PipelineError::NotFound(format!("normalized raster of layer {}", layer)))?;
    let raster = ctx.store.open(&committed.url)?;
    ctx.cancel.check()?;
    Ok(align_to_grid(&raster, &run.planning_area, grid, Resampling::Bilinear)?)
}
