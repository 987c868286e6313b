use super::{open_normalized_aligned, reference_grid, StageContext};
use crate::catalog::{DataLayer, DataLayerKind};
use crate::commit::{commit_staged, stage_raster, ArtifactKey, ArtifactRaster, StagedArtifact};
use crate::error::{PipelineError, Result};
use crate::model::{Pillar, RunRecord};
use crate::naming;
use foresight_algorithms::alignment::{align_to_grid, Resampling};
use foresight_algorithms::landscape::{
    current_landscape, reconcile_grids, resolve_future_mapping, simple_average, FutureMappingPlan,
    PillarLookup,
};
use foresight_core::{Raster, ReferenceGrid};
use serde_json::json;
use tracing::{debug, info};

/// C5: build the current and future landscapes of a run on one grid.
///
/// Returns the aligned future layers followed by the current and future
/// landscape rasters. Either all of those rows are created or none.
pub fn run_landscape(ctx: &StageContext<'_>, run: &RunRecord) -> Result<Vec<DataLayer>> {
    let current_key = ArtifactKey::new(
        run.id,
        naming::current_landscape(run.id),
        DataLayerKind::CurrentLandscape,
    );
    let future_key = ArtifactKey::new(
        run.id,
        naming::future_landscape(run.id),
        DataLayerKind::FutureLandscape,
    );
    if let (Some(current), Some(future)) = (
        current_key.find(ctx.catalog)?,
        future_key.find(ctx.catalog)?,
    ) {
        return Ok(vec![current, future]);
    }

    let grid = reference_grid(ctx.config, run)?;
    let nodata = ctx.config.nodata;
    let block_size = ctx.config.block_size;

    // S1
    let mut pillar_ids = Vec::new();
    let mut inputs = Vec::new();
    for pillar in run.active_pillars() {
        let rollup = find_rollup(ctx, run, pillar)?;
        inputs.push(ctx.store.open(&rollup.url)?);
        pillar_ids.push(pillar.id);
    }
    let unassigned: Vec<_> = run.unassigned_inputs().map(|l| l.id).collect();
    for &layer in &unassigned {
        inputs.push(open_normalized_aligned(ctx, run, layer, &grid)?);
    }
    if inputs.is_empty() {
        return Err(PipelineError::EmptyRaster(format!(
            "run {} has no current-conditions inputs",
            run.id
        )));
    }
    let refs: Vec<&Raster<f32>> = inputs.iter().collect();
    let current = current_landscape(&refs, nodata, block_size, ctx.cancel)?;
    drop(inputs);

    // S2
    let mapping = future_mapping(ctx, run, !unassigned.is_empty());
    if mapping.is_empty() {
        return Err(PipelineError::NoFutureClimate);
    }

    // S3, rows for the aligned copies are created with the landscapes
    let mut staged = Vec::with_capacity(mapping.layers.len() + 2);
    let mut futures = Vec::with_capacity(mapping.layers.len());
    for &future_id in &mapping.layers {
        let (artifact, raster) = aligned_future(ctx, run, future_id, &grid)?;
        staged.push(artifact);
        futures.push(raster);
    }

    // S4
    let refs: Vec<&Raster<f32>> = futures.iter().collect();
    let future = simple_average(&refs, nodata, block_size, ctx.cancel)?;

    // S5
    let (current, future, report) =
        reconcile_grids(&current, &future, &ctx.config.reconcile_params(), ctx.cancel)?;
    info!(
        "run {}: landscapes reconciled on the {:?} grid, {} cells masked",
        run.id, report.reference, report.masked_cells
    );

    staged.push(stage_raster(
        ctx,
        &current_key,
        ArtifactRaster::Float(&current),
        json!({
            "pillars": pillar_ids,
            "unassigned_layers": unassigned,
            "scale": 100,
            "reconcile": report,
        }),
    )?);
    staged.push(stage_raster(
        ctx,
        &future_key,
        ArtifactRaster::Float(&future),
        json!({
            "future_mapping": mapping,
            "reconcile": report,
        }),
    )?);
    commit_staged(ctx, staged)
}

/// The committed rollup of `pillar`, by deterministic name or by the id the
/// run record lists for it
fn find_rollup(ctx: &StageContext<'_>, run: &RunRecord, pillar: &Pillar) -> Result<DataLayer> {
    let key = ArtifactKey::new(
        run.id,
        naming::pillar_rollup(run.id, pillar.id),
        DataLayerKind::PillarRollup,
    );
    if let Some(layer) = key.find(ctx.catalog)? {
        return Ok(layer);
    }
    if let Some(&id) = run.pillar_rollups.get(&pillar.id) {
        if let Some(layer) = ctx
            .catalog
            .datalayers_for_run(run.id)?
            .into_iter()
            .find(|l| l.id == id)
        {
            return Ok(layer);
        }
    }
    Err(PipelineError::MissingPillarRollup {
        pillar: pillar.name.clone(),
    })
}

/// S2: pillar names through the library, with the run's hint taking
/// precedence for pillars it marks as matched.
fn future_mapping(ctx: &StageContext<'_>, run: &RunRecord, has_unassigned: bool) -> FutureMappingPlan {
    let pillars: Vec<&Pillar> = run.active_pillars().collect();
    let names: Vec<String> = pillars.iter().map(|p| p.name.clone()).collect();
    let matches = ctx.library.map_pillars_to_future_layers(&names);

    let lookups: Vec<PillarLookup> = pillars
        .iter()
        .map(|p| {
            let hinted = run
                .future_mapping_hint
                .as_ref()
                .and_then(|hint| hint.get(&p.id))
                .filter(|a| a.matched)
                .map(|a| a.layer_id);
            PillarLookup {
                pillar_id: p.id,
                name: p.name.clone(),
                matched_layer: hinted.or_else(|| matches.get(&p.name).copied().flatten()),
            }
        })
        .collect();

    let default_layer = ctx.library.get_default_future_climate_layer().map(|l| l.id);
    resolve_future_mapping(&lookups, default_layer, has_unassigned)
}

/// S3: clip and align one future layer, reusing a committed copy
fn aligned_future(
    ctx: &StageContext<'_>,
    run: &RunRecord,
    future_id: u64,
    grid: &ReferenceGrid,
) -> Result<(StagedArtifact, Raster<f32>)> {
    let key = ArtifactKey::new(
        run.id,
        naming::aligned_future(run.id, future_id),
        DataLayerKind::AlignedFuture,
    );
    if let Some(existing) = key.find(ctx.catalog)? {
        debug!("reusing aligned future layer {}", future_id);
        let raster = ctx.store.open(&existing.url)?;
        return Ok((StagedArtifact::committed(key, existing), raster));
    }

    let handle = ctx
        .library
        .layer_handle(future_id)
        .ok_or_else(|| PipelineError::NotFound(format!("future-climate layer {}", future_id)))?;
    let source = ctx.store.open(&handle)?;
    ctx.cancel.check()?;
    let aligned = align_to_grid(&source, &run.planning_area, grid, Resampling::Bilinear)?;
    let artifact = stage_raster(
        ctx,
        &key,
        ArtifactRaster::Float(&aligned),
        json!({ "future_layer_id": future_id }),
    )?;
    Ok((artifact, aligned))
}
