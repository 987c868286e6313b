use super::{open_normalized_aligned, reference_grid, StageContext};
use crate::catalog::{DataLayer, DataLayerKind};
use crate::commit::{commit_raster, ArtifactKey, ArtifactRaster};
use crate::error::{PipelineError, Result};
use crate::model::{LayerId, PillarId, PillarWeights, RunRecord};
use crate::naming;
use foresight_algorithms::rollup::rollup_pillar;
use foresight_core::Raster;
use serde_json::json;

/// C4: align a pillar's normalized layers to the reference grid, derive
/// their weights and commit the weighted rollup.
pub fn run_pillar(ctx: &StageContext<'_>, run: &RunRecord, pillar_id: PillarId) -> Result<DataLayer> {
    let pillar = run
        .pillar(pillar_id)
        .ok_or_else(|| PipelineError::NotFound(format!("pillar {} in run {}", pillar_id, run.id)))?;
    let key = ArtifactKey::new(
        run.id,
        naming::pillar_rollup(run.id, pillar.id),
        DataLayerKind::PillarRollup,
    );
    if let Some(existing) = key.find(ctx.catalog)? {
        return Ok(existing);
    }

    let ids: Vec<LayerId> = run.pillar_inputs(pillar.id).map(|l| l.id).collect();
    if ids.is_empty() {
        return Err(PipelineError::NotFound(format!(
            "inputs of pillar '{}'",
            pillar.name
        )));
    }

    let grid = reference_grid(ctx.config, run)?;
    let layers = ids
        .iter()
        .map(|&id| open_normalized_aligned(ctx, run, id, &grid))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&Raster<f32>> = layers.iter().collect();
    let (rollup, weights) = rollup_pillar(&refs, &ctx.config.rollup_params(), ctx.cancel)?;
    let weights = PillarWeights::from_layer_weights(&ids, &weights);

    commit_raster(
        ctx,
        &key,
        ArtifactRaster::Float(&rollup),
        json!({
            "pillar_id": pillar.id,
            "pillar_name": pillar.name,
            "pillar_weights": weights,
        }),
    )
}
