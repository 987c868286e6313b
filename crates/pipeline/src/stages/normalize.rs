use super::StageContext;
use crate::catalog::{DataLayer, DataLayerKind};
use crate::commit::{commit_raster, ArtifactKey, ArtifactRaster};
use crate::error::{PipelineError, Result};
use crate::model::{LayerId, RunRecord};
use crate::naming;
use foresight_algorithms::normalization::{normalize_raster, NormalizationPlan};
use serde_json::json;

/// C2: normalize an input layer with the plan recorded by the statistics
/// stage and commit the [0, 1] raster.
pub fn run_normalize(ctx: &StageContext<'_>, run: &RunRecord, layer_id: LayerId) -> Result<DataLayer> {
    let layer = run
        .input(layer_id)
        .ok_or_else(|| PipelineError::NotFound(format!("layer {} in run {}", layer_id, run.id)))?;
    let key = ArtifactKey::new(
        run.id,
        naming::normalized_layer(run.id, layer.id),
        DataLayerKind::NormalizedLayer,
    );
    if let Some(existing) = key.find(ctx.catalog)? {
        return Ok(existing);
    }

    let statistics = layer.statistics.as_ref().ok_or_else(|| {
        PipelineError::NotFound(format!("statistics of layer '{}'", layer.name))
    })?;
    let plan = NormalizationPlan::from_block(&statistics.normalization)?;
    let raster = ctx.store.open(&layer.handle)?;
    let normalized = normalize_raster(
        &raster,
        &plan,
        ctx.config.block_size,
        ctx.config.nodata,
        ctx.cancel,
    )?;

    commit_raster(
        ctx,
        &key,
        ArtifactRaster::Float(&normalized),
        json!({
            "layer_id": layer.id,
            "layer_name": layer.name,
            "statistics": statistics.original,
            "normalization": statistics.normalization,
        }),
    )
}
