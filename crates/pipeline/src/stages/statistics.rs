use super::StageContext;
use crate::catalog::DataLayer;
use crate::config::CoreConfig;
use crate::error::{PipelineError, Result};
use crate::model::{InputLayer, LayerId, LayerStatistics, RunRecord};
use foresight_algorithms::normalization::{plan_normalization, NormalizationParams};
use foresight_algorithms::statistics::analyze_raster;
use tracing::{debug, info};

/// Normalization parameters of one layer: run defaults plus its
/// orientation and membership override.
pub fn layer_normalization_params(config: &CoreConfig, layer: &InputLayer) -> NormalizationParams {
    let mut params = config.normalization_params();
    params.favor_high = layer.favor_high;
    if let Some(membership) = &layer.membership {
        params.orientation = membership.orientation;
        params.endpoints = membership.endpoints.clone();
    }
    params
}

/// C1: compute statistics and the normalization plan of an input layer and
/// record both on the layer. Commits no raster.
pub fn run_statistics(
    ctx: &StageContext<'_>,
    run: &RunRecord,
    layer_id: LayerId,
) -> Result<Vec<DataLayer>> {
    let layer = run
        .input(layer_id)
        .ok_or_else(|| PipelineError::NotFound(format!("layer {} in run {}", layer_id, run.id)))?;
    if layer.statistics.is_some() {
        debug!("layer '{}' already has statistics", layer.name);
        return Ok(Vec::new());
    }

    let raster = ctx.store.open(&layer.handle)?;
    ctx.cancel.check()?;
    let analysis = analyze_raster(&raster, &ctx.config.selector_params()).map_err(|e| {
        match PipelineError::from(e) {
            PipelineError::EmptyRaster(_) => PipelineError::EmptyRaster(layer.name.clone()),
            other => other,
        }
    })?;
    let plan = plan_normalization(&analysis, &layer_normalization_params(ctx.config, layer))?;
    info!(
        "layer '{}': skew {:.3} -> {:.3} with {}",
        layer.name,
        plan.original_skew,
        plan.transformed_skew,
        plan.transformation.kind().name()
    );

    let statistics = LayerStatistics {
        original: analysis.statistics,
        normalization: plan.to_block(),
    };
    ctx.runs.record_layer_statistics(run.id, layer.id, statistics)?;
    Ok(Vec::new())
}
