use super::StageContext;
use crate::catalog::{DataLayer, DataLayerKind};
use crate::commit::{commit_staged, stage_raster, ArtifactKey, ArtifactRaster};
use crate::error::{PipelineError, Result};
use crate::model::RunRecord;
use crate::naming;
use foresight_algorithms::promote::promote;
use serde_json::json;

/// Output names of the PROMOTe stage, float products first
pub const PROMOTE_PRODUCTS: [&str; 8] = [
    "monitor",
    "protect",
    "adapt",
    "transform",
    "adapt_protect",
    "integrated_condition",
    "mpat",
    "mpat_strength",
];

fn product_key(run: &RunRecord, product: &str) -> ArtifactKey {
    let kind = if product.starts_with("mpat") {
        DataLayerKind::PromoteCategory
    } else {
        DataLayerKind::PromoteScore
    };
    ArtifactKey::new(run.id, naming::promote_product(run.id, product), kind)
}

/// C6: score the reconciled landscapes and commit the eight PROMOTe
/// products.
pub fn run_promote(ctx: &StageContext<'_>, run: &RunRecord) -> Result<Vec<DataLayer>> {
    let existing = PROMOTE_PRODUCTS
        .iter()
        .map(|p| product_key(run, p).find(ctx.catalog))
        .collect::<Result<Option<Vec<_>>>>()?;
    if let Some(all) = existing {
        return Ok(all);
    }

    let landscape = |name: String, kind| -> Result<DataLayer> {
        ArtifactKey::new(run.id, name.clone(), kind)
            .find(ctx.catalog)?
            .ok_or_else(|| PipelineError::NotFound(name))
    };
    let current_layer = landscape(
        naming::current_landscape(run.id),
        DataLayerKind::CurrentLandscape,
    )?;
    let future_layer = landscape(
        naming::future_landscape(run.id),
        DataLayerKind::FutureLandscape,
    )?;
    let current = ctx.store.open(&current_layer.url)?;
    let future = ctx.store.open(&future_layer.url)?;

    let outputs = promote(&current, &future, &ctx.config.promote_params(), ctx.cancel)?;
    let fields = json!({
        "current_landscape": current_layer.id,
        "future_landscape": future_layer.id,
        "summary": outputs.summary,
    });

    // Every product is uploaded before any row is created
    let mut staged = Vec::with_capacity(PROMOTE_PRODUCTS.len());
    for (product, raster) in outputs.float_layers() {
        let mut fields = fields.clone();
        fields["product"] = json!(product);
        staged.push(stage_raster(
            ctx,
            &product_key(run, product),
            ArtifactRaster::Float(raster),
            fields,
        )?);
    }
    for (product, raster) in outputs.categorical_layers() {
        let mut fields = fields.clone();
        fields["product"] = json!(product);
        staged.push(stage_raster(
            ctx,
            &product_key(run, product),
            ArtifactRaster::Categorical(raster),
            fields,
        )?);
    }
    commit_staged(ctx, staged)
}
