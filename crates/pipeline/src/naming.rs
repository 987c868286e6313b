//! Deterministic artifact names
//!
//! A rerun of a stage derives the same name and therefore finds the
//! artifact committed by the first run.

use crate::model::{LayerId, PillarId, RunId};

/// Dataset every Climate Foresight artifact is registered under
pub const DATASET: &str = "climate_foresight";

pub fn normalized_layer(run: RunId, layer: LayerId) -> String {
    format!("cf_run{}_layer{}_normalized", run, layer)
}

pub fn pillar_rollup(run: RunId, pillar: PillarId) -> String {
    format!("cf_run{}_pillar{}_rollup", run, pillar)
}

pub fn aligned_future(run: RunId, future_layer: u64) -> String {
    format!("cf_run{}_future{}_aligned", run, future_layer)
}

pub fn current_landscape(run: RunId) -> String {
    format!("cf_run{}_current_landscape", run)
}

pub fn future_landscape(run: RunId) -> String {
    format!("cf_run{}_future_landscape", run)
}

/// `product` is one of the PROMOTe output names, e.g. `monitor` or `mpat`
pub fn promote_product(run: RunId, product: &str) -> String {
    format!("cf_run{}_promote_{}", run, product)
}

/// Object key an artifact is uploaded under
pub fn object_key(run: RunId, name: &str) -> String {
    format!("{}/run_{}/{}.tif", DATASET, run, name)
}
