//! Run context and future-climate library contracts

use crate::error::{PipelineError, Result};
use crate::model::{LayerId, LayerStatistics, RunId, RunRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Source of run records.
///
/// Stages read the run through here and record per-layer statistics back
/// once C1 has finished, so reruns can skip it.
pub trait RunContext: Send + Sync {
    fn get_run(&self, id: RunId) -> Result<RunRecord>;

    fn record_layer_statistics(
        &self,
        run: RunId,
        layer: LayerId,
        statistics: LayerStatistics,
    ) -> Result<()>;
}

/// Run records held in memory, typically loaded from a manifest
#[derive(Debug, Default)]
pub struct StaticRunContext {
    runs: RwLock<BTreeMap<RunId, RunRecord>>,
}

impl StaticRunContext {
    pub fn new(runs: impl IntoIterator<Item = RunRecord>) -> Self {
        Self {
            runs: RwLock::new(runs.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

impl RunContext for StaticRunContext {
    fn get_run(&self, id: RunId) -> Result<RunRecord> {
        let runs = self
            .runs
            .read()
            .map_err(|_| PipelineError::Catalog("run context lock poisoned".into()))?;
        runs.get(&id)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(format!("run {}", id)))
    }

    fn record_layer_statistics(
        &self,
        run: RunId,
        layer: LayerId,
        statistics: LayerStatistics,
    ) -> Result<()> {
        let mut runs = self
            .runs
            .write()
            .map_err(|_| PipelineError::Catalog("run context lock poisoned".into()))?;
        let record = runs
            .get_mut(&run)
            .ok_or_else(|| PipelineError::NotFound(format!("run {}", run)))?;
        let input = record
            .inputs
            .iter_mut()
            .find(|l| l.id == layer)
            .ok_or_else(|| PipelineError::NotFound(format!("layer {} in run {}", layer, run)))?;
        input.statistics = Some(statistics);
        Ok(())
    }
}

/// A projection raster in the future-climate library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureLayer {
    pub id: u64,
    pub name: String,
    pub handle: String,
}

pub trait FutureClimateLibrary: Send + Sync {
    /// Look each pillar name up; names without a match map to `None`.
    /// Must be deterministic in the name.
    fn map_pillars_to_future_layers(&self, names: &[String]) -> BTreeMap<String, Option<u64>>;

    fn get_default_future_climate_layer(&self) -> Option<FutureLayer>;

    /// Store handle of a library layer
    fn layer_handle(&self, id: u64) -> Option<String>;
}

/// Library matched by case-insensitive keywords in pillar names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticFutureLibrary {
    pub layers: Vec<FutureLayer>,
    /// `(keyword, layer id)` pairs, tried in order
    #[serde(default)]
    pub keywords: Vec<(String, u64)>,
    #[serde(default)]
    pub default_layer: Option<u64>,
}

impl StaticFutureLibrary {
    fn lookup(&self, name: &str) -> Option<u64> {
        let name = name.to_lowercase();
        self.keywords
            .iter()
            .find(|(keyword, _)| name.contains(&keyword.to_lowercase()))
            .map(|&(_, id)| id)
    }
}

impl FutureClimateLibrary for StaticFutureLibrary {
    fn map_pillars_to_future_layers(&self, names: &[String]) -> BTreeMap<String, Option<u64>> {
        names.iter().map(|n| (n.clone(), self.lookup(n))).collect()
    }

    fn get_default_future_climate_layer(&self) -> Option<FutureLayer> {
        let id = self.default_layer?;
        self.layers.iter().find(|l| l.id == id).cloned()
    }

    fn layer_handle(&self, id: u64) -> Option<String> {
        self.layers.iter().find(|l| l.id == id).map(|l| l.handle.clone())
    }
}
