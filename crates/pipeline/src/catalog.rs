//! Catalog contract and an in-memory implementation

use crate::error::{PipelineError, Result};
use crate::model::RunId;
use foresight_core::{GeoTransform, Raster, RasterElement, CRS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// What a committed raster represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLayerKind {
    NormalizedLayer,
    PillarRollup,
    AlignedFuture,
    CurrentLandscape,
    FutureLandscape,
    PromoteScore,
    PromoteCategory,
}

/// Grid facts recorded alongside a committed raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInfo {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
    pub nodata: Option<f64>,
    /// Valid cells at commit time
    pub valid_count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RasterInfo {
    pub fn of<T: RasterElement>(raster: &Raster<T>) -> Self {
        let stats = raster.statistics();
        let (height, width) = raster.shape();
        Self {
            width,
            height,
            transform: *raster.transform(),
            crs: raster.crs().cloned(),
            nodata: raster.nodata().and_then(RasterElement::to_f64),
            valid_count: stats.valid_count,
            min: stats.min.and_then(RasterElement::to_f64),
            max: stats.max.and_then(RasterElement::to_f64),
        }
    }
}

/// A catalog row about to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataLayer {
    pub run: RunId,
    pub name: String,
    pub dataset: String,
    pub kind: DataLayerKind,
    pub url: String,
    pub metadata: Value,
    pub info: RasterInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataLayer {
    pub id: u64,
    pub run: RunId,
    pub name: String,
    pub dataset: String,
    pub kind: DataLayerKind,
    pub url: String,
    pub metadata: Value,
    pub info: RasterInfo,
}

/// Another writer created the same `(run, name, dataset, kind)` first.
///
/// Not an error: the loser looks the winner up and adopts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceLost {
    pub run: RunId,
    pub name: String,
    pub dataset: String,
    pub kind: DataLayerKind,
}

pub trait Catalog: Send + Sync {
    /// Create a row, or report that an identical key already exists
    fn create_datalayer(&self, layer: NewDataLayer) -> Result<std::result::Result<DataLayer, RaceLost>>;

    fn find_datalayer(
        &self,
        run: RunId,
        name: &str,
        dataset: &str,
        kind: DataLayerKind,
    ) -> Result<Option<DataLayer>>;

    /// Grid facts of a committed raster, by URL
    fn info_raster(&self, url: &str) -> Result<RasterInfo>;

    /// Every row of a run, in creation order
    fn datalayers_for_run(&self, run: RunId) -> Result<Vec<DataLayer>>;

    /// Remove a row this process created; unknown ids are not an error
    fn delete_datalayer(&self, id: u64) -> Result<()>;
}

type LayerKey = (RunId, String, String, DataLayerKind);

#[derive(Debug, Default)]
struct CatalogState {
    next_id: u64,
    rows: BTreeMap<u64, DataLayer>,
    by_key: BTreeMap<LayerKey, u64>,
}

/// Mutex-guarded catalog enforcing the unique key in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CatalogState>> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Catalog("catalog lock poisoned".into()))
    }
}

impl Catalog for InMemoryCatalog {
    fn create_datalayer(&self, layer: NewDataLayer) -> Result<std::result::Result<DataLayer, RaceLost>> {
        let mut state = self.lock()?;
        let key = (layer.run, layer.name.clone(), layer.dataset.clone(), layer.kind);
        if state.by_key.contains_key(&key) {
            return Ok(Err(RaceLost {
                run: layer.run,
                name: layer.name,
                dataset: layer.dataset,
                kind: layer.kind,
            }));
        }

        state.next_id += 1;
        let row = DataLayer {
            id: state.next_id,
            run: layer.run,
            name: layer.name,
            dataset: layer.dataset,
            kind: layer.kind,
            url: layer.url,
            metadata: layer.metadata,
            info: layer.info,
        };
        state.by_key.insert(key, row.id);
        state.rows.insert(row.id, row.clone());
        Ok(Ok(row))
    }

    fn find_datalayer(
        &self,
        run: RunId,
        name: &str,
        dataset: &str,
        kind: DataLayerKind,
    ) -> Result<Option<DataLayer>> {
        let state = self.lock()?;
        let key = (run, name.to_string(), dataset.to_string(), kind);
        Ok(state
            .by_key
            .get(&key)
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    fn info_raster(&self, url: &str) -> Result<RasterInfo> {
        let state = self.lock()?;
        state
            .rows
            .values()
            .find(|row| row.url == url)
            .map(|row| row.info.clone())
            .ok_or_else(|| PipelineError::NotFound(format!("no datalayer at {}", url)))
    }

    fn datalayers_for_run(&self, run: RunId) -> Result<Vec<DataLayer>> {
        let state = self.lock()?;
        Ok(state.rows.values().filter(|row| row.run == run).cloned().collect())
    }

    fn delete_datalayer(&self, id: u64) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(row) = state.rows.remove(&id) {
            state
                .by_key
                .remove(&(row.run, row.name, row.dataset, row.kind));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn new_layer(run: RunId, name: &str, url: &str) -> NewDataLayer {
        let raster = Raster::filled(2, 2, 1.0_f32);
        NewDataLayer {
            run,
            name: name.into(),
            dataset: "climate_foresight".into(),
            kind: DataLayerKind::NormalizedLayer,
            url: url.into(),
            metadata: json!({}),
            info: RasterInfo::of(&raster),
        }
    }

    #[test]
    fn test_unique_key_reports_race() {
        let catalog = InMemoryCatalog::new();
        let first = catalog.create_datalayer(new_layer(1, "a", "u1")).unwrap().unwrap();
        let second = catalog.create_datalayer(new_layer(1, "a", "u2")).unwrap();
        assert_eq!(second.unwrap_err().name, "a");

        // Same name in another run is a different key
        let other = catalog.create_datalayer(new_layer(2, "a", "u3")).unwrap().unwrap();
        assert_ne!(first.id, other.id);

        let found = catalog
            .find_datalayer(1, "a", "climate_foresight", DataLayerKind::NormalizedLayer)
            .unwrap()
            .unwrap();
        assert_eq!(found.url, "u1");
        assert_eq!(catalog.info_raster("u1").unwrap().valid_count, 4);
        assert_eq!(catalog.datalayers_for_run(1).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_creates_have_one_winner() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    catalog
                        .create_datalayer(new_layer(1, "shared", &format!("u{}", i)))
                        .unwrap()
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(catalog.datalayers_for_run(1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_frees_the_key() {
        let catalog = InMemoryCatalog::new();
        let row = catalog.create_datalayer(new_layer(3, "b", "u1")).unwrap().unwrap();
        catalog.delete_datalayer(row.id).unwrap();
        catalog.delete_datalayer(row.id).unwrap();
        assert!(catalog.datalayers_for_run(3).unwrap().is_empty());

        let again = catalog.create_datalayer(new_layer(3, "b", "u2")).unwrap().unwrap();
        assert_ne!(again.id, row.id);
    }
}
