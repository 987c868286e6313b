//! Idempotent artifact commits
//!
//! A commit writes the raster to a scoped scratch file, uploads it, and only
//! then creates the catalog row. If another writer created the same row in
//! the meantime, the existing row is adopted. Stages with several products
//! stage every upload first and create the rows together at the end.

use crate::catalog::{Catalog, DataLayer, DataLayerKind, NewDataLayer, RasterInfo};
use crate::error::{PipelineError, Result};
use crate::metadata::envelope;
use crate::model::RunId;
use crate::naming::{object_key, DATASET};
use crate::stages::StageContext;
use crate::temp::ScratchFile;
use foresight_core::Raster;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Identity of an artifact within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    pub run: RunId,
    pub name: String,
    pub kind: DataLayerKind,
}

impl ArtifactKey {
    pub fn new(run: RunId, name: impl Into<String>, kind: DataLayerKind) -> Self {
        Self {
            run,
            name: name.into(),
            kind,
        }
    }

    pub fn find(&self, catalog: &dyn Catalog) -> Result<Option<DataLayer>> {
        catalog.find_datalayer(self.run, &self.name, DATASET, self.kind)
    }
}

/// The payload of a commit
pub enum ArtifactRaster<'a> {
    Float(&'a Raster<f32>),
    Categorical(&'a Raster<u8>),
}

impl ArtifactRaster<'_> {
    fn info(&self) -> RasterInfo {
        match self {
            ArtifactRaster::Float(r) => RasterInfo::of(*r),
            ArtifactRaster::Categorical(r) => RasterInfo::of(*r),
        }
    }
}

/// An artifact ready for its catalog row: either already committed, or
/// uploaded with its row still to be created.
#[derive(Debug)]
pub struct StagedArtifact {
    key: ArtifactKey,
    state: Staged,
}

#[derive(Debug)]
enum Staged {
    Committed(DataLayer),
    Uploaded(NewDataLayer),
}

impl StagedArtifact {
    /// Wrap a row found in the catalog
    pub fn committed(key: ArtifactKey, layer: DataLayer) -> Self {
        Self {
            key,
            state: Staged::Committed(layer),
        }
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    fn needs_row(&self) -> bool {
        matches!(self.state, Staged::Uploaded(_))
    }
}

/// Write and upload `raster` for `key` without touching the catalog.
///
/// An existing row short-circuits the write. Cancellation is checked before
/// the upload, so a cancelled stage leaves no object behind.
pub fn stage_raster(
    ctx: &StageContext<'_>,
    key: &ArtifactKey,
    raster: ArtifactRaster<'_>,
    fields: Value,
) -> Result<StagedArtifact> {
    if let Some(existing) = key.find(ctx.catalog)? {
        debug!("{} already committed as #{}", key.name, existing.id);
        return Ok(StagedArtifact::committed(key.clone(), existing));
    }

    let scratch = ScratchFile::new(&ctx.config.scratch_dir)?;
    match raster {
        ArtifactRaster::Float(r) => ctx.store.write_f32(scratch.path(), r)?,
        ArtifactRaster::Categorical(r) => ctx.store.write_u8(scratch.path(), r)?,
    }
    ctx.cancel.check()?;

    let url = ctx
        .store
        .upload(scratch.path(), &object_key(key.run, &key.name))?;
    Ok(StagedArtifact {
        key: key.clone(),
        state: Staged::Uploaded(NewDataLayer {
            run: key.run,
            name: key.name.clone(),
            dataset: DATASET.to_string(),
            kind: key.kind,
            url,
            metadata: envelope(key.run, fields),
            info: raster.info(),
        }),
    })
}

/// Create the catalog rows of a stage's staged artifacts, all or none.
///
/// Rows this call created are deleted again if a later row fails, so a
/// failed stage leaves none of its artifacts in the catalog. Rows adopted
/// from another writer are never deleted.
pub fn commit_staged(ctx: &StageContext<'_>, staged: Vec<StagedArtifact>) -> Result<Vec<DataLayer>> {
    if staged.iter().any(StagedArtifact::needs_row) {
        ctx.cancel.check()?;
    }

    let mut created = Vec::new();
    let mut layers = Vec::with_capacity(staged.len());
    for artifact in staged {
        match create_row(ctx.catalog, artifact) {
            Ok((layer, fresh)) => {
                if fresh {
                    created.push(layer.id);
                }
                layers.push(layer);
            }
            Err(e) => {
                roll_back(ctx.catalog, &created);
                return Err(e);
            }
        }
    }
    Ok(layers)
}

/// Commit `raster` under `key`, or return the row that already exists.
///
/// `fields` are wrapped in the metadata envelope.
pub fn commit_raster(
    ctx: &StageContext<'_>,
    key: &ArtifactKey,
    raster: ArtifactRaster<'_>,
    fields: Value,
) -> Result<DataLayer> {
    let staged = stage_raster(ctx, key, raster, fields)?;
    commit_staged(ctx, vec![staged])?
        .pop()
        .ok_or_else(|| PipelineError::Catalog(format!("{} produced no row", key.name)))
}

/// The row for `artifact`, and whether this call created it
fn create_row(catalog: &dyn Catalog, artifact: StagedArtifact) -> Result<(DataLayer, bool)> {
    let new = match artifact.state {
        Staged::Committed(layer) => return Ok((layer, false)),
        Staged::Uploaded(new) => new,
    };
    match catalog.create_datalayer(new)? {
        Ok(layer) => {
            info!("committed {} as #{}", layer.name, layer.id);
            Ok((layer, true))
        }
        Err(lost) => {
            info!("lost the race for {}, adopting the existing row", lost.name);
            let layer = artifact.key.find(catalog)?.ok_or_else(|| {
                PipelineError::Catalog(format!("{} reported as existing but not found", lost.name))
            })?;
            Ok((layer, false))
        }
    }
}

fn roll_back(catalog: &dyn Catalog, created: &[u64]) {
    for &id in created.iter().rev() {
        match catalog.delete_datalayer(id) {
            Ok(()) => info!("rolled back datalayer #{}", id),
            Err(e) => warn!("could not roll back datalayer #{}: {}", id, e),
        }
    }
}
