//! Raster store contract and a filesystem implementation

use crate::error::{PipelineError, Result};
use foresight_core::io::{read_geotiff, write_geotiff};
use foresight_core::Raster;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Where rasters are read from and committed artifacts are uploaded to.
///
/// Handles and URLs are opaque to stages: whatever `upload` returns can be
/// passed back to `open`.
pub trait RasterStore: Send + Sync {
    fn open(&self, handle: &str) -> Result<Raster<f32>>;

    fn open_categorical(&self, handle: &str) -> Result<Raster<u8>>;

    fn write_f32(&self, path: &Path, raster: &Raster<f32>) -> Result<()>;

    fn write_u8(&self, path: &Path, raster: &Raster<u8>) -> Result<()>;

    /// Copy a finished local file to `key`, returning its URL.
    ///
    /// An object already stored under `key` is kept as is and its URL is
    /// returned.
    fn upload(&self, local: &Path, key: &str) -> Result<String>;
}

/// GeoTIFF files under a root directory
#[derive(Debug, Clone)]
pub struct LocalRasterStore {
    root: PathBuf,
}

impl LocalRasterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute handles are used as is, relative ones resolve under the root
    fn resolve(&self, handle: &str) -> PathBuf {
        let path = Path::new(handle.strip_prefix("file://").unwrap_or(handle));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn existing(&self, handle: &str) -> Result<PathBuf> {
        let path = self.resolve(handle);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::NotFound(format!("raster '{}'", handle)))
        }
    }
}

impl RasterStore for LocalRasterStore {
    fn open(&self, handle: &str) -> Result<Raster<f32>> {
        let path = self.existing(handle)?;
        debug!("reading {}", path.display());
        Ok(read_geotiff(&path)?)
    }

    fn open_categorical(&self, handle: &str) -> Result<Raster<u8>> {
        let path = self.existing(handle)?;
        Ok(read_geotiff(&path)?)
    }

    fn write_f32(&self, path: &Path, raster: &Raster<f32>) -> Result<()> {
        Ok(write_geotiff(raster, path)?)
    }

    fn write_u8(&self, path: &Path, raster: &Raster<u8>) -> Result<()> {
        Ok(write_geotiff(raster, path)?)
    }

    fn upload(&self, local: &Path, key: &str) -> Result<String> {
        let target = self.root.join(key);
        let url = format!("file://{}", target.display());
        if target.is_file() {
            debug!("{} already uploaded, keeping it", target.display());
            return Ok(url);
        }
        let parent = target.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent)?;

        // Each writer stages its own copy next to the target; the first
        // persisted copy wins and is never replaced.
        let mut staged = NamedTempFile::new_in(parent)?;
        std::io::copy(&mut File::open(local)?, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        match staged.persist_noclobber(&target) {
            Ok(_) => debug!("uploaded {} -> {}", local.display(), target.display()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!("{} uploaded concurrently, keeping it", target.display());
            }
            Err(e) => return Err(e.error.into()),
        }
        Ok(url)
    }
}
