//! Scoped scratch files

use crate::error::Result;
use std::path::Path;
use tempfile::NamedTempFile;

/// A GeoTIFF-suffixed temporary file deleted when dropped.
///
/// Stages write their output here before uploading, so early returns,
/// errors and cancellation all leave the scratch directory clean.
#[derive(Debug)]
pub struct ScratchFile {
    inner: NamedTempFile,
}

impl ScratchFile {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let inner = tempfile::Builder::new()
            .prefix("foresight-")
            .suffix(".tif")
            .tempfile_in(dir)?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::new(dir.path()).unwrap();
            std::fs::write(scratch.path(), b"partial").unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
