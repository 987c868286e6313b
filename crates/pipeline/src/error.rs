//! Error types for pipeline stages.

use thiserror::Error;

/// Errors produced while running a stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("core error: {0}")]
    Core(foresight_core::Error),

    #[error("input has no valid pixels: {0}")]
    EmptyRaster(String),

    #[error("raster shapes differ: {0}")]
    ShapeMismatch(String),

    #[error("pillar '{pillar}' has inputs but no completed rollup")]
    MissingPillarRollup { pillar: String },

    #[error("no future-climate layer is available for this run")]
    NoFutureClimate,

    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    #[error("stage was cancelled")]
    Cancelled,

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("invalid stage transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether the orchestrator may retry the stage that raised this error
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::TransientIo(_))
    }
}

impl From<foresight_core::Error> for PipelineError {
    fn from(e: foresight_core::Error) -> Self {
        use foresight_core::Error as E;
        match e {
            E::Cancelled => PipelineError::Cancelled,
            E::EmptyRaster => PipelineError::EmptyRaster("no valid pixels".into()),
            E::SizeMismatch { .. } | E::GridMismatch(_) => PipelineError::ShapeMismatch(e.to_string()),
            E::Io(io) => PipelineError::from(io),
            other => PipelineError::Core(other),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::NotFound(e.to_string()),
            _ => PipelineError::TransientIo(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Config(e.to_string())
    }
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_stage_kinds() {
        let e: PipelineError = foresight_core::Error::Cancelled.into();
        assert!(matches!(e, PipelineError::Cancelled));

        let e: PipelineError = foresight_core::Error::size_mismatch((2, 2), (3, 3)).into();
        assert!(matches!(e, PipelineError::ShapeMismatch(_)));

        let e: PipelineError = foresight_core::Error::EmptyRaster.into();
        assert!(matches!(e, PipelineError::EmptyRaster(_)));
    }

    #[test]
    fn test_only_io_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
        assert!(PipelineError::from(io).is_transient());
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!PipelineError::from(missing).is_transient());
        assert!(!PipelineError::NoFutureClimate.is_transient());
        assert!(!PipelineError::Cancelled.is_transient());
    }
}
