//! Run configuration
//!
//! [`CoreConfig`] is loaded once and passed by reference into every stage.
//! Every field has a default, so `{}` is a valid configuration file.

use crate::error::{PipelineError, Result};
use foresight_algorithms::landscape::ReconcileParams;
use foresight_algorithms::normalization::{NormalizationParams, DEFAULT_OUTLIER_K};
use foresight_algorithms::promote::PromoteParams;
use foresight_algorithms::rollup::{RollupParams, WeightMethod, DEFAULT_CORRELATION_SAMPLE};
use foresight_algorithms::statistics::{SelectorParams, DEFAULT_SAMPLE_SIZE};
use foresight_core::{CATEGORICAL_NODATA, CRS, DEFAULT_NODATA};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Approximately 100 m expressed in degrees of latitude
pub const DEFAULT_RESOLUTION: f64 = 0.0008983;

/// How transient stage failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Root under which raster handles are resolved and artifacts uploaded
    pub raster_root: PathBuf,
    /// Where scoped temporaries are created
    pub scratch_dir: PathBuf,
    pub reference_epsg: u32,
    /// Cell size of derived reference grids, in reference CRS units
    pub resolution: f64,
    pub nodata: f32,
    pub categorical_nodata: u8,
    /// Target pixel count of the statistics sample
    pub sample_size: usize,
    /// Maximum paired pixels for pillar correlations
    pub correlation_sample_size: usize,
    pub outlier_k: f64,
    pub block_size: usize,
    /// Worker threads; `None` uses the rayon default
    pub threads: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            raster_root: PathBuf::from("./rasters"),
            scratch_dir: std::env::temp_dir(),
            reference_epsg: foresight_core::crs::REFERENCE_EPSG,
            resolution: DEFAULT_RESOLUTION,
            nodata: DEFAULT_NODATA,
            categorical_nodata: CATEGORICAL_NODATA,
            sample_size: DEFAULT_SAMPLE_SIZE,
            correlation_sample_size: DEFAULT_CORRELATION_SAMPLE,
            outlier_k: DEFAULT_OUTLIER_K,
            block_size: 256,
            threads: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Read a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: CoreConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(PipelineError::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.block_size == 0 {
            return Err(PipelineError::Config("block_size must be at least 1".into()));
        }
        if self.threads == Some(0) {
            return Err(PipelineError::Config("threads must be at least 1".into()));
        }
        Ok(())
    }

    pub fn reference_crs(&self) -> CRS {
        CRS::from_epsg(self.reference_epsg)
    }

    pub fn selector_params(&self) -> SelectorParams {
        SelectorParams {
            target_sample_size: self.sample_size,
            ..SelectorParams::default()
        }
    }

    /// Normalization parameters before any per-layer override
    pub fn normalization_params(&self) -> NormalizationParams {
        NormalizationParams {
            outlier_k: self.outlier_k,
            block_size: self.block_size,
            nodata: self.nodata,
            ..NormalizationParams::default()
        }
    }

    pub fn rollup_params(&self) -> RollupParams {
        RollupParams {
            method: WeightMethod::Optimized,
            sample_size: self.correlation_sample_size,
            block_size: self.block_size,
            nodata: self.nodata,
        }
    }

    pub fn reconcile_params(&self) -> ReconcileParams {
        ReconcileParams {
            nodata: self.nodata,
            ..ReconcileParams::default()
        }
    }

    pub fn promote_params(&self) -> PromoteParams {
        PromoteParams {
            nodata: self.nodata,
            categorical_nodata: self.categorical_nodata,
            block_size: self.block_size,
        }
    }

    /// Build the worker pool the orchestrator runs stages on
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.threads {
            builder = builder.num_threads(threads);
        }
        builder
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot build thread pool: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: CoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.reference_epsg, 4269);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff(), Duration::from_secs(5));
        assert_eq!(config.sample_size, 10_000_000);
        assert_eq!(config.correlation_sample_size, 1_000_000);
    }

    #[test]
    fn test_partial_override() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"block_size": 64, "retry": {"backoff_ms": 10}}"#).unwrap();
        assert_eq!(config.block_size, 64);
        assert_eq!(config.retry.backoff_ms, 10);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.normalization_params().block_size, 64);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"resolution": -1.0}"#).unwrap();
        assert!(matches!(CoreConfig::load(&path), Err(PipelineError::Config(_))));

        std::fs::write(&path, r#"{"threads": 2}"#).unwrap();
        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.thread_pool().unwrap().current_num_threads(), 2);
    }
}
