//! Transformation selection by minimum absolute skew

use super::descriptive::{describe, skewness, StatisticsBlock};
use super::sample::{downsample_average, downsample_factor, DEFAULT_SAMPLE_SIZE};
use super::transform::{TransformKind, Transformation};
use foresight_core::{Raster, Result};
use tracing::{debug, warn};

/// Parameters for [`analyze_raster`]
#[derive(Debug, Clone, Copy)]
pub struct SelectorParams {
    /// Approximate number of pixels in the working sample
    pub target_sample_size: usize,
    /// Samples with `|skew|` at or below this keep the identity transformation
    pub skew_threshold: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            target_sample_size: DEFAULT_SAMPLE_SIZE,
            skew_threshold: 1.0,
        }
    }
}

/// Outcome of one candidate. `skew` is `None` when the candidate was disqualified.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub kind: TransformKind,
    pub transformation: Option<Transformation>,
    pub skew: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformSelection {
    pub transformation: Transformation,
    pub original_skew: f64,
    pub transformed_skew: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Everything C2 needs from the statistics pass over one layer
#[derive(Debug, Clone)]
pub struct LayerAnalysis {
    pub statistics: StatisticsBlock,
    pub selection: TransformSelection,
    pub downsample_factor: usize,
    /// Valid values of the downsampled working array
    pub sample: Vec<f32>,
}

/// Choose the transformation of `sample` with the smallest absolute skew.
///
/// Candidates are tried in the order log, sqrt, box-cox, yeo-johnson and only
/// a strictly smaller |skew| replaces the current best, so ties go to the
/// earlier candidate. A candidate whose fit fails or whose output is not
/// finite is skipped.
pub fn select_transformation(sample: &[f32], skew_threshold: f64) -> TransformSelection {
    let original_skew = skewness(sample);
    if !original_skew.is_finite() || original_skew.abs() <= skew_threshold {
        return TransformSelection {
            transformation: Transformation::None,
            original_skew,
            transformed_skew: original_skew,
            candidates: Vec::new(),
        };
    }

    let mut best: Option<(Transformation, f64)> = None;
    let mut candidates = Vec::with_capacity(TransformKind::CANDIDATES.len());

    for kind in TransformKind::CANDIDATES {
        let scored = Transformation::fit(kind, sample)
            .map_err(|e| e.to_string())
            .and_then(|t| {
                let transformed = t
                    .apply_all(sample)
                    .ok_or_else(|| "non-finite output".to_string())?;
                let skew = skewness(&transformed);
                if skew.is_finite() {
                    Ok((t, skew))
                } else {
                    Err("non-finite skew".to_string())
                }
            });

        match scored {
            Ok((t, skew)) => {
                debug!("candidate {} skew {:.4}", kind.name(), skew);
                if best.map_or(true, |(_, b)| skew.abs() < b.abs()) {
                    best = Some((t, skew));
                }
                candidates.push(CandidateScore {
                    kind,
                    transformation: Some(t),
                    skew: Some(skew),
                });
            }
            Err(reason) => {
                debug!("candidate {} disqualified: {}", kind.name(), reason);
                candidates.push(CandidateScore {
                    kind,
                    transformation: None,
                    skew: None,
                });
            }
        }
    }

    match best {
        Some((transformation, transformed_skew)) => TransformSelection {
            transformation,
            original_skew,
            transformed_skew,
            candidates,
        },
        None => {
            warn!(
                "every transformation candidate failed (skew {:.3}), keeping values untransformed",
                original_skew
            );
            TransformSelection {
                transformation: Transformation::None,
                original_skew,
                transformed_skew: original_skew,
                candidates,
            }
        }
    }
}

/// Downsample a raster, describe it and select its transformation.
///
/// Fails with `EmptyRaster` when the downsampled array has no valid pixel.
pub fn analyze_raster(raster: &Raster<f32>, params: &SelectorParams) -> Result<LayerAnalysis> {
    let (rows, cols) = raster.shape();
    let factor = downsample_factor(rows, cols, params.target_sample_size);
    let sample = downsample_average(raster, factor);
    let statistics = describe(&sample)?;
    let selection = select_transformation(&sample, params.skew_threshold);

    debug!(
        "analyzed {}x{} raster (factor {}, {} samples): transformation {}",
        rows,
        cols,
        factor,
        sample.len(),
        selection.transformation.kind().name()
    );

    Ok(LayerAnalysis {
        statistics,
        selection,
        downsample_factor: factor,
        sample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use foresight_core::Error;

    fn right_skewed() -> Vec<f32> {
        (0..2000).map(|i| ((i as f32) / 200.0).exp()).collect()
    }

    #[test]
    fn test_symmetric_keeps_none() {
        let sample: Vec<f32> = (0..101).map(|i| i as f32).collect();
        let sel = select_transformation(&sample, 1.0);
        assert_eq!(sel.transformation, Transformation::None);
        assert!(sel.candidates.is_empty());
        assert_relative_eq!(sel.original_skew, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_skewed_picks_a_candidate() {
        let sample = right_skewed();
        let sel = select_transformation(&sample, 1.0);
        assert!(sel.original_skew > 1.0);
        assert_ne!(sel.transformation, Transformation::None);
        assert!(sel.transformed_skew.abs() < sel.original_skew.abs());
        assert_eq!(sel.candidates.len(), 4);

        // The winner has the minimum |skew| among qualified candidates
        let min = sel
            .candidates
            .iter()
            .filter_map(|c| c.skew)
            .fold(f64::INFINITY, |m, s| m.min(s.abs()));
        assert_relative_eq!(sel.transformed_skew.abs(), min);
    }

    #[test]
    fn test_log_is_exact_for_exponential_grid() {
        // ln of this sample is uniform, so log reaches skew 0 and wins
        let sample = right_skewed();
        let sel = select_transformation(&sample, 1.0);
        let log = &sel.candidates[0];
        assert_eq!(log.kind, TransformKind::Log);
        assert!(log.skew.unwrap().abs() < 1e-3);
    }

    #[test]
    fn test_analyze_empty_raster() {
        let mut r = Raster::filled(4, 4, -9999.0_f32);
        r.set_nodata(Some(-9999.0));
        let err = analyze_raster(&r, &SelectorParams::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyRaster));
    }

    #[test]
    fn test_analyze_downsamples_large_input() {
        let data: Vec<f32> = (0..10_000).map(|i| (i % 100) as f32).collect();
        let r = Raster::from_vec(data, 100, 100).unwrap();
        let params = SelectorParams {
            target_sample_size: 100,
            ..Default::default()
        };
        let a = analyze_raster(&r, &params).unwrap();
        assert_eq!(a.downsample_factor, 10);
        assert_eq!(a.sample.len(), 100);
        assert_eq!(a.statistics.count, 100);
    }
}
