//! Block-wise normalization of one input layer to [0, 1]

use super::membership::{Membership, MembershipKind};
use super::outliers::{mad_bounds, OutlierBounds, DEFAULT_OUTLIER_K};
use crate::blocks::map_blocks;
use crate::statistics::{percentile_sorted, LayerAnalysis, TransformKind, TransformParams, Transformation};
use foresight_core::{CancelFlag, Error, Raster, Result, DEFAULT_NODATA};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which part of a layer's value range is desirable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Large values are desirable (S curve)
    #[default]
    High,
    /// Small values are desirable (Z curve)
    Low,
    /// An interior band is desirable (trapezoid)
    Interior,
}

/// Where the membership endpoints came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointsMethod {
    Mad,
    Percentiles,
    User,
}

/// Parameters for [`plan_normalization`]
#[derive(Debug, Clone)]
pub struct NormalizationParams {
    /// `Some(false)` selects the Z curve; `None` is treated as favor-high
    pub favor_high: Option<bool>,
    /// Explicit orientation, overrides `favor_high`
    pub orientation: Option<Orientation>,
    /// User endpoints in raw layer units (2 for S/Z, 4 for a trapezoid).
    /// They are passed through the layer's transformation before use.
    pub endpoints: Option<Vec<f64>>,
    /// MAD multiplier for the outlier bounds
    pub outlier_k: f64,
    /// Side length of processing blocks in cells
    pub block_size: usize,
    /// Output nodata sentinel
    pub nodata: f32,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        Self {
            favor_high: None,
            orientation: None,
            endpoints: None,
            outlier_k: DEFAULT_OUTLIER_K,
            block_size: 256,
            nodata: DEFAULT_NODATA,
        }
    }
}

impl NormalizationParams {
    /// Orientation after applying the `favor_high` default
    pub fn resolved_orientation(&self) -> Orientation {
        self.orientation.unwrap_or(match self.favor_high {
            Some(false) => Orientation::Low,
            _ => Orientation::High,
        })
    }
}

/// Normalization record persisted with each input layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBlock {
    pub transformation: TransformKind,
    #[serde(default)]
    pub transformation_params: TransformParams,
    pub original_skew: f64,
    pub transformed_skew: f64,
    pub outlier_min: f64,
    pub outlier_max: f64,
    pub endpoints_method: EndpointsMethod,
    pub endpoints: Vec<f64>,
    pub function: MembershipKind,
    pub favor_high: bool,
    #[serde(default)]
    pub orientation: Orientation,
}

/// Everything needed to normalize every block of a layer identically
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationPlan {
    pub transformation: Transformation,
    pub bounds: OutlierBounds,
    pub membership: Membership,
    pub endpoints_method: EndpointsMethod,
    pub orientation: Orientation,
    pub original_skew: f64,
    pub transformed_skew: f64,
}

impl NormalizationPlan {
    /// Normalize a single valid raw value
    #[inline]
    pub fn normalize_value(&self, raw: f32) -> f32 {
        let t = self.transformation.apply(raw as f64);
        let t = if t.is_finite() {
            self.bounds.clamp(t)
        } else if t == f64::INFINITY {
            self.bounds.upper
        } else {
            self.bounds.lower
        };
        self.membership.evaluate(t).clamp(0.0, 1.0) as f32
    }

    pub fn favor_high(&self) -> bool {
        self.orientation != Orientation::Low
    }

    pub fn to_block(&self) -> NormalizationBlock {
        NormalizationBlock {
            transformation: self.transformation.kind(),
            transformation_params: self.transformation.params(),
            original_skew: self.original_skew,
            transformed_skew: self.transformed_skew,
            outlier_min: self.bounds.lower,
            outlier_max: self.bounds.upper,
            endpoints_method: self.endpoints_method,
            endpoints: self.membership.endpoints(),
            function: self.membership.kind(),
            favor_high: self.favor_high(),
            orientation: self.orientation,
        }
    }

    /// Rebuild a plan from a persisted block so reruns reuse the same mapping
    pub fn from_block(block: &NormalizationBlock) -> Result<Self> {
        Ok(Self {
            transformation: Transformation::from_parts(
                block.transformation,
                &block.transformation_params,
            ),
            bounds: OutlierBounds {
                lower: block.outlier_min,
                upper: block.outlier_max,
            },
            membership: Membership::from_parts(block.function, &block.endpoints)?,
            endpoints_method: block.endpoints_method,
            orientation: block.orientation,
            original_skew: block.original_skew,
            transformed_skew: block.transformed_skew,
        })
    }
}

/// Decide the transformation, outlier bounds and membership curve for a
/// layer from its statistics pass.
///
/// If the selected transformation produces non-finite values on the
/// sample, the plan falls back to the identity with a warning.
pub fn plan_normalization(
    analysis: &LayerAnalysis,
    params: &NormalizationParams,
) -> Result<NormalizationPlan> {
    let selection = &analysis.selection;
    let (transformation, transformed, transformed_skew) =
        match selection.transformation.apply_all(&analysis.sample) {
            Some(values) => (selection.transformation, values, selection.transformed_skew),
            None => {
                warn!(
                    "{} transformation is not finite on the reference sample, falling back to none",
                    selection.transformation.kind().name()
                );
                (
                    Transformation::None,
                    analysis.sample.clone(),
                    selection.original_skew,
                )
            }
        };

    let bounds = mad_bounds(&transformed, params.outlier_k)?;
    let orientation = params.resolved_orientation();

    let user_endpoints = params
        .endpoints
        .as_ref()
        .map(|raw| {
            let mapped: Vec<f64> = raw.iter().map(|&e| transformation.apply(e)).collect();
            if mapped.iter().any(|e| !e.is_finite()) {
                return Err(Error::InvalidParameter {
                    name: "endpoints",
                    value: format!("{:?}", raw),
                    reason: format!(
                        "outside the domain of the {} transformation",
                        transformation.kind().name()
                    ),
                });
            }
            Ok(mapped)
        })
        .transpose()?;

    let (kind, endpoints, method) = match (orientation, user_endpoints) {
        (Orientation::High, Some(e)) => (MembershipKind::S, e, EndpointsMethod::User),
        (Orientation::Low, Some(e)) => (MembershipKind::Z, e, EndpointsMethod::User),
        (Orientation::Interior, Some(e)) => (MembershipKind::Trapezoidal, e, EndpointsMethod::User),
        (Orientation::High, None) => (
            MembershipKind::S,
            vec![bounds.lower, bounds.upper],
            EndpointsMethod::Mad,
        ),
        (Orientation::Low, None) => (
            MembershipKind::Z,
            vec![bounds.lower, bounds.upper],
            EndpointsMethod::Mad,
        ),
        (Orientation::Interior, None) => {
            let mut sorted = transformed;
            sorted.sort_unstable_by(|a, b| a.total_cmp(b));
            let endpoints = [5.0, 10.0, 90.0, 95.0]
                .iter()
                .map(|&q| percentile_sorted(&sorted, q))
                .collect();
            (MembershipKind::Trapezoidal, endpoints, EndpointsMethod::Percentiles)
        }
    };

    let membership = Membership::from_parts(kind, &endpoints)?;
    debug!(
        "normalization plan: {} transform, {:?} membership {:?}, bounds [{:.4}, {:.4}]",
        transformation.kind().name(),
        kind,
        endpoints,
        bounds.lower,
        bounds.upper
    );

    Ok(NormalizationPlan {
        transformation,
        bounds,
        membership,
        endpoints_method: method,
        orientation,
        original_skew: selection.original_skew,
        transformed_skew,
    })
}

/// Normalize a raster to [0, 1] block by block.
///
/// Every block uses the same plan, so the mapping is identical across the
/// layer. Nodata cells of the input become `nodata` in the output.
///
/// # Arguments
/// * `raster` - Source layer in raw units
/// * `plan` - Mapping from [`plan_normalization`] or a persisted block
/// * `block_size` - Side length of processing blocks
/// * `nodata` - Output nodata sentinel
/// * `cancel` - Checked before every block
pub fn normalize_raster(
    raster: &Raster<f32>,
    plan: &NormalizationPlan,
    block_size: usize,
    nodata: f32,
    cancel: &CancelFlag,
) -> Result<Raster<f32>> {
    let data = map_blocks(raster.shape(), block_size, cancel, |w| {
        let src = raster.window(w)?;
        let mut out = Array2::from_elem((w.rows, w.cols), nodata);
        for ((r, c), &v) in src.indexed_iter() {
            if !raster.is_nodata(v) {
                out[[r, c]] = plan.normalize_value(v);
            }
        }
        Ok(out)
    })?;

    let mut output = Raster::from_array(data);
    output.set_transform(*raster.transform());
    output.set_crs(raster.crs().cloned());
    output.set_nodata(Some(nodata));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::{analyze_raster, SelectorParams};
    use approx::assert_relative_eq;
    use foresight_core::GeoTransform;

    fn layer(values: Vec<f32>, rows: usize, cols: usize) -> Raster<f32> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r.set_nodata(Some(-9999.0));
        r
    }

    fn uniform_layer() -> Raster<f32> {
        layer((0..100).map(|v| v as f32).collect(), 10, 10)
    }

    #[test]
    fn test_favor_high_is_s_curve() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();

        assert_eq!(plan.transformation, Transformation::None);
        assert_eq!(plan.membership.kind(), MembershipKind::S);
        assert_eq!(plan.endpoints_method, EndpointsMethod::Mad);

        let out = normalize_raster(&r, &plan, 3, -9999.0, &CancelFlag::new()).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_eq!(out.get(9, 9).unwrap(), 1.0);
        assert!(out.get(0, 5).unwrap() < out.get(5, 5).unwrap());
    }

    #[test]
    fn test_favor_low_inverts() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let high = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();
        let low = plan_normalization(
            &analysis,
            &NormalizationParams {
                favor_high: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(low.membership.kind(), MembershipKind::Z);
        assert!(!low.favor_high());

        for v in [0.0_f32, 13.0, 50.0, 99.0] {
            assert_relative_eq!(
                high.normalize_value(v) + low.normalize_value(v),
                1.0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_user_trapezoid_endpoints() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(
            &analysis,
            &NormalizationParams {
                orientation: Some(Orientation::Interior),
                endpoints: Some(vec![0.0, 50.0, 50.0, 99.0]),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(plan.endpoints_method, EndpointsMethod::User);
        assert_relative_eq!(plan.normalize_value(50.0), 1.0);
        assert_relative_eq!(plan.normalize_value(25.0), 0.5);
    }

    #[test]
    fn test_interior_uses_percentiles() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(
            &analysis,
            &NormalizationParams {
                orientation: Some(Orientation::Interior),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(plan.endpoints_method, EndpointsMethod::Percentiles);
        let e = plan.membership.endpoints();
        assert_relative_eq!(e[0], 4.95, epsilon = 1e-9);
        assert_relative_eq!(e[3], 94.05, epsilon = 1e-9);
    }

    #[test]
    fn test_nodata_preserved_and_range() {
        let mut values: Vec<f32> = (0..64).map(|v| (v as f32).powi(3)).collect();
        values[5] = -9999.0;
        values[40] = -9999.0;
        let r = layer(values, 8, 8);

        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();
        let out = normalize_raster(&r, &plan, 3, -9999.0, &CancelFlag::new()).unwrap();

        assert_eq!(out.nodata(), Some(-9999.0));
        assert_eq!(out.transform(), r.transform());
        for (i, &v) in out.data().iter().enumerate() {
            if i == 5 || i == 40 {
                assert_eq!(v, -9999.0);
            } else {
                assert!(v.is_finite() && (0.0..=1.0).contains(&v), "cell {} = {}", i, v);
            }
        }
    }

    #[test]
    fn test_block_roundtrip() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();
        let block = plan.to_block();

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["transformation"], "none");
        assert_eq!(json["function"], "s");
        assert_eq!(json["endpoints_method"], "mad");
        assert_eq!(json["favor_high"], true);

        let back: NormalizationBlock = serde_json::from_value(json).unwrap();
        let rebuilt = NormalizationPlan::from_block(&back).unwrap();
        assert_eq!(rebuilt.transformation, plan.transformation);
        assert_eq!(rebuilt.membership.kind(), plan.membership.kind());
        assert_eq!(rebuilt.orientation, plan.orientation);
        for v in [0.0_f32, 10.0, 42.0, 99.0] {
            assert_relative_eq!(rebuilt.normalize_value(v), plan.normalize_value(v), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_cancel_stops_normalization() {
        let r = uniform_layer();
        let analysis = analyze_raster(&r, &SelectorParams::default()).unwrap();
        let plan = plan_normalization(&analysis, &NormalizationParams::default()).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            normalize_raster(&r, &plan, 4, -9999.0, &cancel),
            Err(Error::Cancelled)
        ));
    }
}
