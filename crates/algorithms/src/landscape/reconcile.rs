//! Current/future grid reconciliation

use crate::alignment::{resample_to_grid, Resampling};
use foresight_core::{CancelFlag, Raster, ReferenceGrid, Result, DEFAULT_NODATA};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Resolutions closer than this are equal
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Which landscape raster supplied the shared grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSide {
    Current,
    Future,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileParams {
    pub nodata: f32,
    /// Kernel used on the coarser raster
    pub method: Resampling,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            nodata: DEFAULT_NODATA,
            method: Resampling::Bilinear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub reference: ReferenceSide,
    /// Whether the other raster had to be resampled
    pub resampled: bool,
    /// Cells valid in one raster but not the other, now nodata in both
    pub masked_cells: usize,
}

/// Pick the reference side: equal resolutions favour current, otherwise
/// the finer raster wins.
pub fn reference_side(current: &Raster<f32>, future: &Raster<f32>) -> ReferenceSide {
    let (cx, cy) = current.transform().resolution();
    let (fx, fy) = future.transform().resolution();
    let equal = (cx - fx).abs() < RESOLUTION_EPSILON && (cy - fy).abs() < RESOLUTION_EPSILON;
    if equal || cx * cy <= fx * fy {
        ReferenceSide::Current
    } else {
        ReferenceSide::Future
    }
}

/// Put current and future landscapes on one grid with a shared valid mask.
///
/// The coarser raster is resampled onto the finer one's grid. Afterwards
/// both rasters have the same shape and transform, and a cell is nodata in
/// one exactly when it is nodata in the other.
pub fn reconcile_grids(
    current: &Raster<f32>,
    future: &Raster<f32>,
    params: &ReconcileParams,
    cancel: &CancelFlag,
) -> Result<(Raster<f32>, Raster<f32>, ReconcileReport)> {
    let side = reference_side(current, future);
    let (reference, other) = match side {
        ReferenceSide::Current => (current, future),
        ReferenceSide::Future => (future, current),
    };

    let grid = ReferenceGrid::of_raster(reference, params.nodata);
    let grid = ReferenceGrid {
        nodata: params.nodata,
        ..grid
    };

    let mut reference_out = grid.empty_raster();
    Zip::from(reference_out.data_mut())
        .and(reference.data())
        .for_each(|out, &v| {
            if !reference.is_nodata(v) {
                *out = v;
            }
        });

    cancel.check()?;
    let resampled = !reference.same_grid(other);
    let other_out = if resampled {
        debug!(
            "resampling {:?} landscape from {:?} onto {:?} grid",
            match side {
                ReferenceSide::Current => ReferenceSide::Future,
                ReferenceSide::Future => ReferenceSide::Current,
            },
            other.transform().resolution(),
            grid.transform.resolution()
        );
        resample_to_grid(other, &grid, params.method)?
    } else {
        let mut copy = grid.empty_raster();
        Zip::from(copy.data_mut()).and(other.data()).for_each(|out, &v| {
            if !other.is_nodata(v) {
                *out = v;
            }
        });
        copy
    };
    cancel.check()?;

    let (mut current_out, mut future_out) = match side {
        ReferenceSide::Current => (reference_out, other_out),
        ReferenceSide::Future => (other_out, reference_out),
    };

    let nodata = params.nodata;
    let mut masked_cells = 0_usize;
    Zip::from(current_out.data_mut())
        .and(future_out.data_mut())
        .for_each(|c, f| {
            let c_valid = *c != nodata;
            let f_valid = *f != nodata;
            if c_valid != f_valid {
                masked_cells += 1;
                *c = nodata;
                *f = nodata;
            }
        });

    info!(
        "reconciled landscapes on the {:?} grid ({} cells masked)",
        side, masked_cells
    );
    Ok((
        current_out,
        future_out,
        ReconcileReport {
            reference: side,
            resampled,
            masked_cells,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::{GeoTransform, CRS};

    fn raster(rows: usize, cols: usize, res: f64, value: impl Fn(usize, usize) -> f32) -> Raster<f32> {
        let data: Vec<f32> = (0..rows * cols).map(|i| value(i / cols, i % cols)).collect();
        let mut r = Raster::from_vec(data, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, 8.0, res, -res));
        r.set_crs(Some(CRS::nad83()));
        r.set_nodata(Some(-9999.0));
        r
    }

    fn assert_reconciled(c: &Raster<f32>, f: &Raster<f32>) {
        assert_eq!(c.shape(), f.shape());
        assert_eq!(c.transform(), f.transform());
        for (&a, &b) in c.data().iter().zip(f.data().iter()) {
            assert_eq!(a == -9999.0, b == -9999.0);
        }
    }

    #[test]
    fn test_equal_resolution_prefers_current() {
        let c = raster(8, 8, 1.0, |r, _| if r == 0 { -9999.0 } else { 50.0 });
        let f = raster(8, 8, 1.0, |_, col| if col == 7 { -9999.0 } else { 30.0 });
        let (co, fo, report) =
            reconcile_grids(&c, &f, &ReconcileParams::default(), &CancelFlag::new()).unwrap();

        assert_eq!(report.reference, ReferenceSide::Current);
        assert!(!report.resampled);
        assert_eq!(report.masked_cells, 7 + 7);
        assert_reconciled(&co, &fo);
        assert_eq!(co.valid_values().len(), 7 * 7);
    }

    #[test]
    fn test_finer_future_becomes_reference() {
        let c = raster(4, 4, 2.0, |_, _| 60.0);
        let f = raster(8, 8, 1.0, |r, _| r as f32);
        let (co, fo, report) =
            reconcile_grids(&c, &f, &ReconcileParams::default(), &CancelFlag::new()).unwrap();

        assert_eq!(report.reference, ReferenceSide::Future);
        assert!(report.resampled);
        assert_eq!(co.shape(), (8, 8));
        assert_eq!(co.transform(), f.transform());
        assert_reconciled(&co, &fo);
        assert!((co.get(3, 3).unwrap() - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_finer_current_resamples_future() {
        let c = raster(8, 8, 1.0, |_, _| 10.0);
        let f = raster(4, 4, 2.0, |_, col| if col == 0 { -9999.0 } else { 90.0 });
        let (co, fo, report) =
            reconcile_grids(&c, &f, &ReconcileParams::default(), &CancelFlag::new()).unwrap();

        assert_eq!(report.reference, ReferenceSide::Current);
        assert!(report.resampled);
        assert_reconciled(&co, &fo);
        assert_eq!(fo.shape(), (8, 8));
    }
}
