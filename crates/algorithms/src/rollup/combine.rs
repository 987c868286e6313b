//! Weighted combination of co-registered rasters

use crate::blocks::map_blocks;
use foresight_core::{CancelFlag, Error, Raster, Result};
use ndarray::{Array2, ArrayView2};

/// Fail unless every raster shares the first one's shape and transform
pub fn check_coregistered(rasters: &[&Raster<f32>]) -> Result<()> {
    let Some(first) = rasters.first() else {
        return Err(Error::InvalidParameter {
            name: "rasters",
            value: "0".into(),
            reason: "at least one raster is required".into(),
        });
    };
    for other in &rasters[1..] {
        if other.shape() != first.shape() {
            return Err(Error::size_mismatch(first.shape(), other.shape()));
        }
        if !other.transform().approx_eq(first.transform()) {
            return Err(Error::GridMismatch(format!(
                "{:?} vs {:?}",
                first.transform().to_gdal(),
                other.transform().to_gdal()
            )));
        }
    }
    Ok(())
}

/// Per-cell weighted mean of co-registered rasters.
///
/// A cell is written only where every input is valid; elsewhere it is
/// `nodata`. With non-negative weights summing to one the result lies
/// between the smallest and largest input at each cell, and it is clamped
/// there to absorb rounding.
///
/// # Arguments
/// * `rasters` - Inputs on one grid
/// * `weights` - One weight per raster
/// * `nodata` - Output nodata sentinel
/// * `block_size` - Side length of processing blocks
/// * `cancel` - Checked before every block
pub fn weighted_mean(
    rasters: &[&Raster<f32>],
    weights: &[f64],
    nodata: f32,
    block_size: usize,
    cancel: &CancelFlag,
) -> Result<Raster<f32>> {
    check_coregistered(rasters)?;
    if weights.len() != rasters.len() {
        return Err(Error::InvalidParameter {
            name: "weights",
            value: format!("{} weights", weights.len()),
            reason: format!("expected one per raster ({})", rasters.len()),
        });
    }

    let first = rasters[0];
    let data = map_blocks(first.shape(), block_size, cancel, |w| {
        let views: Vec<ArrayView2<'_, f32>> = rasters
            .iter()
            .map(|r| r.window(w))
            .collect::<Result<_>>()?;
        let mut out = Array2::from_elem((w.rows, w.cols), nodata);

        for r in 0..w.rows {
            'cell: for c in 0..w.cols {
                let mut sum = 0.0_f64;
                let mut lo = f32::INFINITY;
                let mut hi = f32::NEG_INFINITY;
                for ((raster, view), &weight) in rasters.iter().zip(&views).zip(weights) {
                    let v = view[[r, c]];
                    if raster.is_nodata(v) {
                        continue 'cell;
                    }
                    sum += weight * v as f64;
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
                out[[r, c]] = (sum as f32).clamp(lo, hi);
            }
        }
        Ok(out)
    })?;

    let mut output = Raster::from_array(data);
    output.set_transform(*first.transform());
    output.set_crs(first.crs().cloned());
    output.set_nodata(Some(nodata));
    Ok(output)
}
