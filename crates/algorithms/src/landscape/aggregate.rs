//! Current and future landscape aggregation

use crate::rollup::weighted_mean;
use foresight_core::{CancelFlag, Raster, Result};

/// Unweighted mean of co-registered rasters.
///
/// A cell is valid only where every input is valid.
pub fn simple_average(
    rasters: &[&Raster<f32>],
    nodata: f32,
    block_size: usize,
    cancel: &CancelFlag,
) -> Result<Raster<f32>> {
    let weights = vec![1.0 / rasters.len().max(1) as f64; rasters.len()];
    weighted_mean(rasters, &weights, nodata, block_size, cancel)
}

/// Current-conditions landscape: the simple average of normalized [0, 1]
/// rasters, expressed as a percent.
pub fn current_landscape(
    rasters: &[&Raster<f32>],
    nodata: f32,
    block_size: usize,
    cancel: &CancelFlag,
) -> Result<Raster<f32>> {
    let mut out = simple_average(rasters, nodata, block_size, cancel)?;
    out.data_mut()
        .mapv_inplace(|v| if v == nodata { v } else { (v * 100.0).clamp(0.0, 100.0) });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_average_valid_everywhere_rule() {
        let mut a = Raster::from_vec(vec![10.0, 20.0, -9999.0, 40.0], 2, 2).unwrap();
        let mut b = Raster::from_vec(vec![30.0, 20.0, 5.0, 60.0], 2, 2).unwrap();
        let mut c = Raster::from_vec(vec![20.0, 20.0, 5.0, -9999.0], 2, 2).unwrap();
        for r in [&mut a, &mut b, &mut c] {
            r.set_nodata(Some(-9999.0));
        }

        let out = simple_average(&[&a, &b, &c], -9999.0, 256, &CancelFlag::new()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 20.0, epsilon = 1e-5);
        assert_relative_eq!(out.get(0, 1).unwrap(), 20.0, epsilon = 1e-5);
        assert_eq!(out.get(1, 0).unwrap(), -9999.0);
        assert_eq!(out.get(1, 1).unwrap(), -9999.0);
    }

    #[test]
    fn test_current_landscape_is_percent() {
        let mut a = Raster::from_vec(vec![0.25, 1.0, -9999.0, 0.0], 2, 2).unwrap();
        let mut b = Raster::from_vec(vec![0.75, 1.0, 0.5, 0.0], 2, 2).unwrap();
        a.set_nodata(Some(-9999.0));
        b.set_nodata(Some(-9999.0));

        let out = current_landscape(&[&a, &b], -9999.0, 256, &CancelFlag::new()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 50.0, epsilon = 1e-4);
        assert_relative_eq!(out.get(0, 1).unwrap(), 100.0, epsilon = 1e-4);
        assert_eq!(out.get(1, 0).unwrap(), -9999.0);
        assert_relative_eq!(out.get(1, 1).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(simple_average(&[], -9999.0, 256, &CancelFlag::new()).is_err());
    }
}
