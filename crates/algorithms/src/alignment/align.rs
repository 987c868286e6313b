//! Clip and align a source raster to a run's reference grid

use super::rasterize::rasterize_mask;
use super::resample::{resample_to_grid, Resampling};
use foresight_core::{Error, PlanningArea, Raster, ReferenceGrid, Result};
use ndarray::Zip;
use tracing::debug;

/// Resample `src` onto `grid` and set every cell outside `area` to the
/// grid's nodata.
///
/// The result's `(transform, width, height, nodata)` equal the grid's.
///
/// # Arguments
/// * `src` - Source raster in any supported CRS
/// * `area` - Planning area, in the grid's CRS
/// * `grid` - Reference grid of the run
/// * `method` - Bilinear for continuous layers, nearest for categorical
pub fn align_to_grid(
    src: &Raster<f32>,
    area: &PlanningArea,
    grid: &ReferenceGrid,
    method: Resampling,
) -> Result<Raster<f32>> {
    if !area.crs().is_equivalent(&grid.crs) {
        return Err(Error::CrsMismatch(
            area.crs().identifier(),
            grid.crs.identifier(),
        ));
    }

    let mut out = resample_to_grid(src, grid, method)?;
    let mask = rasterize_mask(area, grid);
    let nodata = grid.nodata;

    Zip::from(out.data_mut()).and(&mask).for_each(|v, &inside| {
        if !inside {
            *v = nodata;
        }
    });

    debug!(
        "aligned {}x{} raster onto {}x{} grid ({:?})",
        src.rows(),
        src.cols(),
        grid.height,
        grid.width,
        method
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::{GeoTransform, CRS};

    #[test]
    fn test_output_matches_reference_grid() {
        let mut src = Raster::filled(50, 50, 7.0_f32);
        src.set_transform(GeoTransform::new(-0.5, 10.5, 0.25, -0.25));
        src.set_crs(Some(CRS::wgs84()));
        src.set_nodata(Some(-1.0));

        let area = PlanningArea::from_rect(1.0, 1.0, 9.0, 9.0, CRS::nad83());
        let grid = area.reference_grid(0.3, -9999.0).unwrap();
        let out = align_to_grid(&src, &area, &grid, Resampling::Bilinear).unwrap();

        assert!(grid.matches(&out));
        assert_eq!(out.transform(), &grid.transform);
        assert_eq!(out.shape(), (grid.height, grid.width));
        assert_eq!(out.nodata(), Some(-9999.0));
        for &v in out.data().iter() {
            assert!((v - 7.0).abs() < 1e-5 || v == -9999.0);
        }
    }

    #[test]
    fn test_clip_outside_polygon() {
        let mut src = Raster::filled(10, 10, 1.0_f32);
        src.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        src.set_nodata(Some(-9999.0));

        let grid = ReferenceGrid::new(
            GeoTransform::new(0.0, 10.0, 1.0, -1.0),
            10,
            10,
            -9999.0,
            CRS::nad83(),
        );
        let area = PlanningArea::from_rect(0.0, 0.0, 5.0, 10.0, CRS::nad83());
        let out = align_to_grid(&src, &area, &grid, Resampling::Nearest).unwrap();

        assert_eq!(out.get(3, 4).unwrap(), 1.0);
        assert_eq!(out.get(3, 5).unwrap(), -9999.0);
        assert_eq!(out.valid_values().len(), 50);
    }

    #[test]
    fn test_area_crs_must_match_grid() {
        let src = Raster::filled(2, 2, 1.0_f32);
        let grid = ReferenceGrid::new(GeoTransform::default(), 2, 2, -9999.0, CRS::nad83());
        let area = PlanningArea::from_rect(0.0, 0.0, 1.0, 1.0, CRS::from_epsg(32613));
        assert!(matches!(
            align_to_grid(&src, &area, &grid, Resampling::Bilinear),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
