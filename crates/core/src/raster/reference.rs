//! Reference grid shared by every aligned raster of a run

use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};

/// The `(transform, width, height, nodata)` tuple all rasters of a run share
/// after clipping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGrid {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub nodata: f32,
    #[serde(default)]
    pub crs: CRS,
}

impl ReferenceGrid {
    pub fn new(transform: GeoTransform, width: usize, height: usize, nodata: f32, crs: CRS) -> Self {
        Self {
            transform,
            width,
            height,
            nodata,
            crs,
        }
    }

    /// Derive a north-up grid covering `bounds` (min_x, min_y, max_x, max_y)
    /// at `resolution` map units per pixel.
    pub fn from_extent(
        bounds: (f64, f64, f64, f64),
        resolution: f64,
        nodata: f32,
        crs: CRS,
    ) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidParameter {
                name: "resolution",
                value: resolution.to_string(),
                reason: "must be a positive finite number".into(),
            });
        }
        let (min_x, min_y, max_x, max_y) = bounds;
        if !(max_x > min_x && max_y > min_y) {
            return Err(Error::InvalidParameter {
                name: "bounds",
                value: format!("{:?}", bounds),
                reason: "extent is empty".into(),
            });
        }

        // Guard against ceil() overshooting on extents that are exact multiples
        let width = (((max_x - min_x) / resolution) - 1e-9).ceil().max(1.0) as usize;
        let height = (((max_y - min_y) / resolution) - 1e-9).ceil().max(1.0) as usize;

        Ok(Self {
            transform: GeoTransform::new(min_x, max_y, resolution, -resolution),
            width,
            height,
            nodata,
            crs,
        })
    }

    /// Shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// A raster on this grid with every cell set to the grid's nodata value
    pub fn empty_raster(&self) -> Raster<f32> {
        let mut raster = Raster::filled(self.height, self.width, self.nodata);
        self.stamp(&mut raster);
        raster
    }

    /// Overwrite a raster's georeferencing with this grid's
    pub fn stamp(&self, raster: &mut Raster<f32>) {
        raster.set_transform(self.transform);
        raster.set_crs(Some(self.crs.clone()));
        raster.set_nodata(Some(self.nodata));
    }

    /// Describe the grid a raster sits on
    pub fn of_raster(raster: &Raster<f32>, nodata: f32) -> Self {
        Self {
            transform: *raster.transform(),
            width: raster.cols(),
            height: raster.rows(),
            nodata: raster.nodata().unwrap_or(nodata),
            crs: raster.crs().cloned().unwrap_or_default(),
        }
    }

    /// Whether a raster matches this grid exactly (shape, transform, nodata)
    pub fn matches(&self, raster: &Raster<f32>) -> bool {
        raster.shape() == self.shape()
            && raster.transform().approx_eq(&self.transform)
            && raster.nodata() == Some(self.nodata)
    }
}
