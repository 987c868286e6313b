//! # Foresight Core
//!
//! Core types and I/O for the Climate Foresight raster pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `ReferenceGrid`: The `(transform, width, height, nodata)` tuple a run aligns to
//! - `BlockWindows`: Block iteration for streamed per-pixel math
//! - `PlanningArea`: Polygonal planning-area geometry
//! - `CancelFlag`: Cooperative cancellation checked between blocks
//! - Native GeoTIFF reading and writing

pub mod cancel;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use cancel::CancelFlag;
pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{
    BlockWindow, BlockWindows, GeoTransform, Raster, RasterElement, RasterStatistics,
    ReferenceGrid,
};
pub use vector::PlanningArea;

/// Nodata sentinel for every float raster the pipeline produces.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Nodata sentinel for categorical (uint8) rasters.
pub const CATEGORICAL_NODATA: u8 = 255;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelFlag;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{BlockWindow, GeoTransform, Raster, RasterElement, ReferenceGrid};
    pub use crate::vector::PlanningArea;
    pub use crate::{CATEGORICAL_NODATA, DEFAULT_NODATA};
}
