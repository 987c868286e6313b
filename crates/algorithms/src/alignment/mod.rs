//! Grid alignment
//!
//! - **reproject**: Reference-grid to source coordinate transforms (geographic, UTM)
//! - **resample**: Nearest, bilinear and average resampling onto a reference grid
//! - **rasterize**: Planning-area polygon to cell-centre mask
//! - **align**: Resample then clip, producing a raster on the reference grid

mod align;
mod rasterize;
mod reproject;
mod resample;

pub use align::align_to_grid;
pub use rasterize::rasterize_mask;
pub use reproject::{geographic_to_utm, CoordinateTransform};
pub use resample::{resample_to_grid, Resampling};
