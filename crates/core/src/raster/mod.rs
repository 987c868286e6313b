//! Raster data structures and operations

mod block;
mod element;
mod geotransform;
mod grid;
mod reference;

pub use block::{BlockWindow, BlockWindows};
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use reference::ReferenceGrid;
