//! Raster data structures and neighbourhood access

mod element;
mod geotransform;
mod grid;
mod neighborhood;
mod region;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use neighborhood::{d8, EdgeMode, Window3x3};
pub use region::Region;
