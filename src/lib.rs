//! Georeferenced raster bands with fill, gap interpolation and quick-look
//! rendering.

pub mod affine;
pub mod band;
pub mod bands;
pub mod crs;
pub mod error;
pub mod geotiff;
pub mod interp;
pub mod io;
pub mod plot;
pub mod raster;

pub use affine::Affine;
pub use band::Band;
pub use bands::{BandLabel, Bands};
pub use crs::{Crs, CrsKind};
pub use error::{ImageryError, Result};
pub use interp::GapMethod;
pub use io::{read_raster, write_raster, RasterData, RasterMetadata};
pub use raster::{AnyRaster, Bounds, MultiBand, Raster, Rgb, SingleBand};
