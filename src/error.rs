use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageryError {
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Inconsistent band dimensions: {0:?}")]
    InconsistentBandDims(Vec<(usize, usize)>),

    #[error("{kind} requires {expected} band(s), got {found}")]
    WrongBandCount {
        kind: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Band not found: {0}")]
    BandNotFound(String),

    #[error("Band index {index} out of range for {len} band(s)")]
    BandIndexOutOfRange { index: usize, len: usize },

    #[error("Raster has no bands")]
    NoBands,

    #[error("Raster has no affine transform")]
    MissingTransform,

    #[error("Affine transform is not invertible (determinant {0})")]
    SingularTransform(f64),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Georeferencing of {0} does not match the first raster")]
    MismatchedGeoreference(String),

    #[error("Unsupported sample layout: {0}")]
    UnsupportedSampleLayout(String),
}

pub type Result<T> = std::result::Result<T, ImageryError>;
