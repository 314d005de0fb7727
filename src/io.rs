use crate::error::{ImageryError, Result};
use log::{debug, info};
use ndarray::Array2;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    /// GDAL order: `[x_origin, x_res, x_rot, y_origin, y_rot, y_res]`
    pub geotransform: [f64; 6],
    pub projection: String,
    pub nodata: Option<f64>,
    pub descriptions: Vec<String>,
}

impl RasterMetadata {
    pub fn pixel_width(&self) -> f64 {
        self.geotransform[1].abs()
    }

    pub fn pixel_height(&self) -> f64 {
        self.geotransform[5].abs()
    }
}

/// Decoded bands plus the metadata needed to georeference them
#[derive(Debug, Clone)]
pub struct RasterData {
    pub bands: Vec<Array2<f64>>,
    pub metadata: RasterMetadata,
}

/// Read every band of a raster file as `f64`.
///
/// Samples equal to the file's nodata value are replaced with NaN.
pub fn read_raster<P: AsRef<Path>>(path: P) -> Result<RasterData> {
    let path = path.as_ref();
    info!("Opening input raster: {}", path.display());

    let mut data = read_backend(path)?;
    let meta = &data.metadata;

    if meta.width == 0 || meta.height == 0 {
        return Err(ImageryError::InvalidDimensions(meta.width, meta.height));
    }

    debug!("Raster dimensions: {}x{}", meta.width, meta.height);
    debug!(
        "Pixel size: {:.6} x {:.6}",
        meta.pixel_width(),
        meta.pixel_height()
    );

    if let Some(nd) = meta.nodata.filter(|v| !v.is_nan()) {
        let mut masked = 0usize;
        for band in data.bands.iter_mut() {
            band.mapv_inplace(|v| {
                if v == nd {
                    masked += 1;
                    f64::NAN
                } else {
                    v
                }
            });
        }
        debug!("Masked {} nodata samples ({})", masked, nd);
    }

    Ok(data)
}

/// Write all bands to a georeferenced raster file
pub fn write_raster<P: AsRef<Path>>(path: P, data: &RasterData) -> Result<()> {
    let path = path.as_ref();
    let meta = &data.metadata;

    if meta.width == 0 || meta.height == 0 {
        return Err(ImageryError::InvalidDimensions(meta.width, meta.height));
    }
    if let Some(band) = data.bands.iter().find(|b| b.dim() != (meta.height, meta.width)) {
        let (rows, cols) = band.dim();
        return Err(ImageryError::InvalidDimensions(cols, rows));
    }

    info!("Creating output raster: {}", path.display());
    write_backend(path, data)?;
    info!("Successfully wrote {} bands to output", data.bands.len());
    Ok(())
}

#[cfg(not(feature = "gdal"))]
fn read_backend(path: &Path) -> Result<RasterData> {
    crate::geotiff::read_geotiff(path)
}

#[cfg(not(feature = "gdal"))]
fn write_backend(path: &Path, data: &RasterData) -> Result<()> {
    crate::geotiff::write_geotiff(path, data)
}

#[cfg(feature = "gdal")]
fn read_backend(path: &Path) -> Result<RasterData> {
    use gdal::{Dataset, Metadata};

    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let band_count = dataset.raster_count();

    let geotransform = dataset.geo_transform()?;
    let nodata = if band_count > 0 {
        dataset.rasterband(1)?.no_data_value()
    } else {
        None
    };

    let mut bands = Vec::with_capacity(band_count);
    let mut descriptions = Vec::with_capacity(band_count);
    for i in 1..=band_count {
        let rasterband = dataset.rasterband(i)?;
        let buffer = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
        let data_vec: Vec<f64> = buffer.into_iter().collect();
        bands.push(Array2::from_shape_vec((height, width), data_vec)?);
        descriptions.push(rasterband.description().unwrap_or_default());
    }

    Ok(RasterData {
        bands,
        metadata: RasterMetadata {
            width,
            height,
            band_count,
            geotransform,
            projection: dataset.projection(),
            nodata,
            descriptions,
        },
    })
}

#[cfg(feature = "gdal")]
fn write_backend(path: &Path, data: &RasterData) -> Result<()> {
    use gdal::{DriverManager, Metadata};

    let meta = &data.metadata;
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut dataset = driver.create_with_band_type::<f64, _>(
        path,
        meta.width,
        meta.height,
        data.bands.len(),
    )?;

    dataset.set_geo_transform(&meta.geotransform)?;
    if !meta.projection.is_empty() {
        dataset.set_projection(&meta.projection)?;
    }

    for (i, band_data) in data.bands.iter().enumerate() {
        let band_index = i + 1;
        debug!("Writing band {}", band_index);

        let mut raster_band = dataset.rasterband(band_index)?;

        // GDAL expects row-major data, which is the standard layout of Array2
        let values: Vec<f64> = band_data.iter().copied().collect();
        let mut buffer = gdal::raster::Buffer::new((meta.width, meta.height), values);
        raster_band.write((0, 0), (meta.width, meta.height), &mut buffer)?;

        if let Some(desc) = meta.descriptions.get(i).filter(|d| !d.is_empty()) {
            raster_band.set_description(desc)?;
        }
        raster_band.set_no_data_value(Some(meta.nodata.unwrap_or(f64::NAN)))?;
    }

    Ok(())
}
