use crate::affine::{pixel_floor, Affine};
use crate::band::Band;
use crate::bands::{BandLabel, Bands};
use crate::crs::Crs;
use crate::error::{ImageryError, Result};
use crate::interp::GapMethod;
use crate::io::{read_raster, write_raster, RasterData, RasterMetadata};
use crate::plot::{self, PlotOptions, RgbPlotOptions};
use image::RgbaImage;
use log::{debug, info, warn};
use ndarray::{Array2, Array3};
use rayon::prelude::*;
use std::ops::Deref;
use std::path::Path;

/// Geographic extent of a raster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Bands sharing one grid, plus the transform and CRS that place the grid
/// on the ground.
///
/// The transform and CRS are metadata only: replacing them logs a warning
/// and never resamples the bands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Raster {
    bands: Bands,
    crs: Option<Crs>,
    aff: Option<Affine>,
}

impl Raster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bands(mut self, bands: Bands) -> Result<Self> {
        self.set_bands(bands)?;
        Ok(self)
    }

    pub fn with_crs(mut self, crs: impl Into<Crs>) -> Self {
        self.set_crs(crs);
        self
    }

    pub fn with_aff(mut self, aff: Affine) -> Self {
        self.set_aff(aff);
        self
    }

    /// Replace all bands; they must be non-empty and share dimensions
    pub fn set_bands(&mut self, bands: Bands) -> Result<()> {
        if bands.is_empty() {
            return Err(ImageryError::NoBands);
        }
        bands.shape()?;
        self.bands = bands;
        Ok(())
    }

    /// Returns the previous CRS, if any
    pub fn set_crs(&mut self, crs: impl Into<Crs>) -> Option<Crs> {
        let prev = self.crs.replace(crs.into());
        if prev.is_some() {
            warn!("Changing raster CRS without transforming its data");
        }
        prev
    }

    /// Returns the previous transform, if any
    pub fn set_aff(&mut self, aff: Affine) -> Option<Affine> {
        let prev = self.aff.replace(aff);
        if prev.is_some() {
            warn!("Changing raster transform without transforming its data");
        }
        prev
    }

    pub fn bands(&self) -> &Bands {
        &self.bands
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn aff(&self) -> Option<&Affine> {
        self.aff.as_ref()
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    /// Pixel width in CRS units
    pub fn dx(&self) -> Option<f64> {
        self.aff.map(|aff| aff.a)
    }

    /// Pixel height in CRS units, negative for north-up rasters
    pub fn dy(&self) -> Option<f64> {
        self.aff.map(|aff| aff.e)
    }

    /// `(rows, cols)` of the grid
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.bands.nth(0).map(Band::shape2)
    }

    pub fn n_rows(&self) -> Option<usize> {
        self.shape().map(|(rows, _)| rows)
    }

    pub fn n_cols(&self) -> Option<usize> {
        self.shape().map(|(_, cols)| cols)
    }

    fn require_aff(&self) -> Result<Affine> {
        self.aff.ok_or(ImageryError::MissingTransform)
    }

    pub fn bounds(&self) -> Result<Bounds> {
        let aff = self.require_aff()?;
        let (rows, cols) = self.shape().ok_or(ImageryError::NoBands)?;
        let (rows, cols) = (rows as f64, cols as f64);

        let corners = [
            aff.apply(0.0, 0.0),
            aff.apply(cols, 0.0),
            aff.apply(0.0, rows),
            aff.apply(cols, rows),
        ];
        let (x0, y0) = corners[0];
        let init = Bounds {
            x_min: x0,
            y_min: y0,
            x_max: x0,
            y_max: y0,
        };
        Ok(corners.iter().fold(init, |b, &(x, y)| Bounds {
            x_min: b.x_min.min(x),
            y_min: b.y_min.min(y),
            x_max: b.x_max.max(x),
            y_max: b.y_max.max(y),
        }))
    }

    /// Extent as `(x_min, x_max, y_min, y_max)`
    pub fn plotting_extent(&self) -> Result<(f64, f64, f64, f64)> {
        let b = self.bounds()?;
        Ok((b.x_min, b.x_max, b.y_min, b.y_max))
    }

    /// Closed ring around the bounds, counter-clockwise from the lower left
    pub fn bounding_box(&self) -> Result<Vec<(f64, f64)>> {
        let b = self.bounds()?;
        Ok(vec![
            (b.x_min, b.y_min),
            (b.x_max, b.y_min),
            (b.x_max, b.y_max),
            (b.x_min, b.y_max),
            (b.x_min, b.y_min),
        ])
    }

    /// Geographic `(x, y)` of the upper-left corner of pixel `(row, col)`
    pub fn pix_to_geo(&self, row: f64, col: f64) -> Result<(f64, f64)> {
        Ok(self.require_aff()?.apply(col, row))
    }

    /// Pixel `(row, col)` containing `(x, y)`. May lie outside the grid.
    pub fn geo_to_pix(&self, x: f64, y: f64) -> Result<(i64, i64)> {
        let (col, row) = self.require_aff()?.inverse()?.apply(x, y);
        Ok((pixel_floor(row), pixel_floor(col)))
    }

    /// Replace NaN samples in every band
    pub fn fill_nans(&mut self, value: f64) {
        self.bands
            .entries_mut()
            .par_iter_mut()
            .for_each(|(_, band)| *band = band.fill_nans(value));
    }

    /// Replace negative samples in every band
    pub fn fill_negs(&mut self, value: f64) {
        self.bands
            .entries_mut()
            .par_iter_mut()
            .for_each(|(_, band)| *band = band.fill_negs(value));
    }

    /// Interpolate NaN gaps in every band
    pub fn interpolate_gaps(&mut self, method: GapMethod) {
        self.bands
            .entries_mut()
            .par_iter_mut()
            .for_each(|(label, band)| {
                debug!("Interpolating gaps in band {}", label);
                *band = band.interpolate(method);
            });
    }

    /// Bands labelled `"0".."n-1"` in file order
    pub fn from_data(data: RasterData) -> Result<Self> {
        let RasterData { bands, metadata } = data;
        let bands: Bands = bands
            .into_iter()
            .enumerate()
            .map(|(i, arr)| (i.to_string(), Band::new(arr)))
            .collect();

        let mut raster = Raster::new()
            .with_bands(bands)?
            .with_aff(Affine::from_gdal(metadata.geotransform));
        if !metadata.projection.trim().is_empty() {
            raster.set_crs(metadata.projection);
        }
        Ok(raster)
    }

    pub fn to_data(&self) -> Result<RasterData> {
        let (height, width) = self.shape().ok_or(ImageryError::NoBands)?;
        let aff = self.require_aff()?;

        Ok(RasterData {
            bands: self.bands.values().map(|b| b.clone().into_inner()).collect(),
            metadata: RasterMetadata {
                width,
                height,
                band_count: self.n_bands(),
                geotransform: aff.to_gdal(),
                projection: self.crs.as_ref().map(|c| c.to_string()).unwrap_or_default(),
                nodata: Some(f64::NAN),
                descriptions: self.bands.labels().map(|l| l.to_string()).collect(),
            },
        })
    }

    /// Write all bands to a GeoTIFF
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_raster(path, &self.to_data()?)
    }
}

macro_rules! raster_wrapper {
    ($name:ident) => {
        impl $name {
            pub fn with_crs(mut self, crs: impl Into<Crs>) -> Self {
                self.0.set_crs(crs);
                self
            }

            pub fn with_aff(mut self, aff: Affine) -> Self {
                self.0.set_aff(aff);
                self
            }

            pub fn set_crs(&mut self, crs: impl Into<Crs>) -> Option<Crs> {
                self.0.set_crs(crs)
            }

            pub fn set_aff(&mut self, aff: Affine) -> Option<Affine> {
                self.0.set_aff(aff)
            }

            pub fn fill_nans(&mut self, value: f64) {
                self.0.fill_nans(value)
            }

            pub fn fill_negs(&mut self, value: f64) {
                self.0.fill_negs(value)
            }

            pub fn interpolate_gaps(&mut self, method: GapMethod) {
                self.0.interpolate_gaps(method)
            }

            pub fn into_raster(self) -> Raster {
                self.0
            }
        }

        impl Deref for $name {
            type Target = Raster;

            fn deref(&self) -> &Raster {
                &self.0
            }
        }

        impl AsRef<Raster> for $name {
            fn as_ref(&self) -> &Raster {
                &self.0
            }
        }

        impl From<$name> for Raster {
            fn from(wrapped: $name) -> Raster {
                wrapped.0
            }
        }
    };
}

/// Raster with exactly one band
#[derive(Debug, Clone, PartialEq)]
pub struct SingleBand(Raster);

raster_wrapper!(SingleBand);

impl SingleBand {
    /// Single band labelled `"0"`
    pub fn new(band: impl Into<Band>) -> Self {
        let mut bands = Bands::new();
        bands.insert("0", band);
        Self(Raster {
            bands,
            ..Raster::default()
        })
    }

    pub fn from_bands(bands: Bands) -> Result<Self> {
        let mut sb = Self(Raster::new());
        sb.set_bands(bands)?;
        Ok(sb)
    }

    pub fn set_bands(&mut self, bands: Bands) -> Result<()> {
        if bands.len() != 1 {
            return Err(ImageryError::WrongBandCount {
                kind: "SingleBand",
                expected: "exactly 1",
                found: bands.len(),
            });
        }
        self.0.set_bands(bands)
    }

    /// Replace the band's samples, keeping its label
    pub fn set_band(&mut self, band: impl Into<Band>) -> Result<()> {
        let label = self
            .0
            .bands
            .labels()
            .next()
            .cloned()
            .unwrap_or_else(|| BandLabel::from("0"));
        let mut bands = Bands::new();
        bands.insert(label, band);
        self.0.set_bands(bands)
    }

    pub fn arr(&self) -> &Band {
        &self.0.bands[0]
    }

    /// Illumination in `[0, 1]` for a light at `azimuth`/`altitude` degrees
    pub fn hillshade(&self, azimuth: f64, altitude: f64) -> Array2<f64> {
        let (dx, dy) = self.cell_size();
        plot::hillshade(self.arr(), dx, dy, azimuth, altitude, 1.0)
    }

    pub fn plot(&self, opts: &PlotOptions) -> RgbaImage {
        plot::render_band(self.arr(), self.cell_size(), opts)
    }

    fn cell_size(&self) -> (f64, f64) {
        (self.dx().unwrap_or(1.0), self.dy().unwrap_or(1.0))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        match AnyRaster::from_path(path)? {
            AnyRaster::Single(sb) => Ok(sb),
            AnyRaster::Multi(mb) => Err(ImageryError::WrongBandCount {
                kind: "SingleBand",
                expected: "exactly 1",
                found: mb.n_bands(),
            }),
        }
    }
}

/// Raster with any number of bands
#[derive(Debug, Clone, PartialEq)]
pub struct MultiBand(Raster);

raster_wrapper!(MultiBand);

impl MultiBand {
    pub fn from_bands(bands: Bands) -> Result<Self> {
        Ok(Self(Raster::new().with_bands(bands)?))
    }

    pub fn set_bands(&mut self, bands: Bands) -> Result<()> {
        self.0.set_bands(bands)
    }

    /// Bands stacked as `(rows, cols, n_bands)`
    pub fn arr(&self) -> Result<Array3<f64>> {
        let stacked = self.0.bands.stack(..)?;
        Ok(stacked
            .permuted_axes([1, 2, 0])
            .as_standard_layout()
            .into_owned())
    }

    /// Render the band at position `index`
    pub fn plot_band(&self, index: usize, opts: &PlotOptions) -> Result<RgbaImage> {
        let band = self
            .0
            .bands
            .nth(index)
            .ok_or(ImageryError::BandIndexOutOfRange {
                index,
                len: self.n_bands(),
            })?;
        let cell = (self.dx().unwrap_or(1.0), self.dy().unwrap_or(1.0));
        Ok(plot::render_band(band, cell, opts))
    }

    /// Open a file of any band count
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self(Raster::from_data(read_raster(path)?)?))
    }

    /// Stack the bands of several files sharing one grid. Bands are
    /// labelled `"0".."n-1"` in the order given.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut bands = Bands::new();
        let mut reference: Option<(String, RasterMetadata)> = None;

        for path in paths {
            let path = path.as_ref();
            let data = read_raster(path)?;

            if let Some((first, meta)) = &reference {
                let same_grid =
                    meta.width == data.metadata.width && meta.height == data.metadata.height;
                let same_aff = meta
                    .geotransform
                    .iter()
                    .zip(data.metadata.geotransform.iter())
                    .all(|(a, b)| (a - b).abs() <= 1e-9 * a.abs().max(1.0));
                if !same_grid || !same_aff {
                    debug!("{} differs from {}", path.display(), first);
                    return Err(ImageryError::MismatchedGeoreference(
                        path.display().to_string(),
                    ));
                }
                if meta.projection != data.metadata.projection {
                    warn!("{} has a different projection than {}", path.display(), first);
                }
            } else {
                reference = Some((path.display().to_string(), data.metadata.clone()));
            }

            for arr in data.bands {
                bands.insert(bands.len().to_string(), Band::new(arr));
            }
        }

        let (_, meta) = reference.ok_or(ImageryError::NoBands)?;
        info!("Stacked {} bands from {} files", bands.len(), paths.len());

        let mut raster = Raster::new()
            .with_bands(bands)?
            .with_aff(Affine::from_gdal(meta.geotransform));
        if !meta.projection.trim().is_empty() {
            raster.set_crs(meta.projection);
        }
        Ok(Self(raster))
    }
}

/// Three or four bands labelled `r`, `g`, `b` and optionally `a`
#[derive(Debug, Clone, PartialEq)]
pub struct Rgb(Raster);

raster_wrapper!(Rgb);

const RGBA_LABELS: [&str; 4] = ["r", "g", "b", "a"];

impl Rgb {
    /// Bands are relabelled in order, whatever their input labels
    pub fn from_bands(bands: Bands) -> Result<Self> {
        let mut rgb = Self(Raster::new());
        rgb.set_bands(bands)?;
        Ok(rgb)
    }

    pub fn set_bands(&mut self, bands: Bands) -> Result<()> {
        if !(3..=4).contains(&bands.len()) {
            return Err(ImageryError::WrongBandCount {
                kind: "RGB",
                expected: "3 or 4",
                found: bands.len(),
            });
        }
        self.0.set_bands(bands.relabel(RGBA_LABELS))
    }

    /// Bands stacked as `(rows, cols, 3 or 4)`
    pub fn arr(&self) -> Result<Array3<f64>> {
        let stacked = self.0.bands.stack(..)?;
        Ok(stacked
            .permuted_axes([1, 2, 0])
            .as_standard_layout()
            .into_owned())
    }

    pub fn red(&self) -> &Band {
        &self.0.bands[0]
    }

    pub fn green(&self) -> &Band {
        &self.0.bands[1]
    }

    pub fn blue(&self) -> &Band {
        &self.0.bands[2]
    }

    pub fn alpha(&self) -> Option<&Band> {
        self.0.bands.nth(3)
    }

    /// Composite of the red, green and blue bands
    pub fn plot(&self, opts: &RgbPlotOptions) -> RgbaImage {
        plot::render_rgb(self.red(), self.green(), self.blue(), opts)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Rgb::try_from(MultiBand::from_path(path)?)
    }
}

impl TryFrom<MultiBand> for Rgb {
    type Error = ImageryError;

    fn try_from(mb: MultiBand) -> Result<Self> {
        let mut raster = mb.into_raster();
        let bands = std::mem::take(&mut raster.bands);
        let mut rgb = Self(raster);
        rgb.set_bands(bands)?;
        Ok(rgb)
    }
}

/// A raster opened without knowing its band count
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRaster {
    Single(SingleBand),
    Multi(MultiBand),
}

impl AnyRaster {
    /// `Single` for one-band files, `Multi` otherwise
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raster = Raster::from_data(read_raster(path)?)?;
        if raster.n_bands() == 1 {
            Ok(AnyRaster::Single(SingleBand(raster)))
        } else {
            Ok(AnyRaster::Multi(MultiBand(raster)))
        }
    }

    pub fn raster(&self) -> &Raster {
        match self {
            AnyRaster::Single(sb) => &sb.0,
            AnyRaster::Multi(mb) => &mb.0,
        }
    }

    pub fn into_raster(self) -> Raster {
        match self {
            AnyRaster::Single(sb) => sb.into_raster(),
            AnyRaster::Multi(mb) => mb.into_raster(),
        }
    }
}
