//! Pure-Rust GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Only the first image directory is read. Georeferencing comes from
//! `ModelTransformationTag` or from `ModelPixelScaleTag` + `ModelTiepointTag`,
//! the CRS from the GeoKey directory.

use crate::crs::{Crs, CrsKind};
use crate::error::{ImageryError, Result};
use crate::io::{RasterData, RasterMetadata};
use log::{debug, info, warn};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GT_CITATION_GEO_KEY: u16 = 1026;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const GEOG_CITATION_GEO_KEY: u16 = 2049;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const PCS_CITATION_GEO_KEY: u16 = 3073;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

const GEO_ASCII_PARAMS_TAG: u16 = 34737;

/// GDAL's geotransform for a raster without georeferencing
const DEFAULT_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

pub fn read_geotiff(path: &Path) -> Result<RasterData> {
    let file = BufReader::new(File::open(path)?);
    let mut data = decode(file)?;

    if data.metadata.geotransform == DEFAULT_GEOTRANSFORM {
        warn!("No georeferencing found in {}, using pixel coordinates", path.display());
    }
    info!(
        "Read {} band(s) of {}x{} from {}",
        data.metadata.band_count,
        data.metadata.width,
        data.metadata.height,
        path.display()
    );
    data.metadata.descriptions = vec![String::new(); data.metadata.band_count];
    Ok(data)
}

pub fn write_geotiff(path: &Path, data: &RasterData) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    encode(file, data)
}

/// Decode the first image of a TIFF stream
pub fn decode<R: Read + Seek>(reader: R) -> Result<RasterData> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    if width == 0 || height == 0 {
        return Err(ImageryError::InvalidDimensions(width, height));
    }

    let samples = decoder
        .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
        .unwrap_or(1) as usize;
    let planar = decoder
        .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
        .unwrap_or(1);
    if planar == 2 && samples > 1 {
        return Err(ImageryError::UnsupportedSampleLayout(format!(
            "planar configuration with {} samples per pixel",
            samples
        )));
    }

    let geotransform = read_geotransform(&mut decoder)?;
    let projection = read_projection(&mut decoder)?;
    let nodata = read_nodata(&mut decoder)?;

    debug!(
        "Decoding {}x{} with {} sample(s) per pixel, geotransform {:?}",
        width, height, samples, geotransform
    );

    let values = into_f64(decoder.read_image()?);
    let bands = deinterleave(&values, width, height, samples)?;

    Ok(RasterData {
        metadata: RasterMetadata {
            width,
            height,
            band_count: bands.len(),
            geotransform,
            projection,
            nodata,
            descriptions: Vec::new(),
        },
        bands,
    })
}

/// Encode as a single-strip, chunky `f64` GeoTIFF
pub fn encode<W: Write + Seek>(writer: W, data: &RasterData) -> Result<()> {
    let meta = &data.metadata;
    let n_bands = data.bands.len();
    if n_bands == 0 {
        return Err(ImageryError::NoBands);
    }

    let width = u32::try_from(meta.width)
        .map_err(|_| ImageryError::InvalidDimensions(meta.width, meta.height))?;
    let height = u32::try_from(meta.height)
        .map_err(|_| ImageryError::InvalidDimensions(meta.width, meta.height))?;

    let mut pixels = Vec::with_capacity(meta.width * meta.height * n_bands);
    for row in 0..meta.height {
        for col in 0..meta.width {
            for band in &data.bands {
                pixels.push(band[[row, col]]);
            }
        }
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let mut dir = encoder.image_directory()?;

    dir.write_tag(Tag::ImageWidth, width)?;
    dir.write_tag(Tag::ImageLength, height)?;
    dir.write_tag(Tag::BitsPerSample, vec![64u16; n_bands].as_slice())?;
    dir.write_tag(Tag::Compression, 1u16)?;
    // BlackIsZero: decoders read any sample count as multiband
    dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
    dir.write_tag(Tag::SamplesPerPixel, n_bands as u16)?;
    // IEEE floating point
    dir.write_tag(Tag::SampleFormat, vec![3u16; n_bands].as_slice())?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    dir.write_tag(Tag::RowsPerStrip, height)?;
    if n_bands > 1 {
        dir.write_tag(Tag::ExtraSamples, vec![0u16; n_bands - 1].as_slice())?;
    }

    write_georeference(&mut dir, meta)?;

    let offset = dir.write_data(pixels.as_slice())?;
    let offset = u32::try_from(offset)
        .map_err(|_| ImageryError::InvalidDimensions(meta.width, meta.height))?;
    dir.write_tag(Tag::StripOffsets, offset)?;
    dir.write_tag(Tag::StripByteCounts, (pixels.len() * 8) as u32)?;

    dir.finish()?;
    debug!("Encoded {} band(s) of {}x{}", n_bands, width, height);
    Ok(())
}

fn write_georeference<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    meta: &RasterMetadata,
) -> Result<()> {
    let [c, a, b, f, d, e] = meta.geotransform;

    if b == 0.0 && d == 0.0 {
        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ], Y grows downward in raster space
        dir.write_tag(Tag::ModelPixelScaleTag, [a, -e, 0.0].as_slice())?;
        // ModelTiepoint: pixel (0, 0) -> (c, f)
        dir.write_tag(Tag::ModelTiepointTag, [0.0, 0.0, 0.0, c, f, 0.0].as_slice())?;
    } else {
        let matrix = [
            a, b, 0.0, c, //
            d, e, 0.0, f, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(Tag::ModelTransformationTag, matrix.as_slice())?;
    }

    let crs = Crs::new(meta.projection.as_str());
    let (keys, ascii) = build_geokey_directory(&crs);
    dir.write_tag(Tag::GeoKeyDirectoryTag, keys.as_slice())?;
    if let Some(ascii) = ascii {
        dir.write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }

    if let Some(nd) = meta.nodata {
        dir.write_tag(Tag::GdalNodata, format!("{}", nd).as_str())?;
    }

    Ok(())
}

/// GeoKeyDirectory entries plus the GeoAsciiParams string they point into
fn build_geokey_directory(crs: &Crs) -> (Vec<u16>, Option<String>) {
    let kind = if crs.is_empty() {
        CrsKind::Unknown
    } else {
        crs.kind()
    };
    let epsg = crs.epsg().and_then(|code| u16::try_from(code).ok());

    let model_type = match kind {
        CrsKind::Geographic => MODEL_TYPE_GEOGRAPHIC,
        _ => MODEL_TYPE_PROJECTED,
    };

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type],
        [GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    let mut ascii = None;

    match epsg {
        Some(code) if kind == CrsKind::Geographic => {
            entries.push([GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
        }
        Some(code) => {
            entries.push([PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
        }
        None if !crs.is_empty() => {
            // Keep the definition verbatim as a citation
            let citation = format!("{}|", crs.as_str());
            entries.push([
                GT_CITATION_GEO_KEY,
                GEO_ASCII_PARAMS_TAG,
                citation.len() as u16,
                0,
            ]);
            ascii = Some(citation);
        }
        None => {}
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    for entry in entries {
        keys.extend_from_slice(&entry);
    }
    (keys, ascii)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<[f64; 6]> {
    if let Some(value) = decoder.find_tag(Tag::ModelTransformationTag)? {
        let m = value.into_f64_vec()?;
        if m.len() >= 8 {
            return Ok([m[3], m[0], m[1], m[7], m[4], m[5]]);
        }
        warn!("Ignoring ModelTransformationTag with {} values", m.len());
    }

    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .map(|v| v.into_f64_vec())
        .transpose()?;

    match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            let (i, j, x, y) = (t[0], t[1], t[3], t[4]);
            let (sx, sy) = (s[0], s[1]);
            Ok([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy])
        }
        _ => Ok(DEFAULT_GEOTRANSFORM),
    }
}

fn read_projection<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<String> {
    let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
        Some(value) => value.into_u16_vec()?,
        None => return Ok(String::new()),
    };
    let ascii = decoder
        .find_tag(Tag::GeoAsciiParamsTag)?
        .map(|v| v.into_string())
        .transpose()?
        .unwrap_or_default();

    let mut projected = None;
    let mut geographic = None;
    let mut citation = None;

    for entry in keys.chunks_exact(4).skip(1) {
        let (key, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
        match (key, location) {
            (PROJECTED_CS_TYPE_GEO_KEY, 0) if value != USER_DEFINED => projected = Some(value),
            (GEOGRAPHIC_TYPE_GEO_KEY, 0) if value != USER_DEFINED => geographic = Some(value),
            (GT_CITATION_GEO_KEY | PCS_CITATION_GEO_KEY | GEOG_CITATION_GEO_KEY, GEO_ASCII_PARAMS_TAG) => {
                if citation.is_none() {
                    let start = value as usize;
                    let end = (start + count as usize).min(ascii.len());
                    citation = ascii
                        .get(start..end)
                        .map(|s| s.trim_end_matches(['|', '\0']).to_string());
                }
            }
            _ => {}
        }
    }

    let projection = match (projected, geographic, citation) {
        (Some(code), _, _) | (None, Some(code), _) => Crs::from_epsg(code as u32).to_string(),
        (None, None, Some(text)) => text,
        _ => String::new(),
    };
    debug!("GeoTIFF projection: '{}'", projection);
    Ok(projection)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>> {
    let text = match decoder.find_tag(Tag::GdalNodata)? {
        Some(value) => value.into_string()?,
        None => return Ok(None),
    };
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.parse::<f64>() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            warn!("Ignoring unparseable nodata value '{}'", text);
            Ok(None)
        }
    }
}

fn into_f64(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F16(v) => v.into_iter().map(|x| x.to_f64()).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
    }
}

/// Split chunky `[s0, s1, .., s0, s1, ..]` samples into one grid per band
fn deinterleave(
    values: &[f64],
    width: usize,
    height: usize,
    samples: usize,
) -> Result<Vec<Array2<f64>>> {
    let expected = width * height * samples;
    if values.len() < expected {
        return Err(ImageryError::UnsupportedSampleLayout(format!(
            "expected {} samples, decoded {}",
            expected,
            values.len()
        )));
    }

    (0..samples)
        .map(|s| {
            let band: Vec<f64> = values[..expected]
                .iter()
                .skip(s)
                .step_by(samples)
                .copied()
                .collect();
            Ok(Array2::from_shape_vec((height, width), band)?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use std::io::Cursor;

    fn metadata(width: usize, height: usize, band_count: usize) -> RasterMetadata {
        RasterMetadata {
            width,
            height,
            band_count,
            geotransform: [10.0, 1.0, 0.0, 20.0, 0.0, -1.0],
            projection: "epsg:26911".to_string(),
            nodata: None,
            descriptions: Vec::new(),
        }
    }

    fn roundtrip(data: &RasterData) -> RasterData {
        let mut buffer = Cursor::new(Vec::new());
        encode(&mut buffer, data).unwrap();
        buffer.set_position(0);
        decode(buffer).unwrap()
    }

    #[test]
    fn test_single_band_roundtrip() {
        let band = arr2(&[[1.0, f64::NAN, 3.0], [4.0, 5.0, -6.5]]);
        let data = RasterData {
            bands: vec![band.clone()],
            metadata: metadata(3, 2, 1),
        };

        let back = roundtrip(&data);
        assert_eq!(back.bands.len(), 1);
        assert_eq!(back.metadata.geotransform, data.metadata.geotransform);
        assert_eq!(back.metadata.projection, "epsg:26911");
        assert!(back.bands[0][[0, 1]].is_nan());
        assert_eq!(back.bands[0][[1, 2]], -6.5);
    }

    #[test]
    fn test_two_band_roundtrip_keeps_band_order() {
        let data = RasterData {
            bands: vec![arr2(&[[1.0, 2.0]]), arr2(&[[10.0, 20.0]])],
            metadata: metadata(2, 1, 2),
        };

        let back = roundtrip(&data);
        assert_eq!(back.bands, data.bands);
    }

    #[test]
    fn test_rotated_transform_roundtrip() {
        let mut meta = metadata(2, 2, 1);
        meta.geotransform = [100.0, 2.0, 0.5, 50.0, 0.25, -2.0];
        let data = RasterData {
            bands: vec![arr2(&[[1.0, 2.0], [3.0, 4.0]])],
            metadata: meta,
        };

        let back = roundtrip(&data);
        assert_eq!(back.metadata.geotransform, data.metadata.geotransform);
    }

    #[test]
    fn test_geographic_crs_and_nodata() {
        let mut meta = metadata(1, 1, 1);
        meta.projection = "EPSG:4326".to_string();
        meta.nodata = Some(-9999.0);
        let data = RasterData {
            bands: vec![arr2(&[[-9999.0]])],
            metadata: meta,
        };

        let back = roundtrip(&data);
        assert_eq!(back.metadata.projection, "epsg:4326");
        assert_eq!(back.metadata.nodata, Some(-9999.0));
    }

    #[test]
    fn test_non_epsg_crs_kept_as_citation() {
        let mut meta = metadata(1, 1, 1);
        meta.projection = "+proj=utm +zone=11 +datum=NAD83".to_string();
        let data = RasterData {
            bands: vec![arr2(&[[1.0]])],
            metadata: meta,
        };

        let back = roundtrip(&data);
        assert_eq!(back.metadata.projection, "+proj=utm +zone=11 +datum=NAD83");
    }

    #[test]
    fn test_geokey_directory_projected() {
        let (keys, ascii) = build_geokey_directory(&Crs::from_epsg(32610));
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(keys[7], MODEL_TYPE_PROJECTED);
        assert_eq!(keys[12], PROJECTED_CS_TYPE_GEO_KEY);
        assert_eq!(keys[15], 32610);
        assert!(ascii.is_none());
    }

    #[test]
    fn test_deinterleave() {
        let values = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0];
        let bands = deinterleave(&values, 2, 2, 2).unwrap();
        assert_eq!(bands[0], arr2(&[[1.0, 2.0], [3.0, 4.0]]));
        assert_eq!(bands[1], arr2(&[[10.0, 20.0], [30.0, 40.0]]));
    }

    #[test]
    fn test_empty_raster_rejected() {
        let data = RasterData {
            bands: Vec::new(),
            metadata: metadata(0, 0, 0),
        };
        let mut buffer = Cursor::new(Vec::new());
        assert!(encode(&mut buffer, &data).is_err());
    }
}
