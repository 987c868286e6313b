//! Single-band GeoTIFF codec on top of the `tiff` crate
//!
//! Georeferencing travels in three tags: ModelPixelScale + ModelTiepoint
//! for the transform, the GeoKey directory for the EPSG code, and
//! `GDAL_NODATA` for the sentinel. Byte rasters are written as 8-bit
//! samples, everything else as 32-bit float.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

// Known codes decode to their named variants, never to `Tag::Unknown`
const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Target uncompressed strip size
const STRIP_BYTES: usize = 64 * 1024;

fn tiff_error(context: &'static str) -> impl FnOnce(tiff::TiffError) -> Error {
    move |e| Error::Tiff {
        context,
        message: e.to_string(),
    }
}

/// Decode the first image of a GeoTIFF, casting samples to `T`.
///
/// Samples that do not fit `T` become `T::default_nodata()`.
pub fn read_geotiff<T: RasterElement>(path: impl AsRef<Path>) -> Result<Raster<T>> {
    decode(BufReader::new(File::open(path.as_ref())?))
}

/// Encode `raster` to `path`, replacing any existing file
pub fn write_geotiff<T: RasterElement>(raster: &Raster<T>, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    encode(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn cast_samples<S: num_traits::NumCast + Copy, T: RasterElement>(samples: Vec<S>) -> Vec<T> {
    samples
        .into_iter()
        .map(|s| num_traits::cast(s).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode<T: RasterElement, R: Read + Seek>(reader: R) -> Result<Raster<T>> {
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_error("header"))?
        .with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions().map_err(tiff_error("dimensions"))?;
    let (rows, cols) = (height as usize, width as usize);

    let cells: Vec<T> = match decoder.read_image().map_err(tiff_error("image data"))? {
        DecodingResult::F32(s) => cast_samples(s),
        DecodingResult::F64(s) => cast_samples(s),
        DecodingResult::U8(s) => cast_samples(s),
        DecodingResult::U16(s) => cast_samples(s),
        DecodingResult::U32(s) => cast_samples(s),
        DecodingResult::I8(s) => cast_samples(s),
        DecodingResult::I16(s) => cast_samples(s),
        DecodingResult::I32(s) => cast_samples(s),
        _ => return Err(Error::UnsupportedDataType("64-bit integer samples".into())),
    };

    // Multi-band images decode to a longer buffer than rows * cols
    let mut raster = Raster::from_vec(cells, rows, cols)?;
    if let Some(transform) = read_transform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));
    Ok(raster)
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE).ok()?;
    let tie = decoder.get_tag_f64_vec(MODEL_TIEPOINT).ok()?;
    if scale.len() < 2 || tie.len() < 6 {
        return None;
    }
    // tie = [i, j, k, x, y, z] maps raster point (i, j) to (x, y)
    Some(GeoTransform::new(
        tie[3] - tie[0] * scale[0],
        tie[4] + tie[1] * scale[1],
        scale[0],
        -scale[1],
    ))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok()?;
    epsg_from_geokeys(&keys).map(CRS::from_epsg)
}

/// Projected code if present, else geographic. 0 and 32767 (user defined)
/// are ignored.
fn epsg_from_geokeys(directory: &[u16]) -> Option<u32> {
    if directory.len() < 4 {
        return None;
    }
    let (header, entries) = directory.split_at(4);
    let mut found = (None, None);
    for entry in entries.chunks_exact(4).take(header[3] as usize) {
        // location 0: value stored inline in the last field
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => found.0 = Some(u32::from(entry[3])),
            GEOGRAPHIC_TYPE_KEY => found.1 = Some(u32::from(entry[3])),
            _ => {}
        }
    }
    found.0.or(found.1).filter(|code| !matches!(code, 0 | 32767))
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder.get_tag_ascii_string(GDAL_NODATA).ok()?;
    let value: f64 = text.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok()?;
    num_traits::cast(value)
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    // model type 1 = projected, 2 = geographic; raster type 1 = pixel is area
    let mut entries = vec![[GT_RASTER_TYPE_KEY, 0, 1, 1]];
    match crs.and_then(|c| Some((c.is_geographic(), c.epsg()?))) {
        Some((true, code)) => {
            entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, 2]);
            entries.push([GEOGRAPHIC_TYPE_KEY, 0, 1, code as u16]);
        }
        Some((false, code)) => {
            entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, 1]);
            entries.push([PROJECTED_CS_TYPE_KEY, 0, 1, code as u16]);
        }
        None => entries.insert(0, [GT_MODEL_TYPE_KEY, 0, 1, 1]),
    }
    let mut directory = vec![1, 1, 0, entries.len() as u16];
    directory.extend(entries.into_iter().flatten());
    directory
}

fn encode<T: RasterElement, W: Write + Seek>(raster: &Raster<T>, writer: W) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_error("encoder"))?;
    let (rows, cols) = raster.shape();
    let (width, height) = (cols as u32, rows as u32);

    if T::is_byte() {
        let samples: Vec<u8> = raster
            .data()
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or(u8::MAX))
            .collect();
        let mut image = encoder
            .new_image::<Gray8>(width, height)
            .map_err(tiff_error("new image"))?;
        tag_image(&mut image, raster, 1)?;
        image.write_data(&samples).map_err(tiff_error("image data"))
    } else {
        let samples: Vec<f32> = raster
            .data()
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
            .collect();
        let mut image = encoder
            .new_image::<Gray32Float>(width, height)
            .map_err(tiff_error("new image"))?;
        tag_image(&mut image, raster, 4)?;
        image.write_data(&samples).map_err(tiff_error("image data"))
    }
}

fn tag_image<W, C, K, T>(
    image: &mut ImageEncoder<'_, W, C, K>,
    raster: &Raster<T>,
    sample_bytes: usize,
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    K: TiffKind,
    T: RasterElement,
{
    let row_bytes = (raster.cols() * sample_bytes).max(1);
    let strip_rows = (STRIP_BYTES / row_bytes).clamp(1, raster.rows().max(1));
    image
        .rows_per_strip(strip_rows as u32)
        .map_err(tiff_error("strip layout"))?;

    let gt = raster.transform();
    let dir = image.encoder();
    dir.write_tag(MODEL_PIXEL_SCALE, &[gt.pixel_width, gt.pixel_height.abs(), 0.0][..])
        .map_err(tiff_error("pixel scale"))?;
    dir.write_tag(MODEL_TIEPOINT, &[0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0][..])
        .map_err(tiff_error("tiepoint"))?;
    dir.write_tag(GEO_KEY_DIRECTORY, geokey_directory(raster.crs()).as_slice())
        .map_err(tiff_error("geokeys"))?;
    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        dir.write_tag(GDAL_NODATA, nodata_text(nodata).as_str())
            .map_err(tiff_error("nodata"))?;
    }
    Ok(())
}

/// Integral sentinels are written without a decimal point, as GDAL does
fn nodata_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}
