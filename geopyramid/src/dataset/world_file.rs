//! PNG/JPEG rasters georeferenced by a world file and a `.prj` sidecar.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageDecoder, ImageReader};

use super::raster::{GeoTransform, RasterMetadata, SampleBuffer, SampleType};
use super::{prj, LoadError};

/// Sidecar extensions tried for each image extension, in order.
fn world_file_extensions(image_ext: &str) -> &'static [&'static str] {
    match image_ext {
        "png" => &["pgw", "pngw", "wld"],
        "jpg" | "jpeg" => &["jgw", "jpgw", "jpegw", "wld"],
        _ => &["wld"],
    }
}

fn find_world_file(path: &Path) -> Option<PathBuf> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    world_file_extensions(&ext)
        .iter()
        .map(|candidate| path.with_extension(candidate))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn read_metadata(path: &Path) -> Result<RasterMetadata, LoadError> {
    let reader = ImageReader::open(path).map_err(|e| LoadError::io(path, e))?;
    let decoder = reader.into_decoder().map_err(|e| LoadError::parse(path, e))?;
    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();

    let bands = usize::from(color.channel_count());
    let sample_type = match color.bytes_per_pixel() / color.channel_count() {
        1 => SampleType::U8,
        2 => SampleType::U16,
        4 => SampleType::F32,
        _ => return Err(LoadError::UnsupportedLayout(format!("{color:?} pixels"))),
    };

    let world = find_world_file(path).ok_or_else(|| LoadError::MissingGeoreference {
        path: path.to_path_buf(),
    })?;
    let text = fs::read_to_string(&world).map_err(|e| LoadError::io(&world, e))?;
    let transform = parse_world_file(&text).ok_or_else(|| LoadError::parse(&world, "expected six numeric lines"))?;

    let crs = prj::read_sidecar_crs(path)?.ok_or_else(|| LoadError::MissingCrs {
        path: path.to_path_buf(),
    })?;

    Ok(RasterMetadata {
        width,
        height,
        bands,
        sample_type,
        transform,
        crs,
        nodata: None,
    })
}

pub(crate) fn read_samples(path: &Path) -> Result<SampleBuffer, String> {
    let image = image::open(path).map_err(|e| e.to_string())?;
    let buffer = match image {
        DynamicImage::ImageLuma8(b) => SampleBuffer::U8(b.into_raw()),
        DynamicImage::ImageLumaA8(b) => SampleBuffer::U8(b.into_raw()),
        DynamicImage::ImageRgb8(b) => SampleBuffer::U8(b.into_raw()),
        DynamicImage::ImageRgba8(b) => SampleBuffer::U8(b.into_raw()),
        DynamicImage::ImageLuma16(b) => SampleBuffer::U16(b.into_raw()),
        DynamicImage::ImageLumaA16(b) => SampleBuffer::U16(b.into_raw()),
        DynamicImage::ImageRgb16(b) => SampleBuffer::U16(b.into_raw()),
        DynamicImage::ImageRgba16(b) => SampleBuffer::U16(b.into_raw()),
        DynamicImage::ImageRgb32F(b) => SampleBuffer::F32(b.into_raw()),
        DynamicImage::ImageRgba32F(b) => SampleBuffer::F32(b.into_raw()),
        other => return Err(format!("unsupported pixel layout {:?}", other.color())),
    };
    Ok(buffer)
}

/// Parses the six world-file coefficients into a corner-based transform.
///
/// World files name the centre of the upper-left pixel.
fn parse_world_file(text: &str) -> Option<GeoTransform> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let [a, d, b, e, c, f] = <[f64; 6]>::try_from(values.get(..6)?).ok()?;
    Some(GeoTransform::from_gdal([
        c - 0.5 * a - 0.5 * b,
        a,
        b,
        f - 0.5 * d - 0.5 * e,
        d,
        e,
    ]))
}
