//! GeoTIFF header and windowed sample decoding.
//!
//! Pixels are never decoded as a whole image. Each read opens its own
//! decoder and expands only the strips or tiles under the requested window,
//! one chunk at a time.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::Path;

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::raster::{
    GeoTransform, PixelWindow, RasterMetadata, RasterSamples, SampleBuffer, SampleType, MAX_CHUNK_BYTES,
};
use super::LoadError;
use crate::projection::Crs;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_POINT: u16 = 2;
const USER_DEFINED: u16 = 32767;

const PLANAR_SEPARATE: u16 = 2;

type TiffFile = Decoder<BufReader<File>>;

/// Strip or tile grid of a chunky GeoTIFF, indexed row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkLayout {
    pub chunk_width: u32,
    pub chunk_height: u32,
    pub across: u32,
    pub down: u32,
}

impl ChunkLayout {
    fn of(decoder: &TiffFile, width: u32, height: u32) -> Self {
        let (cw, ch) = decoder.chunk_dimensions();
        let chunk_width = cw.max(1).min(width.max(1));
        let chunk_height = ch.max(1).min(height.max(1));
        Self {
            chunk_width,
            chunk_height,
            across: width.div_ceil(chunk_width),
            down: height.div_ceil(chunk_height),
        }
    }
}

fn open_decoder(path: &Path) -> Result<TiffFile, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| LoadError::parse(path, e))
}

/// Reads dimensions, band layout, chunk grid, georeferencing and CRS.
pub(crate) fn read_metadata(path: &Path) -> Result<(RasterMetadata, ChunkLayout), LoadError> {
    let mut decoder = open_decoder(path)?;
    let parse = |e: tiff::TiffError| LoadError::parse(path, e);

    let (width, height) = decoder.dimensions().map_err(parse)?;

    let bands = match decoder.find_tag(Tag::SamplesPerPixel).map_err(parse)? {
        Some(v) => v.into_u16().map_err(parse)? as usize,
        None => 1,
    };
    let planar = match decoder.find_tag(Tag::PlanarConfiguration).map_err(parse)? {
        Some(v) => v.into_u16().map_err(parse)?,
        None => 1,
    };
    if planar == PLANAR_SEPARATE {
        return Err(LoadError::UnsupportedLayout(
            "planar (band-separate) GeoTIFF".to_string(),
        ));
    }

    let bits = first_u16(&mut decoder, Tag::BitsPerSample, path)?.unwrap_or(1);
    let format = first_u16(&mut decoder, Tag::SampleFormat, path)?.unwrap_or(1);
    let sample_type = sample_type(format, bits)?;

    let layout = ChunkLayout::of(&decoder, width, height);
    check_chunk_size(&layout, bands, sample_type)?;

    let geokeys = match decoder.find_tag(Tag::GeoKeyDirectoryTag).map_err(parse)? {
        Some(v) => parse_geokeys(&v.into_u16_vec().map_err(parse)?),
        None => return Err(LoadError::MissingCrs { path: path.to_path_buf() }),
    };
    let crs = crs_from_geokeys(&geokeys, path)?;

    let mut transform = read_transform(&mut decoder, path)?;
    if geokeys.get(&GT_RASTER_TYPE) == Some(&RASTER_PIXEL_IS_POINT) {
        // Tie points name pixel centres; shift to the pixel corner.
        let (x, y) = transform.apply(-0.5, -0.5);
        transform.origin_x = x;
        transform.origin_y = y;
    }

    let nodata = match decoder.find_tag(Tag::GdalNodata).map_err(parse)? {
        Some(v) => v
            .into_string()
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse::<f64>().ok()),
        None => None,
    };

    let meta = RasterMetadata {
        width,
        height,
        bands,
        sample_type,
        transform,
        crs,
        nodata,
    };
    Ok((meta, layout))
}

/// Reads every `step`-th pixel of `window`, starting at its top-left corner.
///
/// Only chunks holding at least one of those pixels are decoded. A chunk
/// that fails to decode means the file body is corrupt.
pub(crate) fn read_window(
    path: &Path,
    meta: &RasterMetadata,
    layout: &ChunkLayout,
    window: PixelWindow,
    step: u32,
) -> Result<RasterSamples, LoadError> {
    let step = step.max(1);
    let (out_w, out_h) = (window.width().div_ceil(step), window.height().div_ceil(step));
    let bands = meta.bands;
    let mut out = SampleBuffer::zeroed(meta.sample_type, out_w as usize * out_h as usize * bands);
    if out.is_empty() {
        return RasterSamples::new(out_w, out_h, bands, out).map_err(|e| LoadError::parse(path, e));
    }

    let mut decoder = open_decoder(path)?;
    let (cw, ch) = (layout.chunk_width, layout.chunk_height);

    for cy in window.row0 / ch..=(window.row1 - 1) / ch {
        let chunk_row0 = cy * ch;
        let data_h = (meta.height - chunk_row0).min(ch);
        let rows = sampled(window.row0, window.row1, step, chunk_row0, chunk_row0 + data_h);
        if rows.is_empty() {
            continue;
        }

        for cx in window.col0 / cw..=(window.col1 - 1) / cw {
            let chunk_col0 = cx * cw;
            let data_w = (meta.width - chunk_col0).min(cw);
            let cols = sampled(window.col0, window.col1, step, chunk_col0, chunk_col0 + data_w);
            if cols.is_empty() {
                continue;
            }

            let index = cy * layout.across + cx;
            let chunk = decoder
                .read_chunk(index)
                .map_err(|e| LoadError::parse(path, format!("chunk {index}: {e}")))?;
            let chunk = buffer_from(chunk).ok_or_else(|| LoadError::parse(path, "unsupported TIFF sample format"))?;
            if chunk.len() != data_w as usize * data_h as usize * bands {
                return Err(LoadError::parse(
                    path,
                    format!("chunk {index} decoded {} samples, expected {data_w}x{data_h}x{bands}", chunk.len()),
                ));
            }

            let copy = ChunkCopy {
                bands,
                chunk_width: data_w as usize,
                out_width: out_w as usize,
                rows: rows.clone(),
                cols,
                // Offsets of output index 0 relative to the chunk origin
                row_base: i64::from(window.row0) - i64::from(chunk_row0),
                col_base: i64::from(window.col0) - i64::from(chunk_col0),
                step: step as usize,
            };
            if !copy.apply(&mut out, &chunk) {
                return Err(LoadError::parse(path, format!("chunk {index} has an unexpected sample type")));
            }
        }
    }

    RasterSamples::new(out_w, out_h, bands, out).map_err(|e| LoadError::parse(path, e))
}

/// Output indices `i` whose source position `lo + i * step` lies in
/// `[lo, hi) ∩ [start, end)`.
fn sampled(lo: u32, hi: u32, step: u32, start: u32, end: u32) -> Range<u32> {
    let from = start.max(lo);
    let to = end.min(hi);
    if from >= to {
        return 0..0;
    }
    (from - lo).div_ceil(step)..(to - lo).div_ceil(step)
}

/// Where the sampled pixels of one chunk land in the output window.
struct ChunkCopy {
    bands: usize,
    chunk_width: usize,
    out_width: usize,
    rows: Range<u32>,
    cols: Range<u32>,
    row_base: i64,
    col_base: i64,
    step: usize,
}

impl ChunkCopy {
    /// Copies typed samples; `false` when the buffers hold different types.
    fn apply(&self, out: &mut SampleBuffer, chunk: &SampleBuffer) -> bool {
        match (out, chunk) {
            (SampleBuffer::U8(d), SampleBuffer::U8(s)) => self.copy(d, s),
            (SampleBuffer::U16(d), SampleBuffer::U16(s)) => self.copy(d, s),
            (SampleBuffer::U32(d), SampleBuffer::U32(s)) => self.copy(d, s),
            (SampleBuffer::U64(d), SampleBuffer::U64(s)) => self.copy(d, s),
            (SampleBuffer::I8(d), SampleBuffer::I8(s)) => self.copy(d, s),
            (SampleBuffer::I16(d), SampleBuffer::I16(s)) => self.copy(d, s),
            (SampleBuffer::I32(d), SampleBuffer::I32(s)) => self.copy(d, s),
            (SampleBuffer::I64(d), SampleBuffer::I64(s)) => self.copy(d, s),
            (SampleBuffer::F32(d), SampleBuffer::F32(s)) => self.copy(d, s),
            (SampleBuffer::F64(d), SampleBuffer::F64(s)) => self.copy(d, s),
            _ => return false,
        }
        true
    }

    fn copy<T: Copy>(&self, out: &mut [T], chunk: &[T]) {
        let bands = self.bands;
        for j in self.rows.clone() {
            let src_row = (self.row_base + (j as usize * self.step) as i64) as usize;
            for i in self.cols.clone() {
                let src_col = (self.col_base + (i as usize * self.step) as i64) as usize;
                let src = (src_row * self.chunk_width + src_col) * bands;
                let dst = (j as usize * self.out_width + i as usize) * bands;
                out[dst..dst + bands].copy_from_slice(&chunk[src..src + bands]);
            }
        }
    }
}

fn buffer_from(result: DecodingResult) -> Option<SampleBuffer> {
    let buffer = match result {
        DecodingResult::U8(v) => SampleBuffer::U8(v),
        DecodingResult::U16(v) => SampleBuffer::U16(v),
        DecodingResult::U32(v) => SampleBuffer::U32(v),
        DecodingResult::U64(v) => SampleBuffer::U64(v),
        DecodingResult::I8(v) => SampleBuffer::I8(v),
        DecodingResult::I16(v) => SampleBuffer::I16(v),
        DecodingResult::I32(v) => SampleBuffer::I32(v),
        DecodingResult::I64(v) => SampleBuffer::I64(v),
        DecodingResult::F32(v) => SampleBuffer::F32(v),
        DecodingResult::F64(v) => SampleBuffer::F64(v),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(buffer)
}

/// Rejects files whose single strip or tile would not fit the decode limit.
fn check_chunk_size(layout: &ChunkLayout, bands: usize, sample_type: SampleType) -> Result<(), LoadError> {
    let chunk_bytes = u64::from(layout.chunk_width)
        * u64::from(layout.chunk_height)
        * bands as u64
        * sample_type.size_bytes() as u64;
    if chunk_bytes > MAX_CHUNK_BYTES {
        return Err(LoadError::UnsupportedLayout(format!(
            "{}x{} pixel chunks need {} MiB each, limit is {} MiB",
            layout.chunk_width,
            layout.chunk_height,
            chunk_bytes >> 20,
            MAX_CHUNK_BYTES >> 20
        )));
    }
    Ok(())
}

/// First value of a SHORT tag that may hold one value or one per sample.
fn first_u16(decoder: &mut TiffFile, tag: Tag, path: &Path) -> Result<Option<u16>, LoadError> {
    let parse = |e: tiff::TiffError| LoadError::parse(path, e);
    match decoder.find_tag(tag).map_err(parse)? {
        Some(Value::List(values)) => match values.into_iter().next() {
            Some(v) => v.into_u16().map(Some).map_err(parse),
            None => Ok(None),
        },
        Some(v) => v.into_u16().map(Some).map_err(parse),
        None => Ok(None),
    }
}

fn sample_type(format: u16, bits: u16) -> Result<SampleType, LoadError> {
    let ty = match (format, bits) {
        (1, 8) => SampleType::U8,
        (1, 16) => SampleType::U16,
        (1, 32) => SampleType::U32,
        (1, 64) => SampleType::U64,
        (2, 8) => SampleType::I8,
        (2, 16) => SampleType::I16,
        (2, 32) => SampleType::I32,
        (2, 64) => SampleType::I64,
        (3, 32) => SampleType::F32,
        (3, 64) => SampleType::F64,
        _ => {
            return Err(LoadError::UnsupportedLayout(format!(
                "{bits}-bit samples with sample format {format}"
            )))
        }
    };
    Ok(ty)
}

/// Inline (SHORT) entries of a GeoKey directory.
fn parse_geokeys(directory: &[u16]) -> HashMap<u16, u16> {
    let mut keys = HashMap::new();
    let Some(header) = directory.get(..4) else {
        return keys;
    };
    let count = header[3] as usize;
    for entry in directory[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location == 0 {
            keys.insert(key, value);
        }
    }
    keys
}

fn crs_from_geokeys(keys: &HashMap<u16, u16>, path: &Path) -> Result<Crs, LoadError> {
    let model = keys.get(&GT_MODEL_TYPE).copied();
    let code = match model {
        Some(MODEL_TYPE_GEOGRAPHIC) => keys.get(&GEOGRAPHIC_TYPE),
        Some(MODEL_TYPE_PROJECTED) => keys.get(&PROJECTED_CS_TYPE),
        _ => keys.get(&PROJECTED_CS_TYPE).or_else(|| keys.get(&GEOGRAPHIC_TYPE)),
    };

    match code.copied() {
        None | Some(0) => Err(LoadError::MissingCrs {
            path: path.to_path_buf(),
        }),
        Some(USER_DEFINED) => Err(LoadError::UnsupportedCrs(
            "user-defined GeoTIFF coordinate system".to_string(),
        )),
        Some(epsg) => Crs::from_epsg(u32::from(epsg))
            .map_err(|_| LoadError::UnsupportedCrs(format!("EPSG:{epsg}"))),
    }
}

fn read_transform(decoder: &mut TiffFile, path: &Path) -> Result<GeoTransform, LoadError> {
    let parse = |e: tiff::TiffError| LoadError::parse(path, e);

    if let Some(v) = decoder.find_tag(Tag::ModelTransformationTag).map_err(parse)? {
        let m = v.into_f64_vec().map_err(parse)?;
        if m.len() >= 8 {
            return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let tiepoint = decoder.find_tag(Tag::ModelTiepointTag).map_err(parse)?;
    let scale = decoder.find_tag(Tag::ModelPixelScaleTag).map_err(parse)?;
    match (tiepoint, scale) {
        (Some(tp), Some(sc)) => {
            let tp = tp.into_f64_vec().map_err(parse)?;
            let sc = sc.into_f64_vec().map_err(parse)?;
            if tp.len() < 6 || sc.len() < 2 {
                return Err(LoadError::parse(path, "truncated tiepoint or pixel scale"));
            }
            let (i, j, x, y) = (tp[0], tp[1], tp[3], tp[4]);
            let (sx, sy) = (sc[0], sc[1]);
            Ok(GeoTransform::from_gdal([x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy]))
        }
        _ => Err(LoadError::MissingGeoreference {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiff::encoder::{colortype, TiffEncoder};

    /// Value stored at pixel `(col, row)` of the test rasters.
    fn pattern(col: u32, row: u32) -> u8 {
        ((row * 7 + col) % 251) as u8
    }

    /// Writes a 40x30 single-band GeoTIFF in EPSG:3857 with 4-row strips.
    fn write_gray(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("gray.tif");
        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        let mut image = encoder.new_image::<colortype::Gray8>(40, 30).unwrap();
        image.rows_per_strip(4).unwrap();

        let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 3857];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 1000.0, 5000.0, 0.0][..])
            .unwrap();
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..]).unwrap();
        image.encoder().write_tag(Tag::GdalNodata, "255").unwrap();

        let data: Vec<u8> = (0..30).flat_map(|r| (0..40).map(move |c| pattern(c, r))).collect();
        image.write_data(&data).unwrap();
        path
    }

    #[test]
    fn test_read_metadata_of_single_band_file() {
        let dir = TempDir::new().unwrap();
        let path = write_gray(&dir);

        let (meta, layout) = read_metadata(&path).unwrap();
        assert_eq!((meta.width, meta.height, meta.bands), (40, 30, 1));
        assert_eq!(meta.sample_type, SampleType::U8);
        assert_eq!(meta.crs.epsg(), 3857);
        assert_eq!(meta.transform.to_gdal(), [1000.0, 10.0, 0.0, 5000.0, 0.0, -10.0]);
        assert_eq!(meta.nodata, Some(255.0));
        assert_eq!(
            layout,
            ChunkLayout {
                chunk_width: 40,
                chunk_height: 4,
                across: 1,
                down: 8
            }
        );
    }

    #[test]
    fn test_read_window_spans_strips() {
        let dir = TempDir::new().unwrap();
        let path = write_gray(&dir);
        let (meta, layout) = read_metadata(&path).unwrap();

        let window = PixelWindow::new(5, 3, 17, 21);
        let samples = read_window(&path, &meta, &layout, window, 1).unwrap();
        assert_eq!((samples.width(), samples.height()), (12, 18));
        for (i, j) in [(0, 0), (11, 0), (4, 9), (11, 17)] {
            assert_eq!(
                samples.get(0, i64::from(i), i64::from(j)),
                Some(f64::from(pattern(5 + i, 3 + j))),
                "window pixel ({i}, {j})"
            );
        }
    }

    #[test]
    fn test_read_window_decimates() {
        let dir = TempDir::new().unwrap();
        let path = write_gray(&dir);
        let (meta, layout) = read_metadata(&path).unwrap();

        let samples = read_window(&path, &meta, &layout, PixelWindow::new(0, 0, 40, 30), 3).unwrap();
        assert_eq!((samples.width(), samples.height()), (14, 10));
        assert_eq!(samples.get(0, 13, 9), Some(f64::from(pattern(39, 27))));
        assert_eq!(samples.get(0, 2, 5), Some(f64::from(pattern(6, 15))));
    }

    #[test]
    fn test_single_strip_over_limit_is_rejected() {
        // One 20000x20000 RGB strip, as written by tools that never split strips
        let whole = ChunkLayout {
            chunk_width: 20_000,
            chunk_height: 20_000,
            across: 1,
            down: 1,
        };
        let err = check_chunk_size(&whole, 3, SampleType::U8).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedLayout(_)));

        let striped = ChunkLayout {
            chunk_height: 8,
            down: 2_500,
            ..whole
        };
        assert!(check_chunk_size(&striped, 3, SampleType::U8).is_ok());
    }

    #[test]
    fn test_sampled_ranges() {
        assert_eq!(sampled(5, 17, 1, 0, 4), 0..0);
        assert_eq!(sampled(3, 21, 1, 4, 8), 1..5);
        assert_eq!(sampled(0, 40, 3, 4, 8), 2..3);
        assert_eq!(sampled(0, 40, 3, 8, 12), 3..4);
    }

    #[test]
    fn test_parse_geokeys_inline_only() {
        let directory = [
            1, 1, 0, 3, //
            1024, 0, 1, 1, //
            3072, 0, 1, 32633, //
            2049, 34737, 7, 0,
        ];
        let keys = parse_geokeys(&directory);
        assert_eq!(keys.get(&GT_MODEL_TYPE), Some(&1));
        assert_eq!(keys.get(&PROJECTED_CS_TYPE), Some(&32633));
        assert!(!keys.contains_key(&2049));
    }

    #[test]
    fn test_crs_from_geokeys() {
        let path = Path::new("x.tif");
        let mut keys = HashMap::new();
        keys.insert(GT_MODEL_TYPE, MODEL_TYPE_GEOGRAPHIC);
        keys.insert(GEOGRAPHIC_TYPE, 4326);
        assert_eq!(crs_from_geokeys(&keys, path).unwrap().epsg(), 4326);

        keys.insert(GEOGRAPHIC_TYPE, USER_DEFINED);
        assert!(matches!(crs_from_geokeys(&keys, path), Err(LoadError::UnsupportedCrs(_))));

        keys.clear();
        assert!(matches!(crs_from_geokeys(&keys, path), Err(LoadError::MissingCrs { .. })));
    }

    #[test]
    fn test_sample_type_mapping() {
        assert_eq!(sample_type(1, 8).unwrap(), SampleType::U8);
        assert_eq!(sample_type(3, 32).unwrap(), SampleType::F32);
        assert!(matches!(sample_type(1, 12), Err(LoadError::UnsupportedLayout(_))));
    }
}
