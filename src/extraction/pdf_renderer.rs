//! Page rasterization for scanned documents.
//!
//! Scanned PDFs carry each page as an embedded image XObject. Rather than
//! pulling in a native PDF renderer, the rasterizer extracts the page's
//! largest embedded image and rescales it to the requested DPI using the
//! page MediaBox as the physical reference.

use std::io::Cursor;

use image::{
    imageops::FilterType, DynamicImage, GenericImageView, GrayImage, ImageFormat,
    ImageOutputFormat, RgbImage,
};
use lopdf::{Document, Object, ObjectId, Stream};
use tracing::debug;

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Letter-size fallback when a page carries no MediaBox.
const DEFAULT_PAGE_POINTS: (f32, f32) = (612.0, 792.0);

/// Relative size difference below which the extracted raster is used as-is.
const RESCALE_TOLERANCE: f32 = 0.02;

pub struct PageRasterizer;

impl PdfPageRenderer for PageRasterizer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let page_id = doc.page_iter().nth(page_index).ok_or_else(|| {
            ExtractionError::PdfParsing(format!("page index {page_index} out of range"))
        })?;

        let (media_w, media_h) = media_box(&doc, page_id).unwrap_or(DEFAULT_PAGE_POINTS);
        let image = largest_page_image(&doc, page_id).ok_or_else(|| {
            ExtractionError::ImageProcessing("page has no embedded raster image".into())
        })?;

        let target_w = ((media_w / 72.0) * dpi as f32).round().max(1.0) as u32;
        let target_h = ((media_h / 72.0) * dpi as f32).round().max(1.0) as u32;

        let rgb = image.to_rgb8();
        let scaled = rescale_to_target(rgb, target_w, target_h);

        debug!(
            page = page_index + 1,
            dpi,
            width = scaled.width(),
            height = scaled.height(),
            "page rasterized"
        );
        encode_png(&scaled)
    }
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

fn rescale_to_target(img: RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let diff = (img.width() as f32 - target_w as f32).abs() / target_w as f32;
    if diff <= RESCALE_TOLERANCE {
        return img;
    }
    // Preserve the raster's own aspect ratio; scans are not always cut to
    // the exact MediaBox proportions.
    let scale = target_w as f32 / img.width() as f32;
    let new_h = ((img.height() as f32 * scale).round() as u32)
        .max(1)
        .min(target_h * 2);
    image::imageops::resize(&img, target_w, new_h, FilterType::CatmullRom)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Option<u32> {
    match stream.dict.get(key).ok()? {
        Object::Integer(i) if *i > 0 => Some(*i as u32),
        _ => None,
    }
}

/// Page size in points, walking the Parent chain when the page itself
/// carries no MediaBox.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..16 {
        if let Ok(obj) = dict.get(b"MediaBox") {
            if let Object::Array(coords) = resolve(doc, obj) {
                if coords.len() == 4 {
                    let x0 = as_f32(resolve(doc, &coords[0]))?;
                    let y0 = as_f32(resolve(doc, &coords[1]))?;
                    let x1 = as_f32(resolve(doc, &coords[2]))?;
                    let y1 = as_f32(resolve(doc, &coords[3]))?;
                    return Some(((x1 - x0).abs(), (y1 - y0).abs()));
                }
            }
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => {
                dict = doc.get_dictionary(*parent_id).ok()?;
            }
            _ => return None,
        }
    }
    None
}

/// The largest image XObject referenced by the page resources, decoded.
fn largest_page_image(doc: &Document, page_id: ObjectId) -> Option<DynamicImage> {
    let page = doc.get_dictionary(page_id).ok()?;
    let Object::Dictionary(resources) = resolve(doc, page.get(b"Resources").ok()?) else {
        return None;
    };
    let Object::Dictionary(xobjects) = resolve(doc, resources.get(b"XObject").ok()?) else {
        return None;
    };

    let mut best: Option<DynamicImage> = None;
    for (_name, entry) in xobjects.iter() {
        let Object::Stream(stream) = resolve(doc, entry) else {
            continue;
        };
        let is_image = matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(n)) if n == b"Image"
        );
        if !is_image {
            continue;
        }
        let Some(decoded) = decode_image_stream(stream) else {
            debug!("skipping undecodable image XObject");
            continue;
        };
        let (w, h) = decoded.dimensions();
        let area = w as u64 * h as u64;
        let best_area = best
            .as_ref()
            .map(|b| {
                let (bw, bh) = b.dimensions();
                bw as u64 * bh as u64
            })
            .unwrap_or(0);
        if area > best_area {
            best = Some(decoded);
        }
    }
    best
}

/// Decode an image XObject stream: JPEG passthrough for DCTDecode,
/// raw pixel reconstruction otherwise.
fn decode_image_stream(stream: &Stream) -> Option<DynamicImage> {
    if has_filter(stream, b"DCTDecode") {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok();
    }

    // Streams with no Filter key make decompressed_content() return an
    // error; their content is already the raw pixel data.
    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let width = dict_u32(stream, b"Width")?;
    let height = dict_u32(stream, b"Height")?;
    let expected_rgb = (width as usize) * (height as usize) * 3;
    let expected_gray = (width as usize) * (height as usize);
    let expected_mono = ((width as usize + 7) / 8) * height as usize;

    if data.len() >= expected_rgb {
        let rgb = RgbImage::from_raw(width, height, data[..expected_rgb].to_vec())?;
        return Some(DynamicImage::ImageRgb8(rgb));
    }
    if data.len() >= expected_gray {
        let gray = GrayImage::from_raw(width, height, data[..expected_gray].to_vec())?;
        return Some(DynamicImage::ImageLuma8(gray));
    }
    if data.len() >= expected_mono {
        return Some(DynamicImage::ImageLuma8(expand_mono(
            &data, width, height,
        )));
    }
    None
}

fn has_filter(stream: &Stream, name: &[u8]) -> bool {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == name,
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|f| matches!(f, Object::Name(n) if n == name)),
        _ => false,
    }
}

/// Expand 1-bit-per-pixel rows (MSB first, 1 = white) to 8-bit grayscale.
fn expand_mono(data: &[u8], width: u32, height: u32) -> GrayImage {
    let row_bytes = (width as usize + 7) / 8;
    let mut out = GrayImage::new(width, height);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let byte = data.get(y * row_bytes + x / 8).copied().unwrap_or(0xFF);
            let bit = (byte >> (7 - (x % 8))) & 1;
            out.put_pixel(x as u32, y as u32, image::Luma([if bit == 1 { 255 } else { 0 }]));
        }
    }
    out
}

// ── Mock renderers (testing) ────────────────────────────────────────────────

/// Mock renderer returning a fixed raster per page, independent of DPI.
pub struct MockPageRenderer {
    pages: Vec<RgbImage>,
}

impl MockPageRenderer {
    pub fn new(pages: Vec<RgbImage>) -> Self {
        Self { pages }
    }

    /// Uniform gray pages of the given size.
    pub fn blank_pages(count: usize, width: u32, height: u32) -> Self {
        let page = RgbImage::from_pixel(width, height, image::Rgb([235, 235, 235]));
        Self {
            pages: vec![page; count],
        }
    }
}

impl PdfPageRenderer for MockPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let page = self.pages.get(page_index).ok_or_else(|| {
            ExtractionError::PdfParsing(format!("page index {page_index} out of range"))
        })?;
        encode_png(page)
    }
}

/// Mock renderer that always fails.
pub struct FailingRenderer;

impl PdfPageRenderer for FailingRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        _page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        Err(ExtractionError::ImageProcessing(
            "mock render failure".into(),
        ))
    }
}
