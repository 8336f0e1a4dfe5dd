//! Rebuild a scanned document from its redacted page rasters.
//!
//! Each page becomes a full-bleed image at its render DPI, with replacement
//! text drawn on top of the painted covers. Raster coordinates are top-left
//! origin; PDF pages are bottom-left, so placements are flipped during
//! conversion.

use std::io::BufWriter;

use image::RgbImage;
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};
use tracing::{debug, info};

use super::scanned::TextPlacement;
use super::EditorError;

const MM_PER_INCH: f32 = 25.4;

/// Replacement text sits inside the covered box; size it to roughly
/// three-quarters of the box height.
const TEXT_HEIGHT_RATIO: f32 = 0.75;
const MIN_TEXT_PT: f32 = 4.0;

/// One redacted page ready for assembly.
pub struct ScannedPage {
    pub image: RgbImage,
    /// DPI the image and placement boxes are expressed at.
    pub dpi: u32,
    pub placements: Vec<TextPlacement>,
}

/// Assemble redacted page rasters into a new PDF.
pub fn assemble_scanned_pdf(pages: &[ScannedPage], title: &str) -> Result<Vec<u8>, EditorError> {
    let first = pages
        .first()
        .ok_or_else(|| EditorError::Assembly("no pages to assemble".into()))?;

    let (width_mm, height_mm) = page_size_mm(first);
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(width_mm), Mm(height_mm), "Page");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| EditorError::Assembly(e.to_string()))?;

    for (index, page) in pages.iter().enumerate() {
        let (width_mm, height_mm) = page_size_mm(page);
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(Mm(width_mm), Mm(height_mm), "Page");
            doc.get_page(page_index).get_layer(layer_index)
        };

        let xobject = ImageXObject {
            width: Px(page.image.width() as usize),
            height: Px(page.image.height() as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: false,
            image_data: page.image.as_raw().clone(),
            image_filter: None,
            clipping_bbox: None,
            smask: None,
        };
        Image::from(xobject).add_to_layer(
            layer.clone(),
            ImageTransform {
                dpi: Some(page.dpi as f32),
                ..ImageTransform::default()
            },
        );

        for placement in &page.placements {
            let px_to_mm = MM_PER_INCH / page.dpi as f32;
            let x_mm = placement.bbox.x * px_to_mm;
            // Flip to bottom-left origin; baseline sits at the box bottom.
            let y_mm = height_mm - (placement.bbox.y + placement.bbox.height) * px_to_mm;
            let font_pt =
                (placement.bbox.height * 72.0 / page.dpi as f32 * TEXT_HEIGHT_RATIO).max(MIN_TEXT_PT);
            layer.use_text(placement.text.clone(), font_pt, Mm(x_mm), Mm(y_mm), &font);
        }
        debug!(
            page = index + 1,
            placements = page.placements.len(),
            dpi = page.dpi,
            "page assembled"
        );
    }

    let mut bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))
        .map_err(|e| EditorError::Assembly(e.to_string()))?;
    info!(pages = pages.len(), size = bytes.len(), "scanned document assembled");
    Ok(bytes)
}

fn page_size_mm(page: &ScannedPage) -> (f32, f32) {
    let scale = MM_PER_INCH / page.dpi as f32;
    (
        page.image.width() as f32 * scale,
        page.image.height() as f32 * scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::BoundingBox;
    use image::Rgb;

    fn white_page(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn assembles_one_page_per_input() {
        let pages = vec![
            ScannedPage {
                image: white_page(400, 520),
                dpi: 200,
                placements: vec![],
            },
            ScannedPage {
                image: white_page(400, 520),
                dpi: 200,
                placements: vec![],
            },
        ];
        let bytes = assemble_scanned_pdf(&pages, "redacted").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.page_iter().count(), 2);
    }

    #[test]
    fn placement_text_is_extractable() {
        let pages = vec![ScannedPage {
            image: white_page(600, 780),
            dpi: 200,
            placements: vec![TextPlacement {
                text: "REDACTED NAME".to_string(),
                bbox: BoundingBox::new(100.0, 100.0, 200.0, 30.0),
            }],
        }];
        let bytes = assemble_scanned_pdf(&pages, "redacted").unwrap();
        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        assert!(text.contains("REDACTED"), "got: {text}");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            assemble_scanned_pdf(&[], "redacted"),
            Err(EditorError::Assembly(_))
        ));
    }
}
