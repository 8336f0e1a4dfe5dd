use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// How the document's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentMode {
    /// Embedded text layer, read directly.
    Digital,
    /// Little or no text layer; pages rasterized and OCRed.
    Scanned,
}

/// Outcome classification for the whole extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    Success,
    /// Every page came back empty; the document cannot be redacted safely.
    NoUsableText,
}

/// Axis-aligned box in raster pixels at the page's render DPI,
/// top-left origin (OCR coordinate convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

/// One OCR-recognized word with its confidence and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Warnings about extraction quality. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionWarning {
    BlurryImage { variance: f32 },
    SkewedPage { angle_degrees: f32 },
    RenderFailed { reason: String },
    OcrFailed { reason: String },
    EmptyPage,
}

/// Per-page extraction result.
///
/// For scanned pages, `image` holds the rendered page raster so the editor
/// can paint covers on it later; digital pages carry text only.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    /// 1-based.
    pub page_number: usize,
    pub text: String,
    /// Word-level OCR output; empty for digital pages.
    pub words: Vec<OcrWord>,
    pub image: Option<RgbImage>,
    /// Render DPI the image and word boxes are expressed at.
    pub dpi: u32,
    pub warnings: Vec<ExtractionWarning>,
}

impl PageExtraction {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Document metadata surfaced for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Result of extracting a whole document.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub status: ExtractionStatus,
    pub mode: DocumentMode,
    /// Page texts joined with newlines; the detection input.
    pub full_text: String,
    pub pages: Vec<PageExtraction>,
    pub metadata: DocumentMetadata,
}

/// OCR engine abstraction (allows mocking for tests).
/// Input is encoded image bytes (PNG), output is word-level results.
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<Vec<OcrWord>, ExtractionError>;
}

/// Page rasterization abstraction. `page_index` is 0-based; output is PNG
/// bytes at approximately the requested DPI.
pub trait PdfPageRenderer: Send + Sync {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
