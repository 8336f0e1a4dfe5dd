pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod pdf_renderer;
pub mod preprocess;
pub mod types;

pub use orchestrator::DocumentExtractor;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Document has no pages")]
    NoPages,
}
