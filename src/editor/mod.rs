//! Page editors: apply redaction directives to the document itself.
//!
//! Digital documents are edited in place: the matched text is scrubbed out
//! of the content streams (so no PII survives under the cover), then covers
//! and replacement text are drawn on top. Scanned documents are edited at
//! the raster level and reassembled into a fresh PDF.

pub mod assemble;
pub mod digital;
pub mod scanned;
pub mod text_layout;

pub use assemble::{assemble_scanned_pdf, ScannedPage};
pub use digital::{redact_digital_pdf, EditReport};
pub use scanned::{redact_page_image, ScannedPageEdit, TextPlacement};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("PDF structure error: {0}")]
    PdfStructure(String),

    #[error("content stream decode failed: {0}")]
    ContentDecode(String),

    #[error("document assembly failed: {0}")]
    Assembly(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
