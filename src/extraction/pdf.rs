//! Digital text-layer extraction and the scanned-document heuristic.

use lopdf::{Document, Object};

use super::types::DocumentMetadata;
use super::ExtractionError;

/// Average extractable characters per page below which the document is
/// treated as scanned.
pub const SCANNED_DENSITY_THRESHOLD: usize = 100;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))
    }
}

/// Density heuristic: a document with fewer than
/// [`SCANNED_DENSITY_THRESHOLD`] extractable characters per page on average
/// has no usable text layer.
pub fn is_scanned(page_texts: &[String]) -> bool {
    if page_texts.is_empty() {
        return true;
    }
    let total_chars: usize = page_texts.iter().map(|t| t.trim().chars().count()).sum();
    total_chars / page_texts.len() < SCANNED_DENSITY_THRESHOLD
}

/// Page count from document structure (cheaper and more reliable than
/// running text extraction).
pub fn page_count(pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;
    Ok(doc.page_iter().count())
}

/// Best-effort metadata read from the trailer Info dictionary.
/// Never fails; missing or malformed entries yield defaults.
pub fn read_metadata(pdf_bytes: &[u8]) -> DocumentMetadata {
    let Ok(doc) = Document::load_mem(pdf_bytes) else {
        return DocumentMetadata::default();
    };

    let mut metadata = DocumentMetadata {
        page_count: doc.page_iter().count(),
        ..DocumentMetadata::default()
    };

    if let Ok(info) = doc.trailer.get(b"Info") {
        let info = match info {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        };
        if let Some(Object::Dictionary(dict)) = info {
            metadata.title = info_string(dict.get(b"Title").ok());
            metadata.author = info_string(dict.get(b"Author").ok());
        }
    }

    metadata
}

fn info_string(obj: Option<&Object>) -> Option<String> {
    match obj {
        Some(Object::String(bytes, _)) => {
            let s = String::from_utf8_lossy(bytes).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::make_text_pdf;

    #[test]
    fn extract_text_from_digital_pdf() {
        let pdf_bytes = make_text_pdf(&["Hello World from page one"]);
        let pages = PdfTextExtractor.extract_pages(&pdf_bytes).unwrap();

        assert!(!pages.is_empty(), "should extract at least one page");
        let full_text: String = pages.concat();
        assert!(
            full_text.contains("Hello") || full_text.contains("World"),
            "expected text to contain 'Hello' or 'World', got: {full_text}"
        );
    }

    #[test]
    fn invalid_pdf_returns_error() {
        assert!(PdfTextExtractor.extract_pages(b"not a pdf").is_err());
    }

    #[test]
    fn density_heuristic_flags_sparse_documents() {
        let long_line = "Invoice line with plenty of extractable characters. ".repeat(3);
        assert!(!is_scanned(&[long_line.clone(), long_line]));
        assert!(is_scanned(&["".to_string(), "a few chars".to_string()]));
        assert!(is_scanned(&[]));
    }

    #[test]
    fn density_heuristic_averages_across_pages() {
        // One dense page plus many empty pages drags the average below the
        // threshold.
        let dense = "x".repeat(150);
        let pages = vec![dense, String::new(), String::new(), String::new()];
        assert!(is_scanned(&pages));
    }

    #[test]
    fn page_count_from_structure() {
        let pdf_bytes = make_text_pdf(&["one", "two", "three"]);
        assert_eq!(page_count(&pdf_bytes).unwrap(), 3);
    }

    #[test]
    fn metadata_defaults_when_absent() {
        let pdf_bytes = make_text_pdf(&["no info dictionary here"]);
        let metadata = read_metadata(&pdf_bytes);
        assert_eq!(metadata.page_count, 1);
        assert!(metadata.title.is_none());
        assert!(metadata.author.is_none());
    }

    #[test]
    fn metadata_never_fails_on_garbage() {
        let metadata = read_metadata(b"garbage");
        assert_eq!(metadata, DocumentMetadata::default());
    }
}
