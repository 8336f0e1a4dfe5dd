//! End-to-end document processing.
//!
//! Ties the pipeline together: validate input, extract text, detect PII,
//! build directives, edit the pages, and hand back the redacted document
//! with a manifest of what was done.

use std::path::Path;

use image::{Rgb, RgbImage};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, RedactionConfig};
use crate::detection::PiiDetector;
use crate::editor::{
    assemble_scanned_pdf, redact_digital_pdf, redact_page_image, EditorError, ScannedPage,
};
use crate::extraction::{
    DocumentExtractor, DocumentMetadata, DocumentMode, ExtractionError, ExtractionStatus,
};
use crate::redaction::{build_directives, RedactionDirective};

/// Fallback page size (pixels at 72 DPI) for a scanned page whose render
/// never succeeded; keeps pagination intact in the output.
const FALLBACK_PAGE_PX: (u32, u32) = (612, 792);

#[derive(Debug, Error)]
pub enum RedactionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document contains no extractable text")]
    NoUsableText,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("page editing failed: {0}")]
    Editor(#[from] EditorError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a document moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Uploaded,
    Extracted,
    Detected,
    Redacting,
    Redacted,
    Failed,
}

/// Everything the caller gets back from a redaction run.
#[derive(Debug)]
pub struct RedactionOutcome {
    pub document_id: Uuid,
    pub state: DocumentState,
    /// The redacted document. Identical to the input when no PII was found.
    pub pdf_bytes: Vec<u8>,
    /// Sorted, deduplicated entity types that were redacted.
    pub entity_types: Vec<String>,
    /// The extracted text with every detected span replaced, for display.
    pub redacted_preview: String,
    /// 1-based numbers of pages that yielded no text.
    pub empty_pages: Vec<usize>,
    /// Directives whose text could not be located on any page.
    pub unmatched: usize,
    pub metadata: DocumentMetadata,
    pub no_pii_found: bool,
}

pub struct DocumentProcessor {
    extractor: DocumentExtractor,
    detector: PiiDetector,
}

impl DocumentProcessor {
    pub fn new(extractor: DocumentExtractor, detector: PiiDetector) -> Self {
        Self {
            extractor,
            detector,
        }
    }

    /// Run the full pipeline on an in-memory PDF.
    pub async fn redact(
        &self,
        pdf_bytes: &[u8],
        config: &RedactionConfig,
    ) -> Result<RedactionOutcome, RedactionError> {
        config.validate()?;
        validate_input(pdf_bytes)?;

        let document_id = Uuid::new_v4();
        let mut state = DocumentState::Uploaded;
        info!(%document_id, ?state, size = pdf_bytes.len(), "document accepted");

        let extraction = self.extractor.extract(pdf_bytes).await?;
        if extraction.status == ExtractionStatus::NoUsableText {
            warn!(%document_id, "extraction produced no usable text");
            return Err(RedactionError::NoUsableText);
        }
        state = DocumentState::Extracted;
        debug!(%document_id, ?state, mode = ?extraction.mode, pages = extraction.pages.len(), "extracted");

        let empty_pages: Vec<usize> = extraction
            .pages
            .iter()
            .filter(|p| !p.has_text())
            .map(|p| p.page_number)
            .collect();

        let entities = self.detector.detect(
            &extraction.full_text,
            config.detection_threshold,
            &config.selected_entity_types,
        );
        state = DocumentState::Detected;
        debug!(%document_id, ?state, entities = entities.len(), "detection finished");

        if entities.is_empty() {
            info!(%document_id, "no PII found, returning document unchanged");
            return Ok(RedactionOutcome {
                document_id,
                state: DocumentState::Redacted,
                pdf_bytes: pdf_bytes.to_vec(),
                entity_types: Vec::new(),
                redacted_preview: extraction.full_text,
                empty_pages,
                unmatched: 0,
                metadata: extraction.metadata,
                no_pii_found: true,
            });
        }

        let directives =
            build_directives(&entities, config.method, config.custom_text.as_deref());
        let entity_types = manifest(&directives);
        let redacted_preview = render_preview(&extraction.full_text, &directives);

        state = DocumentState::Redacting;
        debug!(%document_id, ?state, directives = directives.len(), "editing pages");

        let (pdf_bytes, unmatched) = match extraction.mode {
            DocumentMode::Digital => {
                let (bytes, report) = redact_digital_pdf(pdf_bytes, &directives)?;
                (bytes, report.unmatched)
            }
            DocumentMode::Scanned => {
                let mut matched = vec![false; directives.len()];
                let mut out_pages = Vec::with_capacity(extraction.pages.len());
                for page in &extraction.pages {
                    let fallback;
                    let image = match &page.image {
                        Some(image) => image,
                        None => {
                            fallback = blank_page();
                            &fallback
                        }
                    };
                    let edit = redact_page_image(image, &page.words, &directives);
                    for (seen, hit) in matched.iter_mut().zip(&edit.matched) {
                        *seen |= hit;
                    }
                    out_pages.push(ScannedPage {
                        image: edit.image,
                        dpi: if page.image.is_some() { page.dpi } else { 72 },
                        placements: edit.placements,
                    });
                }
                let title = extraction.metadata.title.as_deref().unwrap_or("redacted");
                let bytes = assemble_scanned_pdf(&out_pages, title)?;
                (bytes, matched.iter().filter(|m| !**m).count())
            }
        };

        state = DocumentState::Redacted;
        info!(
            %document_id,
            ?state,
            entities = directives.len(),
            unmatched,
            "redaction complete"
        );

        Ok(RedactionOutcome {
            document_id,
            state,
            pdf_bytes,
            entity_types,
            redacted_preview,
            empty_pages,
            unmatched,
            metadata: extraction.metadata,
            no_pii_found: false,
        })
    }

    /// Redact and write the result next to `destination`, atomically: the
    /// output is staged in a temp file in the same directory and only
    /// renamed into place once fully written.
    pub async fn redact_to_file(
        &self,
        pdf_bytes: &[u8],
        config: &RedactionConfig,
        destination: &Path,
    ) -> Result<RedactionOutcome, RedactionError> {
        let outcome = self.redact(pdf_bytes, config).await?;

        let dir = destination.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut staged, &outcome.pdf_bytes)?;
        staged
            .persist(destination)
            .map_err(|e| RedactionError::Io(e.error))?;

        info!(path = %destination.display(), "redacted document written");
        Ok(outcome)
    }
}

fn blank_page() -> RgbImage {
    RgbImage::from_pixel(FALLBACK_PAGE_PX.0, FALLBACK_PAGE_PX.1, Rgb([255, 255, 255]))
}

fn validate_input(pdf_bytes: &[u8]) -> Result<(), RedactionError> {
    if pdf_bytes.is_empty() {
        return Err(RedactionError::InvalidInput("empty document".into()));
    }
    if !pdf_bytes.starts_with(b"%PDF-") {
        return Err(RedactionError::InvalidInput(
            "not a PDF document (missing %PDF- header)".into(),
        ));
    }
    match crate::extraction::pdf::page_count(pdf_bytes) {
        Ok(0) => Err(RedactionError::InvalidInput(
            "document has no pages".into(),
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(RedactionError::InvalidInput(format!(
            "could not open document: {e}"
        ))),
    }
}

/// Sorted unique entity types touched by the directives.
fn manifest(directives: &[RedactionDirective]) -> Vec<String> {
    let mut types: Vec<String> = directives
        .iter()
        .map(|d| d.entity.entity_type.clone())
        .collect();
    types.sort();
    types.dedup();
    types
}

/// Apply replacements to the extracted text for display. Spans are applied
/// in reverse document order so earlier offsets stay valid; bar methods
/// show a block character per original character.
fn render_preview(full_text: &str, directives: &[RedactionDirective]) -> String {
    let mut sorted: Vec<&RedactionDirective> = directives.iter().collect();
    sorted.sort_by(|a, b| b.entity.start.cmp(&a.entity.start));

    let mut preview = full_text.to_string();
    for directive in sorted {
        let (start, end) = (directive.entity.start, directive.entity.end);
        if end > preview.len() || !preview.is_char_boundary(start) || !preview.is_char_boundary(end)
        {
            continue;
        }
        let replacement = match directive.replacement.as_deref() {
            Some(text) => text.to_string(),
            None => "\u{2588}".repeat(directive.entity.text.chars().count()),
        };
        preview.replace_range(start..end, &replacement);
    }
    preview
}
