//! Extraction entry point.
//!
//! Chooses the digital fast path or the per-page OCR path by text density,
//! runs scanned pages through a bounded worker pool, and degrades per page:
//! a page that defeats every retry is recorded empty, and only a document
//! where every page comes back empty is reported as unusable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::ocr::{adaptive_floor, filter_words, page_text, CONFIDENT_FLOOR};
use super::pdf::{is_scanned, read_metadata, PdfTextExtractor};
use super::preprocess::{preprocess_for_ocr, PreprocessBranch};
use super::types::{
    DocumentMode, ExtractionOutcome, ExtractionStatus, ExtractionWarning, OcrEngine,
    PageExtraction, PdfPageRenderer,
};
use super::ExtractionError;

/// Per-page retry ladder: render DPI and preprocessing branch per attempt.
const RETRY_LADDER: [(u32, PreprocessBranch); 3] = [
    (200, PreprocessBranch::Adaptive),
    (300, PreprocessBranch::Adaptive),
    (300, PreprocessBranch::SimpleThreshold),
];

/// Default bound on concurrently OCRed pages.
pub const DEFAULT_MAX_PARALLEL_PAGES: usize = 4;

/// Text-layer resolution in points per inch; digital pages carry no raster.
const TEXT_LAYER_DPI: u32 = 72;

pub struct DocumentExtractor {
    ocr_engine: Arc<dyn OcrEngine>,
    renderer: Arc<dyn PdfPageRenderer>,
    max_parallel_pages: usize,
}

impl DocumentExtractor {
    pub fn new(ocr_engine: Arc<dyn OcrEngine>, renderer: Arc<dyn PdfPageRenderer>) -> Self {
        Self {
            ocr_engine,
            renderer,
            max_parallel_pages: DEFAULT_MAX_PARALLEL_PAGES,
        }
    }

    pub fn with_max_parallel_pages(mut self, limit: usize) -> Self {
        self.max_parallel_pages = limit.max(1);
        self
    }

    /// Extract text from a PDF, with per-page layout for scanned documents.
    pub async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionOutcome, ExtractionError> {
        let metadata = read_metadata(pdf_bytes);

        match PdfTextExtractor.extract_pages(pdf_bytes) {
            Ok(page_texts) if !is_scanned(&page_texts) => {
                info!(pages = page_texts.len(), "digital text layer found");
                Ok(digital_outcome(page_texts, metadata))
            }
            Ok(page_texts) => {
                debug!(
                    pages = page_texts.len(),
                    "text layer too sparse, treating as scanned"
                );
                self.extract_scanned(pdf_bytes, metadata).await
            }
            Err(e) => {
                warn!(error = %e, "text-layer extraction failed, treating as scanned");
                self.extract_scanned(pdf_bytes, metadata).await
            }
        }
    }

    async fn extract_scanned(
        &self,
        pdf_bytes: &[u8],
        metadata: super::types::DocumentMetadata,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let page_count = metadata.page_count;
        if page_count == 0 {
            return Err(ExtractionError::NoPages);
        }

        let bytes = Arc::new(pdf_bytes.to_vec());
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_pages));
        let has_confident = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| ExtractionError::OcrProcessing("worker pool closed".into()))?;
            let bytes = Arc::clone(&bytes);
            let ocr = Arc::clone(&self.ocr_engine);
            let renderer = Arc::clone(&self.renderer);
            let flag = Arc::clone(&has_confident);

            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                extract_scanned_page(&bytes, index, ocr.as_ref(), renderer.as_ref(), &flag)
            }));
        }

        let mut pages = Vec::with_capacity(page_count);
        for handle in handles {
            let page = handle.await.map_err(|e| {
                ExtractionError::OcrProcessing(format!("page worker panicked: {e}"))
            })?;
            pages.push(page);
        }

        let full_text = join_page_texts(&pages);
        let status = if pages.iter().any(PageExtraction::has_text) {
            ExtractionStatus::Success
        } else {
            ExtractionStatus::NoUsableText
        };

        info!(
            pages = pages.len(),
            empty = pages.iter().filter(|p| !p.has_text()).count(),
            "scanned extraction complete"
        );

        Ok(ExtractionOutcome {
            status,
            mode: DocumentMode::Scanned,
            full_text,
            pages,
            metadata,
        })
    }
}

fn digital_outcome(
    page_texts: Vec<String>,
    metadata: super::types::DocumentMetadata,
) -> ExtractionOutcome {
    let pages: Vec<PageExtraction> = page_texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageExtraction {
            page_number: i + 1,
            text,
            words: Vec::new(),
            image: None,
            dpi: TEXT_LAYER_DPI,
            warnings: Vec::new(),
        })
        .collect();

    let full_text = join_page_texts(&pages);
    let status = if pages.iter().any(PageExtraction::has_text) {
        ExtractionStatus::Success
    } else {
        ExtractionStatus::NoUsableText
    };

    ExtractionOutcome {
        status,
        mode: DocumentMode::Digital,
        full_text,
        pages,
        metadata,
    }
}

fn join_page_texts(pages: &[PageExtraction]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// OCR one page through the retry ladder. Infallible: a page that defeats
/// every attempt is returned empty with its warnings attached.
fn extract_scanned_page(
    pdf_bytes: &[u8],
    index: usize,
    ocr: &dyn OcrEngine,
    renderer: &dyn PdfPageRenderer,
    has_confident: &AtomicBool,
) -> PageExtraction {
    let page_number = index + 1;
    let mut warnings = Vec::new();
    let mut last_image: Option<RgbImage> = None;
    let mut last_dpi = RETRY_LADDER[0].0;

    for (attempt, (dpi, branch)) in RETRY_LADDER.iter().enumerate() {
        let rendered = match renderer.render_page(pdf_bytes, index, *dpi) {
            Ok(bytes) => bytes,
            Err(e) => {
                warnings.push(ExtractionWarning::RenderFailed {
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if let Ok(decoded) = image::load_from_memory(&rendered) {
            last_image = Some(decoded.to_rgb8());
            last_dpi = *dpi;
        }

        let preprocessed = match preprocess_for_ocr(&rendered, *branch) {
            Ok(p) => p,
            Err(e) => {
                warnings.push(ExtractionWarning::RenderFailed {
                    reason: format!("preprocess: {e}"),
                });
                continue;
            }
        };

        let words = match ocr.ocr_image(&preprocessed.png_bytes) {
            Ok(words) => words,
            Err(e) => {
                warnings.push(ExtractionWarning::OcrFailed {
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let floor = adaptive_floor(has_confident.load(Ordering::Relaxed));
        let kept = filter_words(words, floor);
        if kept.is_empty() {
            debug!(
                page = page_number,
                attempt = attempt + 1,
                dpi,
                "no words above confidence floor"
            );
            continue;
        }

        if kept.iter().any(|w| w.confidence >= CONFIDENT_FLOOR) {
            has_confident.store(true, Ordering::Relaxed);
        }

        let text = page_text(&kept);
        warnings.extend(preprocessed.report.warnings);
        debug!(
            page = page_number,
            attempt = attempt + 1,
            words = kept.len(),
            "page OCR accepted"
        );
        return PageExtraction {
            page_number,
            text,
            words: kept,
            image: last_image,
            dpi: last_dpi,
            warnings,
        };
    }

    warn!(page = page_number, "page yielded no text after all attempts");
    warnings.push(ExtractionWarning::EmptyPage);
    PageExtraction {
        page_number,
        text: String::new(),
        words: Vec::new(),
        image: last_image,
        dpi: last_dpi,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures::make_text_pdf;
    use crate::extraction::ocr::{word, MockOcrEngine};
    use crate::extraction::pdf_renderer::{FailingRenderer, MockPageRenderer};

    fn dense_text() -> String {
        "This digital page carries more than one hundred characters of body text, \
         enough to stay above the scanned-document density threshold."
            .to_string()
    }

    #[tokio::test]
    async fn digital_document_uses_text_layer() {
        let pdf = make_text_pdf(&[&dense_text()]);
        let extractor = DocumentExtractor::new(
            Arc::new(MockOcrEngine::failing()),
            Arc::new(FailingRenderer),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.mode, DocumentMode::Digital);
        assert_eq!(outcome.status, ExtractionStatus::Success);
        assert!(outcome.full_text.contains("density threshold"));
        assert!(outcome.pages[0].words.is_empty());
    }

    #[tokio::test]
    async fn sparse_document_goes_through_ocr() {
        let pdf = make_text_pdf(&["stamp"]);
        let engine = Arc::new(MockOcrEngine::with_words(vec![
            word("Patient", 0.92, 10.0, 10.0, 60.0, 14.0),
            word("John", 0.90, 80.0, 10.0, 40.0, 14.0),
        ]));
        let extractor = DocumentExtractor::new(
            Arc::clone(&engine) as Arc<dyn crate::extraction::types::OcrEngine>,
            Arc::new(MockPageRenderer::blank_pages(1, 120, 120)),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.mode, DocumentMode::Scanned);
        assert_eq!(outcome.full_text, "Patient John");
        assert_eq!(outcome.pages[0].words.len(), 2);
        assert!(outcome.pages[0].image.is_some());
    }

    #[tokio::test]
    async fn retry_ladder_recovers_on_second_attempt() {
        let pdf = make_text_pdf(&["x"]);
        let engine = Arc::new(MockOcrEngine::scripted(vec![
            Ok(Vec::new()),
            Ok(vec![word("Recovered", 0.8, 5.0, 5.0, 70.0, 12.0)]),
        ]));
        let extractor = DocumentExtractor::new(
            Arc::clone(&engine) as Arc<dyn crate::extraction::types::OcrEngine>,
            Arc::new(MockPageRenderer::blank_pages(1, 120, 120)),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::Success);
        assert_eq!(outcome.pages[0].text, "Recovered");
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn relaxed_floor_keeps_low_confidence_words_early() {
        let pdf = make_text_pdf(&["x"]);
        let engine = Arc::new(MockOcrEngine::with_words(vec![word(
            "faint", 0.35, 5.0, 5.0, 40.0, 12.0,
        )]));
        let extractor = DocumentExtractor::new(
            Arc::clone(&engine) as Arc<dyn crate::extraction::types::OcrEngine>,
            Arc::new(MockPageRenderer::blank_pages(1, 120, 120)),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.pages[0].text, "faint");
    }

    #[tokio::test]
    async fn exhausted_ladder_marks_page_empty() {
        let pdf = make_text_pdf(&["x"]);
        let extractor = DocumentExtractor::new(
            Arc::new(MockOcrEngine::empty()),
            Arc::new(MockPageRenderer::blank_pages(1, 120, 120)),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::NoUsableText);
        assert!(outcome.pages[0]
            .warnings
            .contains(&ExtractionWarning::EmptyPage));
    }

    #[tokio::test]
    async fn render_failure_degrades_to_empty_page() {
        let pdf = make_text_pdf(&["x"]);
        let extractor = DocumentExtractor::new(
            Arc::new(MockOcrEngine::with_words(vec![word(
                "never", 0.9, 0.0, 0.0, 10.0, 10.0,
            )])),
            Arc::new(FailingRenderer),
        );

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.status, ExtractionStatus::NoUsableText);
        assert!(outcome.pages[0]
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::RenderFailed { .. })));
    }

    #[tokio::test]
    async fn page_order_is_preserved_under_the_worker_pool() {
        let pdf = make_text_pdf(&["a", "b", "c"]);
        let engine = Arc::new(MockOcrEngine::scripted(vec![
            Ok(vec![word("one", 0.9, 0.0, 0.0, 10.0, 10.0)]),
            Ok(vec![word("two", 0.9, 0.0, 0.0, 10.0, 10.0)]),
            Ok(vec![word("three", 0.9, 0.0, 0.0, 10.0, 10.0)]),
        ]));
        let extractor = DocumentExtractor::new(
            Arc::clone(&engine) as Arc<dyn crate::extraction::types::OcrEngine>,
            Arc::new(MockPageRenderer::blank_pages(3, 120, 120)),
        )
        .with_max_parallel_pages(1);

        let outcome = extractor.extract(&pdf).await.unwrap();
        assert_eq!(outcome.full_text, "one\ntwo\nthree");
        let numbers: Vec<usize> = outcome.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
