//! End-to-end pipeline tests against the public API.

use std::sync::Arc;

use lopdf::{dictionary, Document, Object, Stream};
use securepdf::config::RedactionConfig;
use securepdf::detection::recognizer::MockRecognizer;
use securepdf::detection::{DetectionCache, PiiDetector};
use securepdf::extraction::ocr::MockOcrEngine;
use securepdf::extraction::pdf_renderer::FailingRenderer;
use securepdf::extraction::DocumentExtractor;
use securepdf::{DocumentProcessor, RedactionMethod};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "securepdf=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Single-page digital PDF with the given text.
fn text_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let escaped = text
        .replace('\\', r"\\")
        .replace('(', r"\(")
        .replace(')', r"\)");
    let content = format!("BT /F1 12 Tf 72 700 Td ({escaped}) Tj ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    });
    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
        dict.set("Parent", pages_id);
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn processor() -> DocumentProcessor {
    let extractor = DocumentExtractor::new(
        Arc::new(MockOcrEngine::empty()),
        Arc::new(FailingRenderer),
    );
    let detector = PiiDetector::new(
        Arc::new(MockRecognizer::empty()),
        Arc::new(DetectionCache::with_capacity(64)),
    );
    DocumentProcessor::new(extractor, detector)
}

const LETTER: &str = "Dear records team, please update the employee file. The social \
security number on record is 123-45-6789 and the corporate card is \
4111 1111 1111 1111. Kindly confirm receipt of this request by return mail.";

#[tokio::test]
async fn masked_redaction_removes_pii_from_output() {
    init_tracing();
    let pdf = text_pdf(LETTER);
    let config = RedactionConfig::new(RedactionMethod::Masked);

    let outcome = processor().redact(&pdf, &config).await.unwrap();

    assert!(!outcome.no_pii_found);
    assert_eq!(
        outcome.entity_types,
        vec!["CREDIT_CARD".to_string(), "SSN".to_string()]
    );

    let extracted = pdf_text(&outcome.pdf_bytes);
    assert!(!extracted.contains("123-45-6789"), "SSN leaked: {extracted}");
    assert!(
        !extracted.contains("4111 1111 1111 1111"),
        "card leaked: {extracted}"
    );
    assert!(extracted.contains("Dear records team"));
}

#[tokio::test]
async fn partial_redaction_keeps_last_four_visible() {
    init_tracing();
    let pdf = text_pdf(LETTER);
    let config = RedactionConfig::new(RedactionMethod::Partial)
        .with_entity_types(&["CREDIT_CARD"]);

    let outcome = processor().redact(&pdf, &config).await.unwrap();

    assert!(outcome
        .redacted_preview
        .contains("**** **** **** 1111"));
    let extracted = pdf_text(&outcome.pdf_bytes);
    assert!(!extracted.contains("4111 1111 1111 1111"));
    // SSN was not selected, so it must survive untouched.
    assert!(extracted.contains("123-45-6789"));
}

#[tokio::test]
async fn custom_text_fills_each_span() {
    init_tracing();
    let pdf = text_pdf(LETTER);
    let config =
        RedactionConfig::new(RedactionMethod::Custom).with_custom_text("CONFIDENTIAL");

    let outcome = processor().redact(&pdf, &config).await.unwrap();

    // "123-45-6789" spans 11 chars, so the fill is truncated to fit.
    assert!(outcome.redacted_preview.contains("CONFIDENTI"));
    let extracted = pdf_text(&outcome.pdf_bytes);
    assert!(!extracted.contains("123-45-6789"));
}

fn pdf_text(bytes: &[u8]) -> String {
    pdf_extract::extract_text_from_mem(bytes).unwrap()
}
