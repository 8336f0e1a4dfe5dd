//! OCR word filtering and text cleanup.
//!
//! The engine itself sits behind [`OcrEngine`]; this module owns what the
//! pipeline does with its output: the adaptive confidence floor and the
//! PII-aware text reformatting that undoes common OCR spacing damage.

use std::sync::LazyLock;
use std::sync::Mutex;

use regex::Regex;

use super::types::{BoundingBox, OcrEngine, OcrWord};
use super::ExtractionError;

/// Confidence floor once the document has produced confident words.
pub const CONFIDENT_FLOOR: f32 = 0.5;

/// Relaxed floor while the document has produced nothing confident yet;
/// low-quality scans are better under-filtered than silently empty.
pub const SPARSE_FLOOR: f32 = 0.3;

pub fn adaptive_floor(document_has_confident_words: bool) -> f32 {
    if document_has_confident_words {
        CONFIDENT_FLOOR
    } else {
        SPARSE_FLOOR
    }
}

pub fn filter_words(words: Vec<OcrWord>, floor: f32) -> Vec<OcrWord> {
    words
        .into_iter()
        .filter(|w| w.confidence >= floor && !w.text.trim().is_empty())
        .collect()
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static STRAY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s@./+-]").expect("valid regex"));
static CARD_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*(\d{4})\s*(\d{4})\s*(\d{4})").expect("valid regex"));
static AADHAAR_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*(\d{4})\s*(\d{4})").expect("valid regex"));
static SSN_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3})\s+(\d{2})\s+(\d{4})\b").expect("valid regex"));
static PAN_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{5})\s*(\d{4})\s*([A-Z])\b").expect("valid regex"));
static EMAIL_GAPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+)\s*@\s*(\S+)\s*\.\s*(\w+)").expect("valid regex"));

/// Normalize OCR text: collapse whitespace, drop stray glyphs OCR tends to
/// hallucinate, and regroup identifiers whose internal spacing was mangled.
pub fn clean_ocr_text(text: &str) -> String {
    let text = WHITESPACE.replace_all(text.trim(), " ");
    let text = STRAY_CHARS.replace_all(&text, "");
    let text = CARD_GROUPS.replace_all(&text, "${1} ${2} ${3} ${4}");
    let text = AADHAAR_GROUPS.replace_all(&text, "${1} ${2} ${3}");
    let text = SSN_GROUPS.replace_all(&text, "${1}-${2}-${3}");
    let text = PAN_GROUPS.replace_all(&text, "${1}${2}${3}");
    let text = EMAIL_GAPS.replace_all(&text, "${1}@${2}.${3}");
    text.into_owned()
}

/// Join filtered words into page text, cleaned.
pub fn page_text(words: &[OcrWord]) -> String {
    let joined = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    clean_ocr_text(&joined)
}

// ── Mock engine (testing) ───────────────────────────────────────────────────

/// Mock OCR engine for unit testing without an OCR runtime.
///
/// Configured with a script of per-call results so retry behavior can be
/// exercised; the last script entry repeats once the script is exhausted.
pub struct MockOcrEngine {
    script: Mutex<Vec<Result<Vec<OcrWord>, String>>>,
    call_count: Mutex<usize>,
}

impl MockOcrEngine {
    pub fn with_words(words: Vec<OcrWord>) -> Self {
        Self::scripted(vec![Ok(words)])
    }

    pub fn empty() -> Self {
        Self::scripted(vec![Ok(Vec::new())])
    }

    pub fn failing() -> Self {
        Self::scripted(vec![Err("mock OCR failure".to_string())])
    }

    pub fn scripted(script: Vec<Result<Vec<OcrWord>, String>>) -> Self {
        Self {
            script: Mutex::new(script),
            call_count: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<Vec<OcrWord>, ExtractionError> {
        let mut calls = self.call_count.lock().unwrap();
        let script = self.script.lock().unwrap();
        let index = (*calls).min(script.len().saturating_sub(1));
        *calls += 1;
        match &script[index] {
            Ok(words) => Ok(words.clone()),
            Err(reason) => Err(ExtractionError::OcrProcessing(reason.clone())),
        }
    }
}

/// Word constructor shorthand used throughout the tests.
pub fn word(text: &str, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> OcrWord {
    OcrWord {
        text: text.to_string(),
        confidence,
        bbox: BoundingBox::new(x, y, w, h),
    }
}
