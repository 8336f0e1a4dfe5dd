//! Entity recognizer capability seam.
//!
//! The NER engine is an external collaborator; the pipeline only depends on
//! this trait. Production deployments wire in a model-backed implementation,
//! tests use the mocks below.

use super::DetectionError;

/// A typed span proposed by the recognizer, with byte offsets into the
/// analyzed text (always on char boundaries).
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSpan {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl RecognizedSpan {
    pub fn new(entity_type: &str, start: usize, end: usize, score: f32) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            start,
            end,
            score,
        }
    }
}

pub trait EntityRecognizer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Vec<RecognizedSpan>, DetectionError>;
}

/// Mock recognizer returning a fixed span set, for unit testing without a
/// model installed.
pub struct MockRecognizer {
    spans: Vec<RecognizedSpan>,
}

impl MockRecognizer {
    pub fn new(spans: Vec<RecognizedSpan>) -> Self {
        Self { spans }
    }

    pub fn empty() -> Self {
        Self { spans: Vec::new() }
    }
}

impl EntityRecognizer for MockRecognizer {
    fn analyze(&self, _text: &str) -> Result<Vec<RecognizedSpan>, DetectionError> {
        Ok(self.spans.clone())
    }
}

/// Recognizer that always fails, for exercising the pattern-only fallback.
pub struct FailingRecognizer;

impl EntityRecognizer for FailingRecognizer {
    fn analyze(&self, _text: &str) -> Result<Vec<RecognizedSpan>, DetectionError> {
        Err(DetectionError::Recognizer(
            "mock recognizer failure".to_string(),
        ))
    }
}
