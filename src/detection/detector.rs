//! Detection orchestrator: recognizer + pattern bank, cached.

use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::DetectionCache;
use super::patterns::pattern_candidates;
use super::recognizer::EntityRecognizer;
use super::resolve::{dedup_candidates, resolve_overlaps};
use super::types::Entity;

pub struct PiiDetector {
    recognizer: Arc<dyn EntityRecognizer>,
    cache: Arc<DetectionCache>,
}

impl PiiDetector {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>, cache: Arc<DetectionCache>) -> Self {
        Self { recognizer, cache }
    }

    /// Detect PII in `text`. Returns the accepted entity set: deduplicated,
    /// sorted by start offset, non-overlapping.
    ///
    /// Recognizer failure degrades to pattern-only detection; it is logged
    /// but never surfaced to the caller.
    pub fn detect(&self, text: &str, threshold: f32, selected_types: &[String]) -> Vec<Entity> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        if let Some(hit) = self.cache.get(text) {
            debug!(entities = hit.len(), "detection cache hit");
            return hit;
        }

        let mut candidates = match self.recognizer.analyze(text) {
            Ok(spans) => spans
                .into_iter()
                .filter(|s| s.score >= threshold)
                .filter(|s| {
                    selected_types.is_empty()
                        || selected_types.iter().any(|t| t == &s.entity_type)
                })
                .filter_map(|s| {
                    let Some(slice) = text.get(s.start..s.end) else {
                        warn!(
                            entity_type = %s.entity_type,
                            start = s.start,
                            end = s.end,
                            "recognizer span outside text bounds, skipped"
                        );
                        return None;
                    };
                    Some(Entity::new(&s.entity_type, slice, s.start, s.end, s.score))
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "recognizer unavailable, falling back to pattern bank only");
                Vec::new()
            }
        };

        candidates.extend(pattern_candidates(text, selected_types));

        let accepted = resolve_overlaps(dedup_candidates(candidates));
        debug!(entities = accepted.len(), chars = text.len(), "detection complete");

        self.cache.insert(text, accepted.clone());
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::recognizer::{FailingRecognizer, MockRecognizer, RecognizedSpan};

    fn detector_with(recognizer: Arc<dyn EntityRecognizer>) -> PiiDetector {
        PiiDetector::new(recognizer, Arc::new(DetectionCache::default()))
    }

    #[test]
    fn merges_recognizer_and_pattern_candidates() {
        let text = "Contact John Smith at john.smith@example.com";
        let recognizer = MockRecognizer::new(vec![RecognizedSpan::new("PERSON", 8, 18, 0.85)]);
        let detector = detector_with(Arc::new(recognizer));

        let entities = detector.detect(text, 0.6, &[]);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, "PERSON");
        assert_eq!(entities[0].text, "John Smith");
        assert_eq!(entities[1].entity_type, "EMAIL_ADDRESS");
        assert_eq!(entities[1].text, "john.smith@example.com");
    }

    #[test]
    fn threshold_filters_recognizer_spans_not_patterns() {
        let text = "John Smith ssn 123-45-6789";
        let recognizer = MockRecognizer::new(vec![RecognizedSpan::new("PERSON", 0, 10, 0.4)]);
        let detector = detector_with(Arc::new(recognizer));

        let entities = detector.detect(text, 0.6, &[]);
        assert_eq!(entities.len(), 1, "low-score PERSON dropped, SSN kept");
        assert_eq!(entities[0].entity_type, "SSN");
    }

    #[test]
    fn recognizer_failure_falls_back_to_patterns() {
        let text = "reach me at jane@corp.org";
        let detector = detector_with(Arc::new(FailingRecognizer));

        let entities = detector.detect(text, 0.6, &[]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "EMAIL_ADDRESS");
    }

    #[test]
    fn selected_types_restrict_both_sources() {
        let text = "John Smith ssn 123-45-6789 mail a@b.co";
        let recognizer = MockRecognizer::new(vec![RecognizedSpan::new("PERSON", 0, 10, 0.9)]);
        let detector = detector_with(Arc::new(recognizer));

        let entities = detector.detect(text, 0.6, &["SSN".to_string()]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "SSN");
    }

    #[test]
    fn out_of_bounds_recognizer_span_is_skipped() {
        let text = "short";
        let recognizer = MockRecognizer::new(vec![RecognizedSpan::new("PERSON", 0, 999, 0.9)]);
        let detector = detector_with(Arc::new(recognizer));
        assert!(detector.detect(text, 0.6, &[]).is_empty());
    }

    #[test]
    fn detection_is_idempotent_via_cache() {
        let text = "card 4111 1111 1111 1111";
        let cache = Arc::new(DetectionCache::default());
        let detector = PiiDetector::new(Arc::new(MockRecognizer::empty()), Arc::clone(&cache));

        let first = detector.detect(text, 0.6, &[]);
        let second = detector.detect(text, 0.6, &[]);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_text_short_circuits() {
        let detector = detector_with(Arc::new(MockRecognizer::empty()));
        assert!(detector.detect("   \n ", 0.6, &[]).is_empty());
    }

    #[test]
    fn overlapping_same_start_prefers_longest() {
        // Recognizer proposes PERSON and ORGANIZATION starting at the same
        // offset; the longer span wins and the result is non-overlapping.
        let text = "Works at Acme Corp Holdings today";
        let recognizer = MockRecognizer::new(vec![
            RecognizedSpan::new("PERSON", 9, 18, 0.9),
            RecognizedSpan::new("ORGANIZATION", 9, 27, 0.8),
        ]);
        let detector = detector_with(Arc::new(recognizer));

        let entities = detector.detect(text, 0.6, &[]);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, "ORGANIZATION");
        assert_eq!(entities[0].text, "Acme Corp Holdings");
    }
}
