use serde::{Deserialize, Serialize};

/// A detected PII occurrence in the extracted document text.
///
/// `start`/`end` are byte offsets into the text the entity was detected in,
/// always on char boundaries. `text` is the exact matched slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl Entity {
    pub fn new(entity_type: &str, text: &str, start: usize, end: usize, score: f32) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            text: text.to_string(),
            start,
            end,
            score,
        }
    }

    /// Identity for deduplication. Score and text are derived from the span,
    /// so two candidates with the same key describe the same occurrence.
    pub fn key(&self) -> (&str, usize, usize) {
        (&self.entity_type, self.start, self.end)
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_detection() {
        let a = Entity::new("PERSON", "John Smith", 8, 18, 0.9);
        let b = Entity::new("ORGANIZATION", "Smith & Co", 14, 24, 0.8);
        let c = Entity::new("EMAIL_ADDRESS", "a@b.com", 18, 25, 1.0);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c), "adjacent spans do not overlap");
    }

    #[test]
    fn key_ignores_score() {
        let a = Entity::new("SSN", "123-45-6789", 0, 11, 0.7);
        let b = Entity::new("SSN", "123-45-6789", 0, 11, 1.0);
        assert_eq!(a.key(), b.key());
    }
}
