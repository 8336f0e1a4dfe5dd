//! Candidate span resolution.
//!
//! Detection produces one candidate per (source, type, span); the final
//! entity set must be non-overlapping so the editor applies exactly one
//! directive per character.

use std::collections::HashSet;

use super::types::Entity;

/// Drop duplicate candidates sharing `(type, start, end)`, keeping the
/// first occurrence (recognizer candidates precede pattern candidates, so a
/// recognizer score survives over the pattern's 1.0 for identical spans).
pub fn dedup_candidates(candidates: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|e| seen.insert((e.entity_type.clone(), e.start, e.end)))
        .collect()
}

/// Resolve overlaps greedily: sort by start ascending, end descending, then
/// accept each candidate that starts at or after the last accepted end.
/// Ties on start go to the longest span.
pub fn resolve_overlaps(mut candidates: Vec<Entity>) -> Vec<Entity> {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut accepted: Vec<Entity> = Vec::new();
    for candidate in candidates {
        match accepted.last() {
            Some(last) if candidate.start < last.end => continue,
            _ => accepted.push(candidate),
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_of_identical_spans() {
        let candidates = vec![
            Entity::new("SSN", "123-45-6789", 0, 11, 0.8),
            Entity::new("SSN", "123-45-6789", 0, 11, 1.0),
        ];
        let deduped = dedup_candidates(candidates);
        assert_eq!(deduped.len(), 1);
        assert!((deduped[0].score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn dedup_keeps_same_span_different_types() {
        let candidates = vec![
            Entity::new("AADHAAR", "123456789012", 0, 12, 1.0),
            Entity::new("CUSTOM_ID", "123456789012", 0, 12, 1.0),
        ];
        assert_eq!(dedup_candidates(candidates).len(), 2);
    }

    #[test]
    fn accepted_set_is_sorted_and_disjoint() {
        let candidates = vec![
            Entity::new("PHONE_NUMBER", "555-123-4567", 30, 42, 1.0),
            Entity::new("PERSON", "John", 8, 12, 0.9),
            Entity::new("PERSON", "John Smith", 8, 18, 0.9),
        ];
        let accepted = resolve_overlaps(candidates);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].text, "John Smith");
        assert_eq!(accepted[1].start, 30);
        for pair in accepted.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn tie_on_start_goes_to_longest() {
        // Same start offset, different lengths: the longer ORGANIZATION span
        // wins and the shorter PERSON span is rejected as overlapping.
        let candidates = vec![
            Entity::new("PERSON", "Acme Corp", 8, 18, 0.9),
            Entity::new("ORGANIZATION", "Acme Corp Holdings", 8, 22, 0.8),
        ];
        let accepted = resolve_overlaps(candidates);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].entity_type, "ORGANIZATION");
        assert_eq!(accepted[0].end, 22);
    }

    #[test]
    fn adjacent_spans_both_accepted() {
        let candidates = vec![
            Entity::new("PERSON", "Jane", 0, 4, 0.9),
            Entity::new("LOCATION", "Pune", 4, 8, 0.9),
        ];
        assert_eq!(resolve_overlaps(candidates).len(), 2);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resolve_overlaps(Vec::new()).is_empty());
        assert!(dedup_candidates(Vec::new()).is_empty());
    }
}
