//! Fixed structural pattern bank.
//!
//! These patterns describe identifiers whose shape alone is sufficient
//! evidence, so hits carry score 1.0 and bypass the recognizer threshold.

use std::sync::LazyLock;

use regex::Regex;

use super::types::Entity;

/// Entity types the pattern bank can emit.
pub const PATTERN_TYPES: [&str; 8] = [
    "AADHAAR",
    "SSN",
    "CUSTOM_ID",
    "PAN",
    "CREDIT_CARD",
    "EMAIL_ADDRESS",
    "PHONE_NUMBER",
    "IFSC",
];

/// Identifier types eligible for partial (last-4) redaction.
pub fn is_identifier_type(entity_type: &str) -> bool {
    matches!(entity_type, "PAN" | "AADHAAR" | "CREDIT_CARD")
}

static PATTERN_BANK: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("AADHAAR", r"\b\d{4}\s*-?\s*\d{4}\s*-?\s*\d{4}\b"),
        ("SSN", r"\b\d{3}\s*-?\s*\d{2}\s*-?\s*\d{4}\b"),
        ("CUSTOM_ID", r"\b[A-Z0-9]{0,2}\d{6,11}\b"),
        ("PAN", r"\b[A-Z]{5}\d{4}[A-Z]\b"),
        ("CREDIT_CARD", r"\b(?:\d{4}\s*-?\s*){3}\d{4}\b"),
        (
            "EMAIL_ADDRESS",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        ),
        (
            "PHONE_NUMBER",
            r"\b\+?\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        ),
        ("IFSC", r"\b[A-Z]{4}0[A-Z0-9]{6}\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        (
            name,
            Regex::new(pattern).expect("pattern bank regex is valid"),
        )
    })
    .collect()
});

/// Run the pattern bank over `text`, restricted to `selected_types`
/// (empty slice means all pattern types).
pub fn pattern_candidates(text: &str, selected_types: &[String]) -> Vec<Entity> {
    let mut candidates = Vec::new();

    for (name, regex) in PATTERN_BANK.iter() {
        if !selected_types.is_empty() && !selected_types.iter().any(|t| t == name) {
            continue;
        }
        for m in regex.find_iter(text) {
            candidates.push(Entity::new(name, m.as_str(), m.start(), m.end(), 1.0));
        }
    }

    candidates
}
