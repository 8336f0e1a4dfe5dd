//! Redaction policy engine.
//!
//! Maps the accepted entity set to per-entity directives. Pure computation,
//! independent of whether the page is digital or scanned; the editors only
//! consume directives.

use serde::{Deserialize, Serialize};

use super::synthetic;
use crate::detection::patterns::is_identifier_type;
use crate::detection::types::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMethod {
    BlackBar,
    WhiteBar,
    Masked,
    Random,
    Numbered,
    Custom,
    Partial,
}

impl RedactionMethod {
    /// Bar methods draw an opaque cover only; everything else also carries
    /// replacement text.
    pub fn is_bar(&self) -> bool {
        matches!(self, RedactionMethod::BlackBar | RedactionMethod::WhiteBar)
    }
}

/// One redaction instruction: which span to obscure and what (if anything)
/// to write in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionDirective {
    pub entity: Entity,
    pub method: RedactionMethod,
    /// `None` for bar methods.
    pub replacement: Option<String>,
}

/// Build directives for the accepted entity set, in document order.
///
/// Every non-bar replacement is normalized to the original span's character
/// count so downstream text substitution preserves layout.
pub fn build_directives(
    entities: &[Entity],
    method: RedactionMethod,
    custom_text: Option<&str>,
) -> Vec<RedactionDirective> {
    let mut rng = rand::thread_rng();
    let mut ordinals: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    entities
        .iter()
        .map(|entity| {
            let span_chars = entity.text.chars().count();
            let replacement = match method {
                RedactionMethod::BlackBar | RedactionMethod::WhiteBar => None,
                RedactionMethod::Masked => Some("*".repeat(span_chars)),
                RedactionMethod::Random => Some(normalize_length(
                    &synthetic::generate(&entity.entity_type, &mut rng),
                    span_chars,
                )),
                RedactionMethod::Numbered => {
                    let n = ordinals
                        .entry(entity.entity_type.as_str())
                        .and_modify(|n| *n += 1)
                        .or_insert(1);
                    Some(normalize_length(
                        &format!("{} {}", entity.entity_type, n),
                        span_chars,
                    ))
                }
                RedactionMethod::Custom => Some(repeat_fill(
                    custom_text.unwrap_or("REDACTED"),
                    span_chars,
                )),
                RedactionMethod::Partial => {
                    if is_identifier_type(&entity.entity_type) {
                        Some(partial_mask(&entity.text))
                    } else {
                        // Last-4 exposure is only safe for structured
                        // identifiers; other types fall back to full masking.
                        Some("*".repeat(span_chars))
                    }
                }
            };

            RedactionDirective {
                entity: entity.clone(),
                method,
                replacement,
            }
        })
        .collect()
}

/// Truncate or right-pad `text` with spaces to exactly `target_chars`.
pub fn normalize_length(text: &str, target_chars: usize) -> String {
    let mut out: String = text.chars().take(target_chars).collect();
    let got = out.chars().count();
    out.extend(std::iter::repeat(' ').take(target_chars - got));
    out
}

/// Cycle `text` until it fills exactly `target_chars`.
pub fn repeat_fill(text: &str, target_chars: usize) -> String {
    if text.is_empty() {
        return " ".repeat(target_chars);
    }
    text.chars().cycle().take(target_chars).collect()
}

/// Mask all but the last four payload characters, leaving separators in
/// place: `"1234 5678 9012"` becomes `"**** **** 9012"`.
pub fn partial_mask(text: &str) -> String {
    let payload_count = text.chars().filter(|c| c.is_alphanumeric()).count();
    let masked_count = payload_count.saturating_sub(4);

    let mut seen = 0usize;
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                seen += 1;
                if seen <= masked_count {
                    '*'
                } else {
                    c
                }
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(entity_type: &str, text: &str, start: usize) -> Entity {
        Entity::new(entity_type, text, start, start + text.len(), 1.0)
    }

    fn chars(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn bar_methods_carry_no_replacement() {
        let entities = vec![entity("PERSON", "John Smith", 8)];
        for method in [RedactionMethod::BlackBar, RedactionMethod::WhiteBar] {
            let directives = build_directives(&entities, method, None);
            assert!(directives[0].replacement.is_none());
        }
    }

    #[test]
    fn masked_run_matches_span_length() {
        let entities = vec![
            entity("PERSON", "John Smith", 8),
            entity("EMAIL_ADDRESS", "john.smith@example.com", 22),
        ];
        let directives = build_directives(&entities, RedactionMethod::Masked, None);
        assert_eq!(directives[0].replacement.as_deref(), Some("**********"));
        assert_eq!(
            directives[1].replacement.as_deref().unwrap(),
            "*".repeat(22)
        );
    }

    #[test]
    fn every_non_bar_replacement_is_length_normalized() {
        let entities = vec![
            entity("PERSON", "John Smith", 0),
            entity("SSN", "123-45-6789", 20),
            entity("ORGANIZATION", "Acme Corp", 40),
        ];
        for method in [
            RedactionMethod::Masked,
            RedactionMethod::Random,
            RedactionMethod::Numbered,
            RedactionMethod::Custom,
            RedactionMethod::Partial,
        ] {
            let directives = build_directives(&entities, method, Some("X"));
            for d in &directives {
                let replacement = d.replacement.as_deref().unwrap();
                assert_eq!(
                    chars(replacement),
                    chars(&d.entity.text),
                    "{method:?} replacement must preserve span length"
                );
            }
        }
    }

    #[test]
    fn numbered_counts_per_type_in_document_order() {
        let entities = vec![
            entity("PERSON", "John Smithson", 0),
            entity("EMAIL_ADDRESS", "j@example.com", 20),
            entity("PERSON", "Jane Robertson", 40),
        ];
        let directives = build_directives(&entities, RedactionMethod::Numbered, None);
        assert!(directives[0].replacement.as_deref().unwrap().starts_with("PERSON 1"));
        assert!(directives[1]
            .replacement
            .as_deref()
            .unwrap()
            .starts_with("EMAIL_ADDRESS"));
        assert!(directives[2].replacement.as_deref().unwrap().starts_with("PERSON 2"));
    }

    #[test]
    fn custom_text_cycles_to_fill_the_span() {
        let entities = vec![
            entity("PERSON", "Jo", 0),
            entity("PERSON", "John Smith", 10),
            entity("EMAIL_ADDRESS", "j.smith@example.com", 30),
        ];
        let directives =
            build_directives(&entities, RedactionMethod::Custom, Some("CONFIDENTIAL"));
        assert_eq!(directives[0].replacement.as_deref(), Some("CO"));
        assert_eq!(directives[1].replacement.as_deref(), Some("CONFIDENTI"));
        assert_eq!(
            directives[2].replacement.as_deref(),
            Some("CONFIDENTIALCONFIDE")
        );
    }

    #[test]
    fn partial_keeps_separators_and_last_four() {
        assert_eq!(partial_mask("1234 5678 9012"), "**** **** 9012");
        assert_eq!(partial_mask("ABCDE1234F"), "******234F");
        assert_eq!(partial_mask("4111-1111-1111-1111"), "****-****-****-1111");
    }

    #[test]
    fn partial_short_values_fully_exposed_no_panic() {
        assert_eq!(partial_mask("123"), "123");
        assert_eq!(partial_mask(""), "");
    }

    #[test]
    fn partial_on_non_identifier_falls_back_to_mask() {
        let entities = vec![entity("PERSON", "John Smith", 0)];
        let directives = build_directives(&entities, RedactionMethod::Partial, None);
        assert_eq!(directives[0].replacement.as_deref(), Some("**********"));
    }

    #[test]
    fn partial_on_identifier_exposes_last_four_only() {
        let entities = vec![entity("AADHAAR", "1234 5678 9012", 0)];
        let directives = build_directives(&entities, RedactionMethod::Partial, None);
        assert_eq!(directives[0].replacement.as_deref(), Some("**** **** 9012"));
    }

    #[test]
    fn random_replaces_with_different_plausible_value() {
        let entities = vec![entity("SSN", "123-45-6789", 0)];
        let directives = build_directives(&entities, RedactionMethod::Random, None);
        let replacement = directives[0].replacement.as_deref().unwrap();
        assert_eq!(chars(replacement), 11);
    }
}
