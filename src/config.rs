use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redaction::policy::RedactionMethod;

/// Application-level constants
pub const APP_NAME: &str = "securepdf";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default recognizer score cutoff when the caller does not supply one.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("detection threshold must be within [0.0, 1.0], got {0}")]
    ThresholdOutOfRange(f32),

    #[error("custom redaction method requires non-empty custom_text")]
    MissingCustomText,
}

/// Per-request redaction configuration.
///
/// Arrives as JSON from the caller; `validate()` must pass before the
/// pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    pub method: RedactionMethod,

    /// Entity types to redact. Empty means all supported types.
    #[serde(default)]
    pub selected_entity_types: Vec<String>,

    /// Minimum recognizer score for an entity to be accepted.
    /// Pattern-bank hits carry score 1.0 and always pass.
    #[serde(default = "default_threshold")]
    pub detection_threshold: f32,

    /// Replacement text for the `custom` method.
    #[serde(default)]
    pub custom_text: Option<String>,
}

fn default_threshold() -> f32 {
    DEFAULT_DETECTION_THRESHOLD
}

impl RedactionConfig {
    pub fn new(method: RedactionMethod) -> Self {
        Self {
            method,
            selected_entity_types: Vec::new(),
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            custom_text: None,
        }
    }

    pub fn with_custom_text(mut self, text: &str) -> Self {
        self.custom_text = Some(text.to_string());
        self
    }

    pub fn with_entity_types(mut self, types: &[&str]) -> Self {
        self.selected_entity_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.detection_threshold));
        }
        if self.method == RedactionMethod::Custom
            && self
                .custom_text
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ConfigError::MissingCustomText);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RedactionConfig::new(RedactionMethod::BlackBar);
        assert!(config.validate().is_ok());
        assert!((config.detection_threshold - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn custom_method_requires_text() {
        let config = RedactionConfig::new(RedactionMethod::Custom);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCustomText)
        ));

        let config = RedactionConfig::new(RedactionMethod::Custom).with_custom_text("   ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCustomText)
        ));

        let config = RedactionConfig::new(RedactionMethod::Custom).with_custom_text("CONFIDENTIAL");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = RedactionConfig::new(RedactionMethod::Masked);
        config.detection_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange(_))
        ));

        config.detection_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_json_with_defaults() {
        let config: RedactionConfig = serde_json::from_str(r#"{"method":"masked"}"#).unwrap();
        assert_eq!(config.method, RedactionMethod::Masked);
        assert!(config.selected_entity_types.is_empty());
        assert!((config.detection_threshold - 0.6).abs() < f32::EPSILON);
        assert!(config.custom_text.is_none());
    }
}
