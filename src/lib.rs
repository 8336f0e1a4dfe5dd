//! PII detection and redaction for PDF documents.
//!
//! The pipeline takes a PDF byte stream (digital or scanned), locates
//! personally identifiable information, and writes a new PDF in which every
//! detected occurrence is visually and textually obscured while the page
//! layout is preserved.
//!
//! Flow: extraction -> detection -> redaction policy -> page editing.
//! OCR and entity recognition are injected behind capability traits so the
//! pipeline runs and tests without either engine installed.

pub mod config;
pub mod detection;
pub mod editor;
pub mod extraction;
pub mod processor;
pub mod redaction;

pub use config::RedactionConfig;
pub use detection::types::Entity;
pub use processor::{DocumentProcessor, DocumentState, RedactionError, RedactionOutcome};
pub use redaction::policy::RedactionMethod;
