pub mod cache;
pub mod detector;
pub mod patterns;
pub mod recognizer;
pub mod resolve;
pub mod types;

pub use cache::DetectionCache;
pub use detector::PiiDetector;
pub use recognizer::{EntityRecognizer, RecognizedSpan};
pub use types::Entity;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("entity recognizer failed: {0}")]
    Recognizer(String),
}
