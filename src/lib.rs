//! Detection and redaction of personal data in text, word-processing
//! documents and spreadsheets, with a review step in between.

pub mod api;
pub mod data_classifier;
pub mod document;
pub mod redaction;
pub mod store;
pub mod utils;

pub use data_classifier::{detect, ActiveCategories, Finding, MaskOptions, SensitiveDataType};
pub use document::{extract_text, mask_content, DocumentError, DocumentFormat, MaskedContent, ReconstructedArtifact, SourceDocument};
pub use redaction::{redact, ExemptionSet, RedactionCounters};
