use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_classifier::{Finding, MaskOptions};
use crate::redaction::RedactionCounters;

/// A file carried inline in a JSON request
#[derive(Debug, Clone, Deserialize)]
pub struct FileUpload {
    /// Original filename; its extension selects the format
    pub filename: String,

    /// File content, base64-encoded
    pub content: String,
}

impl FileUpload {
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.content.trim())
    }
}

/// Request to scan text or a file for sensitive data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    /// Raw text, used when no file is given
    #[serde(default)]
    pub text: Option<String>,

    /// Uploaded file
    #[serde(default)]
    pub file: Option<FileUpload>,

    /// Category switches; configured defaults apply when absent
    #[serde(default)]
    pub options: Option<MaskOptions>,
}

/// Review payload returned by the analysis step
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// Plain text that was scanned
    pub original_text: String,

    /// Deduplicated matches for the reviewer
    pub findings: Vec<Finding>,

    /// Name of the uploaded file, if any
    pub filename: Option<String>,

    /// Handle of the cached upload, to be passed back when masking
    pub cache_id: Option<Uuid>,

    pub options: MaskOptions,

    pub notices: Vec<Notice>,
}

/// Request to redact reviewed text and rebuild the uploaded file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaskRequest {
    /// The reviewed text
    #[serde(default)]
    pub text: String,

    /// Handle returned by the analysis step
    #[serde(default)]
    pub cache_id: Option<String>,

    /// Filename to use for the output; the cached one fills in when absent
    #[serde(default)]
    pub filename: Option<String>,

    /// File sent again inline instead of through the cache
    #[serde(default)]
    pub file: Option<FileUpload>,

    #[serde(default)]
    pub options: Option<MaskOptions>,

    /// Matched values the reviewer chose to keep
    #[serde(default)]
    pub ignored_items: Vec<String>,
}

/// Result of the masking step
#[derive(Debug, Serialize)]
pub struct MaskResponse {
    pub original_text: String,

    pub sanitized_text: String,

    /// Redaction counts for the text; absent when there was nothing to mask
    pub stats: Option<RedactionCounters>,

    /// One-time download handle for the rebuilt file
    pub download_id: Option<Uuid>,

    /// Name the download will be served under
    pub download_filename: Option<String>,

    pub filename: Option<String>,

    pub options: MaskOptions,

    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-visible, non-fatal message returned with a workflow result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Status indicator
    pub status: String,

    /// Crate version
    pub version: String,

    /// Uploads analyzed but not yet masked
    pub pending_uploads: usize,

    /// Rebuilt files not yet downloaded
    pub pending_downloads: usize,

    /// Server uptime in seconds
    pub uptime_secs: u64,
}

/// Error response for API endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Status indicator: error
    pub status: String,

    /// Error message details
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
