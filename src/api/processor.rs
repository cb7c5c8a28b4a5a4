use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::api::config::AppConfig;
use crate::api::models::{AnalyzeRequest, AnalyzeResponse, FileUpload, MaskRequest, MaskResponse, Notice};
use crate::data_classifier::{detect, MaskOptions};
use crate::document::{extract_text, mask_content, DocumentFormat, FallbackEncoding, ReconstructedArtifact, SourceDocument};
use crate::redaction::ExemptionSet;
use crate::store::{parse_id, DownloadRegistry, OneShotStore, UploadCache, UploadedFile};

pub const NO_FINDINGS: &str = "No sensitive data found matching selected filters.";
pub const ANALYSIS_COMPLETE: &str = "Analysis complete. Select items to ignore, then confirm.";
pub const UPLOAD_EXPIRED: &str = "Upload expired; the original file is no longer available, so only the text was masked.";

/// Shared state behind the analyze and mask steps
pub struct AppState {
    pub config: AppConfig,
    pub uploads: Arc<dyn OneShotStore<UploadedFile>>,
    pub downloads: Arc<dyn OneShotStore<ReconstructedArtifact>>,
    pub started: Instant,
}

impl AppState {
    /// State backed by in-memory stores.
    pub fn new(config: AppConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(UploadCache::new("upload")),
            Arc::new(DownloadRegistry::new("download")),
        )
    }

    pub fn with_stores(
        config: AppConfig,
        uploads: Arc<dyn OneShotStore<UploadedFile>>,
        downloads: Arc<dyn OneShotStore<ReconstructedArtifact>>,
    ) -> Self {
        Self {
            config,
            uploads,
            downloads,
            started: Instant::now(),
        }
    }

    fn options(&self, requested: Option<MaskOptions>) -> MaskOptions {
        requested.unwrap_or(self.config.masking.defaults)
    }

    fn fallback(&self) -> FallbackEncoding {
        self.config.masking.fallback_encoding
    }
}

/// Decodes an inline upload and extracts its text, recording problems as
/// notices. Returns the decoded bytes, if any, and the text.
fn read_upload(file: &FileUpload, fallback: FallbackEncoding, notices: &mut Vec<Notice>) -> (Option<Vec<u8>>, String) {
    let bytes = match file.decode() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Upload {} is not valid base64: {}", file.filename, e);
            notices.push(Notice::error(format!("Error reading file: {}", e)));
            return (None, String::new());
        }
    };

    let format = DocumentFormat::from_filename(&file.filename);
    let text = match extract_text(format, &bytes, fallback) {
        Ok(text) => text,
        Err(e) => {
            warn!("Extraction failed for {}: {}", file.filename, e);
            notices.push(Notice::error(e.to_string()));
            String::new()
        }
    };
    (Some(bytes), text)
}

/// Runs the review step: extracts the text of an upload (or takes raw text)
/// and lists what would be redacted.
///
/// An uploaded file is cached so the masking step can rebuild it later.
///
/// # Arguments
/// * `request` - Text or file plus category switches
/// * `state` - Configuration and stores
///
/// # Returns
/// * `AnalyzeResponse` - Findings and notices; never fails outright
#[instrument(skip_all, fields(has_file = request.file.is_some()))]
pub fn analyze(request: AnalyzeRequest, state: &AppState) -> AnalyzeResponse {
    let options = state.options(request.options);
    let mut notices = Vec::new();
    let mut filename = None;
    let mut cache_id = None;

    let text = match request.file.filter(|f| !f.filename.is_empty()) {
        Some(file) => {
            info!("Analyzing upload {}", file.filename);
            let (bytes, text) = read_upload(&file, state.fallback(), &mut notices);
            if let Some(bytes) = bytes {
                cache_id = Some(state.uploads.insert(UploadedFile {
                    filename: file.filename.clone(),
                    bytes,
                }));
            }
            filename = Some(file.filename);
            text
        }
        None => request.text.unwrap_or_default(),
    };

    let findings = if text.is_empty() {
        debug!("Nothing to analyze");
        Vec::new()
    } else {
        let findings = detect(&text, &options.active_categories());
        info!("Analysis found {} unique value(s)", findings.len());
        notices.push(Notice::success(if findings.is_empty() {
            NO_FINDINGS
        } else {
            ANALYSIS_COMPLETE
        }));
        findings
    };

    AnalyzeResponse {
        original_text: text,
        findings,
        filename,
        cache_id,
        options,
        notices,
    }
}

/// Runs the commit step: redacts the reviewed text, rebuilds the original
/// file when one is available and registers it for download.
///
/// The cached upload is released once masking has run.
///
/// # Arguments
/// * `request` - Reviewed text, upload handle or inline file, exemptions
/// * `state` - Configuration and stores
///
/// # Returns
/// * `MaskResponse` - Redacted text, counters, download handle and notices
#[instrument(skip_all, fields(ignored = request.ignored_items.len()))]
pub fn mask(request: MaskRequest, state: &AppState) -> MaskResponse {
    let options = state.options(request.options);
    let exemptions: ExemptionSet = request.ignored_items.into_iter().collect();
    let mut notices = Vec::new();
    let mut text = request.text;
    let mut filename = request.filename.filter(|name| !name.is_empty());
    let mut cached: Option<Uuid> = None;
    let mut source: Option<UploadedFile> = None;

    if let Some(file) = request.file.filter(|f| !f.filename.is_empty()) {
        let (bytes, extracted) = read_upload(&file, state.fallback(), &mut notices);
        if text.is_empty() {
            text = extracted;
        }
        let name = filename.get_or_insert(file.filename).clone();
        source = bytes.map(|bytes| UploadedFile { filename: name, bytes });
    } else if let Some(raw) = request.cache_id.filter(|id| !id.trim().is_empty()) {
        match parse_id(&raw).and_then(|id| state.uploads.get(&id).map(|upload| (id, upload))) {
            Some((id, upload)) => {
                debug!("Using cached upload {}", id);
                let name = filename.get_or_insert(upload.filename).clone();
                source = Some(UploadedFile {
                    filename: name,
                    bytes: upload.bytes,
                });
                cached = Some(id);
            }
            None => {
                warn!("Cached upload {} not found", raw);
                notices.push(Notice::error(UPLOAD_EXPIRED));
            }
        }
    }

    if text.is_empty() {
        debug!("Nothing to mask");
        return MaskResponse {
            original_text: text,
            sanitized_text: String::new(),
            stats: None,
            download_id: None,
            download_filename: None,
            filename,
            options,
            notices,
        };
    }

    let document = source.as_ref().map(|upload| SourceDocument {
        bytes: &upload.bytes,
        filename: &upload.filename,
    });
    let masked = mask_content(&text, document, &options.active_categories(), &exemptions);

    notices.extend(masked.warnings.iter().map(|e| Notice::error(e.to_string())));

    let mut download_filename = None;
    let download_id = masked.artifact.map(|artifact| {
        download_filename = Some(artifact.filename.clone());
        state.downloads.insert(artifact)
    });

    if let Some(id) = cached {
        state.uploads.remove(&id);
    }

    info!("Masking complete: {} item(s) redacted", masked.stats.total);
    notices.push(Notice::success(format!(
        "Masking complete. {} items redacted.",
        masked.stats.total
    )));

    MaskResponse {
        original_text: text,
        sanitized_text: masked.text,
        stats: Some(masked.stats),
        download_id,
        download_filename,
        filename,
        options,
        notices,
    }
}
