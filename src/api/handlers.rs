use actix_web::error::BlockingError;
use actix_web::http::header::ContentDisposition;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::api::models::{AnalyzeRequest, ErrorResponse, HealthStatus, MaskRequest};
use crate::api::processor::{self, AppState};
use crate::store::{parse_id, OneShotStore};

pub const LINK_EXPIRED: &str = "File link expired or invalid.";

/// Maps the outcome of a blocking job run under a timeout to a response.
fn respond<T: Serialize>(outcome: Result<Result<T, BlockingError>, Elapsed>, limit: Duration) -> HttpResponse {
    match outcome {
        Ok(Ok(body)) => HttpResponse::Ok().json(body),
        Ok(Err(e)) => {
            error!("Request processing failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Internal error while processing the request."))
        }
        Err(_) => {
            error!("Request timed out after {:?}", limit);
            HttpResponse::RequestTimeout().json(ErrorResponse::new("Request timed out."))
        }
    }
}

/// HTTP handler for the review step
///
/// Runs extraction and detection on the blocking pool and waits for the
/// result with the configured timeout.
///
/// # Arguments
/// * `request` - JSON body with text or a base64 file
/// * `state` - Shared configuration and stores
///
/// # Returns
/// * HTTP response with findings and notices, or an error
#[instrument(skip_all)]
pub async fn analyze_handler(request: web::Json<AnalyzeRequest>, state: web::Data<AppState>) -> impl Responder {
    info!("Received analyze request");
    let limit = state.config.server.request_timeout();
    let job_state = state.clone();
    let job = web::block(move || processor::analyze(request.into_inner(), &job_state));
    respond(timeout(limit, job).await, limit)
}

/// HTTP handler for the commit step
///
/// # Arguments
/// * `request` - JSON body with the reviewed text, exemptions and upload handle
/// * `state` - Shared configuration and stores
///
/// # Returns
/// * HTTP response with the redacted text, counters and download handle
#[instrument(skip_all)]
pub async fn mask_handler(request: web::Json<MaskRequest>, state: web::Data<AppState>) -> impl Responder {
    info!("Received mask request");
    let limit = state.config.server.request_timeout();
    let job_state = state.clone();
    let job = web::block(move || processor::mask(request.into_inner(), &job_state));
    respond(timeout(limit, job).await, limit)
}

/// Serves a rebuilt file once; the link is spent afterwards.
#[instrument(skip(state))]
pub async fn download_handler(path: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    let raw = path.into_inner();
    match parse_id(&raw).and_then(|id| state.downloads.take(&id)) {
        Some(artifact) => {
            info!("Serving {} ({} bytes)", artifact.filename, artifact.bytes.len());
            HttpResponse::Ok()
                .content_type(artifact.content_type())
                .insert_header(ContentDisposition::attachment(artifact.filename.clone()))
                .body(artifact.bytes)
        }
        None => {
            warn!("Download {} not found", raw);
            HttpResponse::NotFound().json(ErrorResponse::new(LINK_EXPIRED))
        }
    }
}

/// Health check endpoint for monitoring service status
#[instrument(skip(state))]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pending_uploads: state.uploads.len(),
        pending_downloads: state.downloads.len(),
        uptime_secs: state.started.elapsed().as_secs(),
    };
    debug!(
        "Health check: {} pending upload(s), {} pending download(s)",
        status.pending_uploads, status.pending_downloads
    );
    HttpResponse::Ok().json(status)
}
