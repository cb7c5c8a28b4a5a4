pub mod config;
pub mod handlers;
pub mod models;
pub mod processor;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::api::config::AppConfig;
use crate::api::handlers::{analyze_handler, download_handler, health_check, mask_handler};
use crate::api::models::ErrorResponse;
use crate::api::processor::AppState;

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected request body: {}", err);
    let response = match &err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            HttpResponse::PayloadTooLarge().json(ErrorResponse::new(err.to_string()))
        }
        _ => HttpResponse::BadRequest().json(ErrorResponse::new(err.to_string())),
    };
    InternalError::from_response(err, response).into()
}

/// Registers the routes and the JSON body limits on an app.
///
/// # Arguments
/// * `state` - Shared state handed to every handler
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let json = web::JsonConfig::default()
            .limit(state.config.server.max_payload_bytes)
            .error_handler(json_error);

        cfg.app_data(state)
            .app_data(json)
            .service(web::resource("/analyze").route(web::post().to(analyze_handler)))
            .service(web::resource("/mask").route(web::post().to(mask_handler)))
            .service(web::resource("/download/{id}").route(web::get().to(download_handler)))
            .service(web::resource("/health").route(web::get().to(health_check)));
    }
}

/// Starts the API server with the specified configuration
///
/// # Arguments
/// * `config` - Loaded application configuration
///
/// # Returns
/// * `Result<()>` - Success or an error
#[instrument(skip(config))]
pub async fn start_server(config: AppConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    info!("Starting masking API server on {}:{}", host, port);

    let state = web::Data::new(AppState::new(config));

    let server_result = HttpServer::new(move || App::new().configure(configure(state.clone())))
        .bind((host.as_str(), port))
        .with_context(|| format!("Failed to bind to {}:{}", host, port))?
        .run()
        .await;

    if let Err(e) = server_result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
