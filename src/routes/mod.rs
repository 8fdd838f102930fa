// Route exports
pub mod favorites;
pub mod matches;

use crate::error::MatchError;
use crate::services::MatchEngine;
use actix_web::{error, web, HttpRequest};
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
}

impl AppState {
    pub fn new(engine: Arc<MatchEngine>) -> Self {
        Self { engine }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(favorites::configure),
    );
}

/// Reject malformed JSON bodies with the standard error body
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!(path = req.path(), error = %err, "rejected JSON payload");
    MatchError::validation(format!("invalid JSON: {}", err)).into()
}

pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    MatchError::validation(format!("invalid query: {}", err)).into()
}

/// Register shared state, extractor error handlers and every route
///
/// Used by the server and by in-process tests so both see the same app.
pub fn configure_app(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(state))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .configure(configure_routes);
    }
}
