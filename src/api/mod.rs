//! Inbound HTTP surface.

pub mod handlers;
pub mod models;
pub mod validation;

use actix_web::{error, web, HttpResponse};

use crate::dispatch::DispatchService;
use models::{FieldErrors, ValidationFailureResponse};

/// Body size limit for JSON requests.
const JSON_LIMIT: usize = 50 * 1024 * 1024;

pub struct AppState {
    pub dispatcher: DispatchService,
}

impl AppState {
    pub fn new(dispatcher: DispatchService) -> Self {
        Self { dispatcher }
    }
}

/// Register the dispatch routes on an app or scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/home", web::get().to(handlers::home))
        .route("/sendInvoice", web::post().to(handlers::send_invoice))
        .route("/sendPrescription", web::post().to(handlers::send_prescription))
        .route(
            "/prescription/sendPrescription",
            web::post().to(handlers::send_prescription),
        );
}

/// Unparseable bodies get the same shape as validation failures.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            log::warn!("Rejected request body: {}", err);
            let body = ValidationFailureResponse {
                message: "Validation error".to_string(),
                errors: vec![FieldErrors {
                    field_name: "body".to_string(),
                    field_error: vec![err.to_string()],
                }],
            };
            error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}
