use std::time::Instant;

use actix_web::{web, HttpResponse, Responder};
use log;

use super::models::{
    DispatchFailureResponse, DispatchSuccessResponse, ErrorDetail, ResponseMetadata,
    SendInvoiceRequest, SendPrescriptionRequest, ValidationFailureResponse,
};
use super::validation::{ValidationErrors, Validator};
use super::AppState;
use crate::dispatch::{DispatchError, DispatchReport};
use crate::mailer::mask_email;

#[utoipa::path(
    get,
    path = "/home",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = String, content_type = "text/html")
    )
)]
pub async fn home() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body("<h1>clinic-mailer is running</h1>")
}

#[utoipa::path(
    post,
    path = "/sendInvoice",
    tag = "Dispatch",
    request_body = SendInvoiceRequest,
    responses(
        (status = 200, description = "Invoice generated and emailed", body = DispatchSuccessResponse),
        (status = 400, description = "Invalid request or recipient", body = ValidationFailureResponse),
        (status = 500, description = "Dispatch failed", body = DispatchFailureResponse)
    )
)]
pub async fn send_invoice(
    state: web::Data<AppState>,
    payload: web::Json<SendInvoiceRequest>,
) -> impl Responder {
    let started = Instant::now();
    let request = match payload.validate(&state.dispatcher.config().upstream) {
        Ok(request) => request,
        Err(errors) => return validation_failure(errors),
    };
    let recipient = request.delivery.email_to.clone();

    match state.dispatcher.send_invoice(request).await {
        Ok(report) => dispatch_success(&recipient, report, started),
        Err(e) => dispatch_failure("Failed to send invoice", &e),
    }
}

#[utoipa::path(
    post,
    path = "/sendPrescription",
    tag = "Dispatch",
    request_body = SendPrescriptionRequest,
    responses(
        (status = 200, description = "Prescription generated and emailed", body = DispatchSuccessResponse),
        (status = 400, description = "Invalid request or recipient", body = ValidationFailureResponse),
        (status = 500, description = "Dispatch failed", body = DispatchFailureResponse)
    )
)]
pub async fn send_prescription(
    state: web::Data<AppState>,
    payload: web::Json<SendPrescriptionRequest>,
) -> impl Responder {
    let started = Instant::now();
    let request = match payload.validate(&state.dispatcher.config().upstream) {
        Ok(request) => request,
        Err(errors) => return validation_failure(errors),
    };
    let recipient = request.delivery.email_to.clone();

    match state.dispatcher.send_prescription(request).await {
        Ok(report) => dispatch_success(&recipient, report, started),
        Err(e) => dispatch_failure("Failed to send prescription", &e),
    }
}

fn validation_failure(errors: ValidationErrors) -> HttpResponse {
    log::warn!("Rejected request with {} error(s): {}", errors.len(), errors);
    HttpResponse::BadRequest().json(ValidationFailureResponse {
        message: "Validation error".to_string(),
        errors: errors.grouped(),
    })
}

fn dispatch_success(recipient: &str, report: DispatchReport, started: Instant) -> HttpResponse {
    log::info!("Email sent successfully to {}", mask_email(recipient));
    HttpResponse::Ok().json(DispatchSuccessResponse {
        status: 1,
        message: format!("Email sent successfully to {}", recipient),
        response: report,
        metadata: ResponseMetadata {
            request_duration: format!("{}ms", started.elapsed().as_millis()),
            timestamp: chrono::Utc::now().to_rfc3339(),
        },
    })
}

fn dispatch_failure(message: &str, error: &DispatchError) -> HttpResponse {
    let body = DispatchFailureResponse {
        status: 0,
        message: message.to_string(),
        error: ErrorDetail {
            message: error.to_string(),
            code: error.code().to_string(),
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    if error.is_client_error() {
        HttpResponse::BadRequest().json(body)
    } else {
        HttpResponse::InternalServerError().json(body)
    }
}
