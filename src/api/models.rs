use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dispatch::DispatchReport;
use crate::upstream::models::lenient_string;

/// Body of `POST /sendInvoice`.
///
/// Every field is optional on the wire so that missing values surface as
/// validation errors instead of a JSON parse failure.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SendInvoiceRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "INV-2425000182")]
    pub invoice_number: Option<String>,
    #[serde(rename = "emailTo", default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "patient@example.com")]
    pub email_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "Invoice <<receipt_no>>")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "Dear <<patient_name>>, please find your invoice attached.")]
    pub body: Option<String>,
    /// Upstream environment; the configured default when absent.
    #[serde(default, deserialize_with = "lenient_string")]
    pub env: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "dc")]
    pub user_role: Option<String>,
}

/// Body of `POST /sendPrescription`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SendPrescriptionRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "1042")]
    pub cons_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "877")]
    pub pres_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(example = "dc")]
    pub user_role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "12")]
    pub clinic_id: Option<String>,
    #[serde(rename = "emailTo", default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "patient@example.com")]
    pub email_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String, example = "Your ePrescription from <<clinic_name>>")]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub env: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// e.g. `"3912ms"`.
    pub request_duration: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchSuccessResponse {
    #[schema(example = 1)]
    pub status: u8,
    pub message: String,
    pub response: DispatchReport,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetail {
    pub message: String,
    #[schema(example = "UPSTREAM_FAILURE")]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchFailureResponse {
    #[schema(example = 0)]
    pub status: u8,
    pub message: String,
    pub error: ErrorDetail,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    pub field_name: String,
    pub field_error: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationFailureResponse {
    #[schema(example = "Validation error")]
    pub message: String,
    pub errors: Vec<FieldErrors>,
}
