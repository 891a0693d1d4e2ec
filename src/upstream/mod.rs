//! Client for the clinic-records and common-file upstream APIs.
//!
//! Every fetch resolves to an [`UpstreamResult`]: HTTP error statuses,
//! envelope statuses other than `1`, undecodable bodies and transport errors
//! all collapse into [`UpstreamResult::Failure`] instead of being raised.

pub mod models;

use std::fmt;

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::UpstreamEndpoints;

pub use models::{
    ClinicDetails, ClinicLogo, ConsultationDetails, DoctorDetails, InvoiceDetails, InvoiceLine,
    OwnClinicDetails,
};

/// Why an upstream fetch did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// HTTP status for non-2xx responses, the envelope status for envelope
    /// failures, `None` for transport or decoding errors.
    pub status_code: Option<i64>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(status_code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(None, format!("malformed response: {}", message.into()))
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{code} - {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for UpstreamFailure {}

/// Tagged outcome of a remote fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamResult<T> {
    Success(T),
    Failure(UpstreamFailure),
}

impl<T> UpstreamResult<T> {
    pub fn into_result(self) -> Result<T, UpstreamFailure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl<T> From<Result<T, UpstreamFailure>> for UpstreamResult<T> {
    fn from(result: Result<T, UpstreamFailure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(failure) => Self::Failure(failure),
        }
    }
}

/// The `{status, message, data | response}` wrapper used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Value,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    response: Option<Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl Envelope {
    fn is_success(&self) -> bool {
        match &self.status {
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => s.trim() == "1",
            _ => false,
        }
    }

    fn status_code(&self) -> Option<i64> {
        match &self.status {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn message(&self) -> String {
        models::scalar_to_string(&self.message).unwrap_or_default()
    }

    /// `data` on current endpoints, `response` on the legacy ones.
    fn into_payload(self) -> Value {
        self.data
            .filter(|value| !value.is_null())
            .or(self.response)
            .unwrap_or(Value::Null)
    }

    fn into_top_level(self) -> Value {
        Value::Object(self.rest)
    }
}

/// Upstream resources this service reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    InvoiceDetails,
    ClinicLogo,
    ConsultationDetails,
    DoctorDetails,
    OwnClinicDetails,
}

impl ResourceKind {
    fn path(self) -> &'static str {
        match self {
            Self::InvoiceDetails => "MoneyReceipt/get_details_by_invoiceNumber",
            Self::ClinicLogo => "File_reader/read_file_content_clinic",
            Self::ConsultationDetails => "PatientPrescription/get_consultation_details_temp",
            Self::DoctorDetails => "PatientPrescription/get_doctor_details_temp",
            Self::OwnClinicDetails => "PatientPrescription/get_own_clinic_details_temp",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvoiceDetails => "invoice details",
            Self::ClinicLogo => "clinic logo",
            Self::ConsultationDetails => "consultation details",
            Self::DoctorDetails => "doctor details",
            Self::OwnClinicDetails => "clinic details",
        };
        f.write_str(label)
    }
}

/// Typed fetches against one upstream environment.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoints: UpstreamEndpoints,
}

impl UpstreamClient {
    /// `http` is expected to carry the request timeout.
    pub fn new(http: reqwest::Client, endpoints: UpstreamEndpoints) -> Self {
        Self { http, endpoints }
    }

    pub async fn fetch_invoice_details(
        &self,
        invoice_number: &str,
        user_role: &str,
    ) -> UpstreamResult<InvoiceDetails> {
        self.fetch_payload(
            ResourceKind::InvoiceDetails,
            &[("invoiceNumber", invoice_number), ("user_role", user_role)],
        )
        .await
        .into()
    }

    pub async fn fetch_clinic_logo(&self, clinic_id: &str, file: &str) -> UpstreamResult<ClinicLogo> {
        let result = self
            .fetch(ResourceKind::ClinicLogo, &[("clinicid", clinic_id), ("file", file)])
            .await
            .and_then(|envelope| decode(ResourceKind::ClinicLogo, envelope.into_top_level()));
        result.into()
    }

    pub async fn fetch_consultation_details(
        &self,
        consultation_id: &str,
        prescription_id: &str,
        user_role: &str,
    ) -> UpstreamResult<ConsultationDetails> {
        self.fetch_payload(
            ResourceKind::ConsultationDetails,
            &[
                ("id", consultation_id),
                ("prescription_id", prescription_id),
                ("user_role", user_role),
            ],
        )
        .await
        .into()
    }

    pub async fn fetch_doctor_details(
        &self,
        consultation_id: &str,
        user_role: &str,
    ) -> UpstreamResult<DoctorDetails> {
        self.fetch_payload(
            ResourceKind::DoctorDetails,
            &[("id", consultation_id), ("user_role", user_role)],
        )
        .await
        .into()
    }

    pub async fn fetch_own_clinic_details(
        &self,
        doctor_id: &str,
        clinic_id: &str,
        user_role: &str,
    ) -> UpstreamResult<OwnClinicDetails> {
        self.fetch_payload(
            ResourceKind::OwnClinicDetails,
            &[
                ("doctorsid", doctor_id),
                ("clinicid", clinic_id),
                ("user_role", user_role),
            ],
        )
        .await
        .into()
    }

    async fn fetch_payload<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamFailure> {
        let envelope = self.fetch(kind, query).await?;
        decode(kind, envelope.into_payload())
    }

    fn url(&self, kind: ResourceKind) -> String {
        let base = match kind {
            ResourceKind::ClinicLogo => &self.endpoints.common_api_base_url,
            _ => &self.endpoints.clinic_api_base_url,
        };
        format!("{}/{}", base, kind.path())
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        query: &[(&str, &str)],
    ) -> Result<Envelope, UpstreamFailure> {
        let url = self.url(kind);
        debug!("Fetching {} from {}", kind, url);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch {}: {}", kind, e);
                UpstreamFailure::transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("request failed");
            error!("Failed to fetch {}: HTTP {}", kind, status);
            return Err(UpstreamFailure::new(
                Some(i64::from(status.as_u16())),
                reason,
            ));
        }

        let envelope: Envelope = response.json().await.map_err(|e| {
            error!("Failed to decode {} response: {}", kind, e);
            UpstreamFailure::malformed(e.to_string())
        })?;

        if !envelope.is_success() {
            let failure = UpstreamFailure::new(envelope.status_code(), envelope.message());
            error!("Upstream rejected {} request: {}", kind, failure);
            return Err(failure);
        }

        Ok(envelope)
    }
}

fn decode<T: DeserializeOwned>(kind: ResourceKind, payload: Value) -> Result<T, UpstreamFailure> {
    serde_json::from_value(payload).map_err(|e| {
        error!("Unexpected {} payload shape: {}", kind, e);
        UpstreamFailure::malformed(format!("{kind}: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn envelope_status_accepts_number_and_string() {
        assert!(envelope(json!({ "status": 1 })).is_success());
        assert!(envelope(json!({ "status": "1" })).is_success());
        assert!(!envelope(json!({ "status": 0, "message": "no record" })).is_success());
        assert!(!envelope(json!({})).is_success());
    }

    #[test]
    fn envelope_payload_prefers_data_over_response() {
        let current = envelope(json!({ "status": 1, "data": { "a": 1 }, "response": { "b": 2 } }));
        assert_eq!(current.into_payload(), json!({ "a": 1 }));

        let legacy = envelope(json!({ "status": 1, "response": { "b": 2 } }));
        assert_eq!(legacy.into_payload(), json!({ "b": 2 }));
    }

    #[test]
    fn failure_display_includes_status_when_known() {
        let failure = UpstreamFailure::new(Some(0), "Invoice not found");
        assert_eq!(failure.to_string(), "0 - Invoice not found");
        assert_eq!(UpstreamFailure::transport("timed out").to_string(), "timed out");
    }

    #[test]
    fn logo_payload_is_read_from_top_level() {
        let env = envelope(json!({ "status": 1, "base64String": "iVBORw0KGgo=" }));
        let logo: ClinicLogo = decode(ResourceKind::ClinicLogo, env.into_top_level()).unwrap();
        assert_eq!(logo.base64_string.as_deref(), Some("iVBORw0KGgo="));
    }
}
