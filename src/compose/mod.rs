//! Data composition: turns upstream records into a flat [`RenderContext`].
//!
//! Dependent fetches run strictly after the fetch they depend on; independent
//! ones are joined. Only logo fetches are allowed to fail silently.

pub mod context;
mod invoice;
mod prescription;

use std::fmt;

use log::warn;
use thiserror::Error;

use crate::document::common::logo_data_uri;
use crate::upstream::{UpstreamClient, UpstreamFailure, UpstreamResult};

pub use context::{stringify, RenderContext};
pub use invoice::{full_address, gst_percent};

/// Which upstream call a composition failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Details,
    Consultation,
    Doctor,
    Clinic,
    Logo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Details => "details",
            Self::Consultation => "consultation",
            Self::Doctor => "doctor",
            Self::Clinic => "clinic",
            Self::Logo => "logo",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("{stage} request failed: {failure}")]
    Upstream {
        stage: Stage,
        #[source]
        failure: UpstreamFailure,
    },
    #[error("malformed `{field}` in upstream data: {reason}")]
    MalformedData { field: String, reason: String },
}

impl ComposeError {
    pub fn upstream(stage: Stage, failure: UpstreamFailure) -> Self {
        Self::Upstream { stage, failure }
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedData {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Upstream { stage, .. } => Some(*stage),
            Self::MalformedData { .. } => None,
        }
    }
}

/// Lookup keys for an invoice dispatch.
#[derive(Debug, Clone)]
pub struct InvoiceQuery {
    pub invoice_number: String,
    pub user_role: String,
}

/// Lookup keys for a prescription dispatch.
#[derive(Debug, Clone)]
pub struct PrescriptionQuery {
    pub consultation_id: String,
    pub prescription_id: String,
    pub clinic_id: String,
    pub user_role: String,
}

/// Builds render contexts from one upstream environment.
#[derive(Clone)]
pub struct DataComposer {
    client: UpstreamClient,
}

impl DataComposer {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub async fn compose_invoice(&self, query: &InvoiceQuery) -> Result<RenderContext, ComposeError> {
        invoice::compose(&self.client, query).await
    }

    pub async fn compose_prescription(
        &self,
        query: &PrescriptionQuery,
    ) -> Result<RenderContext, ComposeError> {
        prescription::compose(&self.client, query).await
    }
}

/// Fetch a clinic logo as a `data:` URI. Any failure yields `""`.
async fn fetch_logo(client: &UpstreamClient, clinic_id: &str, file: &str) -> String {
    match client.fetch_clinic_logo(clinic_id, file).await {
        UpstreamResult::Success(logo) => match logo.base64_string.as_deref() {
            Some(payload) if !payload.trim().is_empty() => logo_data_uri(payload),
            _ => {
                warn!("Logo `{}` for clinic {} came back empty", file, clinic_id);
                String::new()
            }
        },
        UpstreamResult::Failure(failure) => {
            warn!(
                "{} request for clinic {} failed, rendering without it: {}",
                Stage::Logo,
                clinic_id,
                failure
            );
            String::new()
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
