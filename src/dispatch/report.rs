use std::time::Duration;

use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::mailer::MailReceipt;

/// Wall time spent in each dispatch phase.
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct PhaseTimings {
    #[serde(rename = "dataCollectionTime", serialize_with = "as_seconds")]
    #[schema(value_type = String, example = "0.412 s")]
    pub composition: Duration,
    #[serde(rename = "pdfGenerationTime", serialize_with = "as_seconds")]
    #[schema(value_type = String, example = "2.87 s")]
    pub generation: Duration,
    #[serde(rename = "mailSendingTime", serialize_with = "as_seconds")]
    #[schema(value_type = String, example = "0.935 s")]
    pub sending: Duration,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub mail_response: MailReceipt,
    pub processing_times: PhaseTimings,
}

/// Millisecond-resolution seconds, e.g. `"1.234 s"`.
pub fn format_seconds(duration: Duration) -> String {
    let seconds = duration.as_millis() as f64 / 1000.0;
    format!("{seconds} s")
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_seconds(*duration))
}
