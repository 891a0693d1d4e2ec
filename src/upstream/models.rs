//! Canonical records for each upstream resource.
//!
//! The clinic API is loose about scalar types (ids and amounts show up as
//! either strings or numbers), so every scalar is read through
//! [`lenient_string`] and kept as text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Stringify a JSON scalar. Objects, arrays and null yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Clinic block of the invoice details resource.
///
/// Known fields are typed; everything else the upstream sends is kept in
/// `extra` so it still reaches the template.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClinicDetails {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub address_line_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of `invoiceDetails`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLine {
    #[serde(default, deserialize_with = "lenient_string")]
    pub invoice_create_datetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receipt_no: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub discount_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gst_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payable_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub paid_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_datetime: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee_total: Option<String>,
}

/// Combined clinic + patient + line items lookup by invoice number.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceDetails {
    #[serde(rename = "clinicDetails", default, deserialize_with = "null_as_default")]
    pub clinic: ClinicDetails,
    #[serde(rename = "patientDetails", default, deserialize_with = "null_as_default")]
    pub patient: Map<String, Value>,
    /// Left raw: the upstream sometimes sends a non-sequence here.
    #[serde(rename = "invoiceDetails", default)]
    pub line_items: Value,
}

/// Consultation record. Its shape is only known to the template, so it stays a map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ConsultationDetails(pub Map<String, Value>);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub doctors_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub licence_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnClinicDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address_line_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phonenumber_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phonenumber_2: Option<String>,
    /// Free-form: a string on some clinics, a schedule object on others.
    #[serde(default)]
    pub timings: Value,
    #[serde(default, deserialize_with = "lenient_string")]
    pub logo: Option<String>,
}

/// Logo file content. The payload sits next to `status`, not under `data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClinicLogo {
    #[serde(rename = "base64String", default, deserialize_with = "lenient_string")]
    pub base64_string: Option<String>,
}
