//! Request validation and normalisation.
//!
//! Validation turns a wire request into a typed dispatch request: strings are
//! trimmed, the recipient address is lowercased, `user_role` gets its default
//! and the upstream environment is checked against configuration.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use super::models::{FieldErrors, SendInvoiceRequest, SendPrescriptionRequest};
use crate::compose::{InvoiceQuery, PrescriptionQuery};
use crate::config::UpstreamSettings;
use crate::dispatch::{Delivery, InvoiceDispatch, PrescriptionDispatch};

pub const DEFAULT_USER_ROLE: &str = "dc";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .expect("email pattern compiles");
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors, in the order they were found.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Messages grouped per field, fields in first-seen order.
    pub fn grouped(&self) -> Vec<FieldErrors> {
        let mut grouped: Vec<FieldErrors> = Vec::new();
        for error in &self.errors {
            match grouped.iter_mut().find(|g| g.field_name == error.field) {
                Some(group) => group.field_error.push(error.message.clone()),
                None => grouped.push(FieldErrors {
                    field_name: error.field.clone(),
                    field_error: vec![error.message.clone()],
                }),
            }
        }
        grouped
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Converts a wire request into its validated form.
pub trait Validator {
    type Output;

    fn validate(&self, upstream: &UpstreamSettings) -> Result<Self::Output, ValidationErrors>;
}

impl Validator for SendInvoiceRequest {
    type Output = InvoiceDispatch;

    fn validate(&self, upstream: &UpstreamSettings) -> Result<InvoiceDispatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let invoice_number = validate_required(
            self.invoice_number.as_deref(),
            "invoice_number",
            "Invoice number is required",
            &mut errors,
        );
        let email_to = validate_email(self.email_to.as_deref(), "emailTo", &mut errors);
        let subject =
            validate_required(self.subject.as_deref(), "subject", "Subject is required", &mut errors);
        let body =
            validate_required(self.body.as_deref(), "body", "Body content is required", &mut errors);
        let env = validate_env(self.env.as_deref(), upstream, &mut errors);
        let user_role = user_role_or_default(self.user_role.as_deref());

        errors.into_result()?;
        Ok(InvoiceDispatch {
            env,
            query: InvoiceQuery {
                invoice_number,
                user_role,
            },
            delivery: Delivery {
                email_to,
                subject,
                body,
            },
        })
    }
}

impl Validator for SendPrescriptionRequest {
    type Output = PrescriptionDispatch;

    fn validate(
        &self,
        upstream: &UpstreamSettings,
    ) -> Result<PrescriptionDispatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let consultation_id = validate_required(
            self.cons_id.as_deref(),
            "cons_id",
            "Consultation ID is required",
            &mut errors,
        );
        let prescription_id = validate_required(
            self.pres_id.as_deref(),
            "pres_id",
            "Prescription ID is required",
            &mut errors,
        );
        let clinic_id = validate_required(
            self.clinic_id.as_deref(),
            "clinic_id",
            "Clinic ID is required",
            &mut errors,
        );
        let email_to = validate_email(self.email_to.as_deref(), "emailTo", &mut errors);
        let subject =
            validate_required(self.subject.as_deref(), "subject", "Subject is required", &mut errors);
        let body =
            validate_required(self.body.as_deref(), "body", "Body content is required", &mut errors);
        let env = validate_env(self.env.as_deref(), upstream, &mut errors);
        let user_role = user_role_or_default(self.user_role.as_deref());

        errors.into_result()?;
        Ok(PrescriptionDispatch {
            env,
            query: PrescriptionQuery {
                consultation_id,
                prescription_id,
                clinic_id,
                user_role,
            },
            delivery: Delivery {
                email_to,
                subject,
                body,
            },
        })
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Trimmed value, or an error when it is missing or blank.
pub fn validate_required(
    value: Option<&str>,
    field: &str,
    message: &str,
    errors: &mut ValidationErrors,
) -> String {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        errors.add(ValidationError::new(field, message));
    }
    trimmed.to_string()
}

/// Trimmed, lowercased address. Reports both rules when the field is missing.
pub fn validate_email(value: Option<&str>, field: &str, errors: &mut ValidationErrors) -> String {
    let normalized = value.map(str::trim).unwrap_or_default().to_lowercase();
    if normalized.is_empty() {
        errors.add(ValidationError::new(field, "Email address is required"));
    }
    if !EMAIL_RE.is_match(&normalized) {
        errors.add(ValidationError::new(field, "Must be a valid email address"));
    }
    normalized
}

fn validate_env(
    value: Option<&str>,
    upstream: &UpstreamSettings,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let env = value.map(str::trim).filter(|v| !v.is_empty())?;
    if upstream.endpoints(Some(env)).is_none() {
        errors.add(ValidationError::new(
            "env",
            format!("Unknown environment `{env}`"),
        ));
    }
    Some(env.to_string())
}

fn user_role_or_default(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER_ROLE)
        .to_string()
}
