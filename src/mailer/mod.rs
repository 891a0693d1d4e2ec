//! Outbound mail: message model, delivery seam and the SMTP backend.

pub mod smtp;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub use smtp::SmtpMailSender;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid {field} address `{address}`: {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("SMTP delivery failed: {0}")]
    Transport(String),
    #[error("mail configuration error: {0}")]
    Configuration(String),
}

/// File attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    /// MIME type guessed from the filename.
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .to_string()
    }
}

/// A fully formed plain-text message. Immutable once built.
#[derive(Debug, Clone)]
pub struct MailMessage {
    from: String,
    to: String,
    subject: String,
    body: String,
    attachments: Vec<Attachment>,
}

impl MailMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            attachments,
        }
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

/// What the mail server said about an accepted message.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MailReceipt {
    pub accepted: Vec<String>,
    /// Server reply, e.g. `250 OK queued as 1a2b3c`.
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Delivers mail. Shared across requests.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<MailReceipt, MailError>;
}

/// Mask an address for logs, keeping the first three characters of the local part.
pub fn mask_email(address: &str) -> String {
    match address.rfind('@') {
        Some(at) => {
            let (local, domain) = address.split_at(at);
            let masked: String = local
                .chars()
                .enumerate()
                .map(|(i, c)| if i < 3 { c } else { '*' })
                .collect();
            format!("{masked}{domain}")
        }
        None => address.to_string(),
    }
}
