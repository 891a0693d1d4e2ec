use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, error, info};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{mask_email, MailError, MailMessage, MailReceipt, MailSender};
use crate::config::{SmtpSecurity, SmtpSettings};

/// SMTP delivery over a pooled, rate-limited `lettre` transport.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    pacer: SendPacer,
}

impl std::fmt::Debug for SmtpMailSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailSender")
            .field("transport", &"<AsyncSmtpTransport>")
            .field("interval", &self.pacer.interval)
            .finish()
    }
}

impl SmtpMailSender {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let transport = build_transport(settings)?;
        Ok(Self {
            transport,
            pacer: SendPacer::per_second(settings.rate_limit),
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: &MailMessage) -> Result<MailReceipt, MailError> {
        let recipient = mask_email(message.to());
        debug!(
            "Building email from {} to {} with subject {:?}",
            message.from(),
            recipient,
            message.subject()
        );
        let email = build_message(message)?;
        let message_id = email
            .headers()
            .get_raw("Message-ID")
            .map(str::to_string);

        self.pacer.wait().await;
        info!("Sending email to {}", recipient);
        let response = self.transport.send(email).await.map_err(|e| {
            error!("SMTP send to {} failed: {}", recipient, e);
            map_smtp_error(&e)
        })?;

        let reply = match response.first_line() {
            Some(line) => format!("{} {}", response.code(), line),
            None => response.code().to_string(),
        };
        info!("Email to {} accepted: {}", recipient, reply);

        Ok(MailReceipt {
            accepted: vec![message.to().to_string()],
            response: reply,
            message_id,
        })
    }
}

/// Build the MIME message: a plain-text part followed by the attachments.
pub(crate) fn build_message(msg: &MailMessage) -> Result<Message, MailError> {
    let from: Mailbox = msg
        .from()
        .parse()
        .map_err(|e| MailError::Configuration(format!("invalid from address: {e}")))?;
    let to: Mailbox = msg.to().parse().map_err(|e| MailError::InvalidAddress {
        field: "to",
        address: msg.to().to_string(),
        reason: format!("{e}"),
    })?;

    let mut body = MultiPart::mixed().singlepart(SinglePart::plain(msg.body().to_string()));
    for attachment in msg.attachments() {
        let content_type = ContentType::parse(&attachment.content_type())
            .map_err(|e| MailError::Build(format!("{}: {e}", attachment.filename)))?;
        body = body.singlepart(
            LettreAttachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(msg.subject())
        .message_id(None)
        .multipart(body)
        .map_err(|e| MailError::Build(e.to_string()))
}

fn build_transport(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let builder = match settings.security {
        SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| MailError::Configuration(format!("SMTP TLS relay error: {e}")))?,
        SmtpSecurity::StartTls => {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| MailError::Configuration(format!("SMTP STARTTLS relay error: {e}")))?
        }
        SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
    };

    let builder = builder
        .port(settings.port)
        .timeout(Some(settings.timeout))
        .pool_config(PoolConfig::new().max_size(settings.max_connections.max(1)));

    let builder = match (&settings.username, &settings.password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };

    Ok(builder.build())
}

fn map_smtp_error(error: &lettre::transport::smtp::Error) -> MailError {
    if error.is_permanent() {
        MailError::Transport(format!("permanent SMTP error: {error}"))
    } else if error.is_transient() {
        MailError::Transport(format!("transient SMTP error: {error}"))
    } else {
        MailError::Transport(error.to_string())
    }
}

/// Spaces sends out to at most `n` per second across all requests.
struct SendPacer {
    interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl SendPacer {
    fn per_second(limit: u32) -> Self {
        let interval = (limit > 0).then(|| Duration::from_secs(1) / limit);
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    async fn wait(&self) {
        let Some(interval) = self.interval else {
            return;
        };
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + interval;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
