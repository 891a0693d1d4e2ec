//! Dispatch orchestration: compose, generate, merge, send, clean up.
//!
//! Every dispatch owns one uniquely named artifact in the output directory.
//! The artifact is removed after the send attempt whatever the outcome, and
//! by [`ArtifactGuard`]'s `Drop` if the request is abandoned mid-flight.

pub mod artifact;
pub mod report;

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info};
use thiserror::Error;
use uuid::Uuid;

use crate::compose::{
    ComposeError, DataComposer, InvoiceQuery, PrescriptionQuery, RenderContext,
};
use crate::config::AppConfig;
use crate::document::{
    ChromiumPdfEngine, DocumentGenerator, DocumentKind, GenerationError, TemplateRenderer,
};
use crate::mailer::{mask_email, Attachment, MailError, MailMessage, MailReceipt, MailSender, SmtpMailSender};
use crate::merge::merge_variables;
use crate::upstream::UpstreamClient;

pub use artifact::ArtifactGuard;
pub use report::{format_seconds, DispatchReport, PhaseTimings};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown upstream environment `{0}`")]
    UnknownEnvironment(String),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("artifact I/O failed at {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl DispatchError {
    fn artifact(path: &Path, source: std::io::Error) -> Self {
        Self::Artifact {
            path: path.display().to_string(),
            source,
        }
    }

    /// Machine-readable code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownEnvironment(_) => "UNKNOWN_ENVIRONMENT",
            Self::Compose(ComposeError::Upstream { .. }) => "UPSTREAM_FAILURE",
            Self::Compose(ComposeError::MalformedData { .. }) => "MALFORMED_UPSTREAM_DATA",
            Self::Generation(GenerationError::Template(_)) => "TEMPLATE_ERROR",
            Self::Generation(_) => "GENERATION_ERROR",
            Self::Artifact { .. } => "ARTIFACT_IO_ERROR",
            Self::Mail(MailError::InvalidAddress { .. }) => "INVALID_EMAIL",
            Self::Mail(_) => "MAIL_ERROR",
        }
    }

    /// Errors caused by the request itself rather than by a dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEnvironment(_) | Self::Mail(MailError::InvalidAddress { .. })
        )
    }
}

/// Errors raised while wiring the service from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Pipeline states, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Composing,
    Generating,
    Merging,
    Sending,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Composing => "composing",
            Self::Generating => "generating",
            Self::Merging => "merging",
            Self::Sending => "sending",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Where the finished document goes and what the email says.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub email_to: String,
    /// May contain `<<key>>` tokens.
    pub subject: String,
    /// May contain `<<key>>` tokens.
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct InvoiceDispatch {
    pub env: Option<String>,
    pub query: InvoiceQuery,
    pub delivery: Delivery,
}

#[derive(Debug, Clone)]
pub struct PrescriptionDispatch {
    pub env: Option<String>,
    pub query: PrescriptionQuery,
    pub delivery: Delivery,
}

/// Shared, stateless-per-request dispatcher.
pub struct DispatchService {
    config: Arc<AppConfig>,
    http: reqwest::Client,
    generator: Arc<DocumentGenerator>,
    mailer: Arc<dyn MailSender>,
}

impl DispatchService {
    pub fn new(
        config: Arc<AppConfig>,
        http: reqwest::Client,
        generator: Arc<DocumentGenerator>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            config,
            http,
            generator,
            mailer,
        }
    }

    /// Production wiring: Chromium engine and pooled SMTP sender.
    pub fn from_config(config: AppConfig) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream.timeout)
            .build()?;
        let engine = Arc::new(ChromiumPdfEngine::new(&config.browser));
        let generator = Arc::new(DocumentGenerator::new(TemplateRenderer::new(), engine));
        let mailer = Arc::new(SmtpMailSender::new(&config.mail.smtp)?);
        Ok(Self::new(Arc::new(config), http, generator, mailer))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn send_invoice(&self, request: InvoiceDispatch) -> Result<DispatchReport, DispatchError> {
        let composer = self.composer(request.env.as_deref())?;
        self.dispatch(
            DocumentKind::Invoice,
            &request.delivery,
            composer.compose_invoice(&request.query),
        )
        .await
    }

    pub async fn send_prescription(
        &self,
        request: PrescriptionDispatch,
    ) -> Result<DispatchReport, DispatchError> {
        let composer = self.composer(request.env.as_deref())?;
        self.dispatch(
            DocumentKind::Prescription,
            &request.delivery,
            composer.compose_prescription(&request.query),
        )
        .await
    }

    fn composer(&self, env: Option<&str>) -> Result<DataComposer, DispatchError> {
        let endpoints = self
            .config
            .upstream
            .endpoints(env)
            .ok_or_else(|| DispatchError::UnknownEnvironment(env.unwrap_or_default().to_string()))?;
        Ok(DataComposer::new(UpstreamClient::new(
            self.http.clone(),
            endpoints.clone(),
        )))
    }

    async fn dispatch<F>(
        &self,
        kind: DocumentKind,
        delivery: &Delivery,
        compose: F,
    ) -> Result<DispatchReport, DispatchError>
    where
        F: Future<Output = Result<RenderContext, ComposeError>>,
    {
        let request_id = Uuid::new_v4();
        let artifact = ArtifactGuard::new(self.config.documents.artifact_path(kind, request_id));
        info!(
            "[{}] Dispatching {} to {}",
            request_id,
            kind,
            mask_email(&delivery.email_to)
        );

        let mut timings = PhaseTimings::default();
        let outcome = self
            .run_pipeline(request_id, kind, delivery, compose, artifact.path(), &mut timings)
            .await;

        debug!("[{}] {}: {}", request_id, kind, DispatchStage::Cleanup);
        artifact.cleanup().await;

        match outcome {
            Ok(mail_response) => {
                info!(
                    "[{}] {} {}: composition {}, generation {}, sending {}",
                    request_id,
                    kind,
                    DispatchStage::Done,
                    format_seconds(timings.composition),
                    format_seconds(timings.generation),
                    format_seconds(timings.sending)
                );
                Ok(DispatchReport {
                    mail_response,
                    processing_times: timings,
                })
            }
            Err(e) => {
                let upstream_stage = match &e {
                    DispatchError::Compose(compose) => compose.stage(),
                    _ => None,
                };
                error!(
                    "[{}] {} {} [{}{}]: {}",
                    request_id,
                    kind,
                    DispatchStage::Failed,
                    e.code(),
                    upstream_stage.map(|s| format!(" @ {s}")).unwrap_or_default(),
                    error_chain(&e)
                );
                Err(e)
            }
        }
    }

    async fn run_pipeline<F>(
        &self,
        request_id: Uuid,
        kind: DocumentKind,
        delivery: &Delivery,
        compose: F,
        artifact_path: &Path,
        timings: &mut PhaseTimings,
    ) -> Result<MailReceipt, DispatchError>
    where
        F: Future<Output = Result<RenderContext, ComposeError>>,
    {
        let documents = &self.config.documents;
        let template_path = documents.template_path(kind);

        debug!("[{}] {}: {}", request_id, kind, DispatchStage::Composing);
        let started = Instant::now();
        let ctx = compose.await?;
        timings.composition = started.elapsed();

        tokio::fs::create_dir_all(&documents.output_dir)
            .await
            .map_err(|e| DispatchError::artifact(&documents.output_dir, e))?;

        debug!("[{}] {}: {}", request_id, kind, DispatchStage::Generating);
        let started = Instant::now();
        self.generator
            .generate(&template_path, &ctx, artifact_path)
            .await?;
        timings.generation = started.elapsed();

        debug!("[{}] {}: {}", request_id, kind, DispatchStage::Merging);
        let subject = merge_variables(&delivery.subject, &ctx);
        let body = merge_variables(&delivery.body, &ctx);

        debug!("[{}] {}: {}", request_id, kind, DispatchStage::Sending);
        let content = tokio::fs::read(artifact_path)
            .await
            .map_err(|e| DispatchError::artifact(artifact_path, e))?;
        let message = MailMessage::new(
            self.config.mail.from.clone(),
            delivery.email_to.clone(),
            subject,
            body,
            vec![Attachment::new(documents.attachment_name(kind), content)],
        );
        let started = Instant::now();
        let receipt = self.mailer.send(&message).await?;
        timings.sending = started.elapsed();

        Ok(receipt)
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
