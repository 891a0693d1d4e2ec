//! Process configuration loaded from the environment (and `.env` via dotenvy).

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::document::DocumentKind;

const DEFAULT_UPSTREAM_ENV: &str = "dev";
const DEFAULT_CLINIC_API_BASE_URL: &str = "http://127.0.0.1:8000/api/clinicapi";
const DEFAULT_COMMON_API_BASE_URL: &str = "http://127.0.0.1:8000/api/commonapi";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: String, value: String },
    #[error("default upstream environment `{0}` is not listed in UPSTREAM_ENVS")]
    UnknownDefaultEnvironment(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub browser: BrowserSettings,
    pub documents: DocumentSettings,
    pub mail: MailSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Base URLs of one upstream deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    pub clinic_api_base_url: String,
    pub common_api_base_url: String,
}

impl UpstreamEndpoints {
    pub fn new(clinic_api_base_url: impl Into<String>, common_api_base_url: impl Into<String>) -> Self {
        Self {
            clinic_api_base_url: clinic_api_base_url.into().trim_end_matches('/').to_string(),
            common_api_base_url: common_api_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub default_env: String,
    pub environments: HashMap<String, UpstreamEndpoints>,
    pub timeout: Duration,
}

impl UpstreamSettings {
    /// Single-environment settings, mostly useful for tests.
    pub fn single(endpoints: UpstreamEndpoints, timeout: Duration) -> Self {
        let mut environments = HashMap::new();
        environments.insert(DEFAULT_UPSTREAM_ENV.to_string(), endpoints);
        Self {
            default_env: DEFAULT_UPSTREAM_ENV.to_string(),
            environments,
            timeout,
        }
    }

    /// Resolve the endpoints for a requested environment; `None` selects the default.
    pub fn endpoints(&self, env: Option<&str>) -> Option<&UpstreamEndpoints> {
        let name = env
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_env);
        self.environments.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Chromium-compatible executable used for printing.
    pub program: String,
    pub timeout: Duration,
    /// Virtual time the page gets to settle before printing.
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct DocumentSettings {
    pub template_dir: PathBuf,
    pub invoice_template: String,
    pub prescription_template: String,
    pub output_dir: PathBuf,
    pub invoice_file_name: String,
    pub prescription_file_name: String,
}

impl DocumentSettings {
    pub fn template_path(&self, kind: DocumentKind) -> PathBuf {
        match kind {
            DocumentKind::Invoice => self.template_dir.join(&self.invoice_template),
            DocumentKind::Prescription => self.template_dir.join(&self.prescription_template),
        }
    }

    /// Filename the recipient sees on the attachment.
    pub fn attachment_name(&self, kind: DocumentKind) -> String {
        let configured = match kind {
            DocumentKind::Invoice => &self.invoice_file_name,
            DocumentKind::Prescription => &self.prescription_file_name,
        };
        sanitize_filename::sanitize(configured)
    }

    /// Transient on-disk location for one dispatch. Unique per request id.
    pub fn artifact_path(&self, kind: DocumentKind, request_id: Uuid) -> PathBuf {
        let name = self.attachment_name(kind);
        let path = Path::new(&name);
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or("document");
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("pdf");
        self.output_dir
            .join(format!("{stem}-{request_id}.{extension}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465.
    Tls,
    StartTls,
    None,
}

impl FromStr for SmtpSecurity {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "true" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" | "false" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    pub max_connections: u32,
    /// Messages per second; 0 disables pacing.
    pub rate_limit: u32,
    pub timeout: Duration,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("security", &self.security)
            .field("max_connections", &self.max_connections)
            .field("rate_limit", &self.rate_limit)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from: String,
    pub smtp: SmtpSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerSettings {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000)?,
        };

        let default_env = env_or("DEFAULT_UPSTREAM_ENV", DEFAULT_UPSTREAM_ENV);
        let env_names = env_or("UPSTREAM_ENVS", &default_env);
        let mut environments = HashMap::new();
        for name in env_names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            environments.insert(name.to_string(), endpoints_from_env(name));
        }
        if !environments.contains_key(&default_env) {
            return Err(ConfigError::UnknownDefaultEnvironment(default_env));
        }
        let upstream = UpstreamSettings {
            default_env,
            environments,
            timeout: Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECS", 30)?),
        };

        let browser = BrowserSettings {
            program: env_or("CHROME_BIN", "chromium"),
            timeout: Duration::from_secs(env_parse("BROWSER_TIMEOUT_SECS", 60)?),
            settle: Duration::from_millis(env_parse("BROWSER_SETTLE_MS", 10_000)?),
        };

        let documents = DocumentSettings {
            template_dir: PathBuf::from(env_or("TEMPLATE_DIR", "static")),
            invoice_template: env_or("INVOICE_TEMPLATE_FILE", "styled_invoice.html"),
            prescription_template: env_or("PRESCRIPTION_TEMPLATE_FILE", "prescription.html"),
            output_dir: PathBuf::from(env_or("OUTPUT_DIR", "uploads")),
            invoice_file_name: env_or("INVOICE_FILE_NAME", "invoice.pdf"),
            prescription_file_name: env_or("PRESCRIPTION_FILE_NAME", "ePrescription.pdf"),
        };

        let security_raw = env_or("SMTP_SECURITY", "tls");
        let security = security_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "SMTP_SECURITY".to_string(),
            value: security_raw.clone(),
        })?;
        let smtp = SmtpSettings {
            host: env_or("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 465)?,
            username: env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            security,
            max_connections: env_parse("SMTP_MAX_CONNECTIONS", 5)?,
            rate_limit: env_parse("SMTP_RATE_LIMIT", 10)?,
            timeout: Duration::from_secs(env_parse("SMTP_TIMEOUT_SECS", 30)?),
        };
        if smtp.username.is_none() {
            log::warn!("SMTP_USERNAME not set, sending without SMTP authentication");
        }

        let from = env::var("EMAIL_FROM").unwrap_or_else(|_| {
            log::warn!("EMAIL_FROM not set, falling back to the SMTP username");
            smtp.username.clone().unwrap_or_default()
        });

        Ok(Self {
            server,
            upstream,
            browser,
            documents,
            mail: MailSettings { from, smtp },
        })
    }
}

fn endpoints_from_env(name: &str) -> UpstreamEndpoints {
    let suffix = name.to_ascii_uppercase();
    let clinic = env::var(format!("CLINIC_API_BASE_URL_{suffix}"))
        .or_else(|_| env::var("CLINIC_API_BASE_URL"))
        .unwrap_or_else(|_| {
            log::warn!("No clinic API base URL for `{name}`, using {DEFAULT_CLINIC_API_BASE_URL}");
            DEFAULT_CLINIC_API_BASE_URL.to_string()
        });
    let common = env::var(format!("COMMON_API_BASE_URL_{suffix}"))
        .or_else(|_| env::var("COMMON_API_BASE_URL"))
        .unwrap_or_else(|_| {
            log::warn!("No common API base URL for `{name}`, using {DEFAULT_COMMON_API_BASE_URL}");
            DEFAULT_COMMON_API_BASE_URL.to_string()
        });
    UpstreamEndpoints::new(clinic, common)
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        _ => Ok(default),
    }
}
