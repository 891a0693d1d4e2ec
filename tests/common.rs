#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use clinic_mailer::config::{
    AppConfig, BrowserSettings, DocumentSettings, MailSettings, ServerSettings, SmtpSecurity,
    SmtpSettings, UpstreamEndpoints, UpstreamSettings,
};
use clinic_mailer::dispatch::DispatchService;
use clinic_mailer::document::{DocumentGenerator, GenerationError, PdfEngine, TemplateRenderer};
use clinic_mailer::mailer::{MailError, MailMessage, MailReceipt, MailSender};

pub const INVOICE_PATH: &str = "/clinic/MoneyReceipt/get_details_by_invoiceNumber";
pub const LOGO_PATH: &str = "/common/File_reader/read_file_content_clinic";
pub const CONSULTATION_PATH: &str = "/clinic/PatientPrescription/get_consultation_details_temp";
pub const DOCTOR_PATH: &str = "/clinic/PatientPrescription/get_doctor_details_temp";
pub const CLINIC_PATH: &str = "/clinic/PatientPrescription/get_own_clinic_details_temp";

/// 1x1 transparent PNG.
pub const PNG_LOGO: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub fn endpoints(base_url: &str) -> UpstreamEndpoints {
    UpstreamEndpoints::new(format!("{base_url}/clinic"), format!("{base_url}/common"))
}

pub fn static_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

pub fn test_config(base_url: &str, output_dir: &Path) -> AppConfig {
    AppConfig {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        upstream: UpstreamSettings::single(endpoints(base_url), Duration::from_secs(5)),
        browser: BrowserSettings {
            program: "chromium".to_string(),
            timeout: Duration::from_secs(30),
            settle: Duration::from_millis(100),
        },
        documents: DocumentSettings {
            template_dir: static_dir(),
            invoice_template: "styled_invoice.html".to_string(),
            prescription_template: "prescription.html".to_string(),
            output_dir: output_dir.to_path_buf(),
            invoice_file_name: "invoice.pdf".to_string(),
            prescription_file_name: "ePrescription.pdf".to_string(),
        },
        mail: MailSettings {
            from: "clinic@example.com".to_string(),
            smtp: SmtpSettings {
                host: "localhost".to_string(),
                port: 2525,
                username: None,
                password: None,
                security: SmtpSecurity::None,
                max_connections: 1,
                rate_limit: 0,
                timeout: Duration::from_secs(5),
            },
        },
    }
}

pub fn build_service(
    config: AppConfig,
    engine: Arc<FakePdfEngine>,
    mailer: Arc<RecordingMailSender>,
) -> DispatchService {
    let generator = Arc::new(DocumentGenerator::new(TemplateRenderer::new(), engine));
    DispatchService::new(Arc::new(config), reqwest::Client::new(), generator, mailer)
}

/// Files left behind in the output directory (0 if it was never created).
pub fn leftover_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Succeed,
    /// Fail before writing anything.
    Fail,
    /// Leave a partial file behind, then fail.
    FailAfterWrite,
}

/// Writes the rendered HTML behind a `%PDF` marker instead of running a browser.
pub struct FakePdfEngine {
    mode: EngineMode,
    calls: AtomicUsize,
    html: Mutex<Vec<String>>,
    paths: Mutex<Vec<PathBuf>>,
}

impl FakePdfEngine {
    pub fn new() -> Self {
        Self::with_mode(EngineMode::Succeed)
    }

    pub fn with_mode(mode: EngineMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            html: Mutex::new(Vec::new()),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_html(&self) -> Option<String> {
        self.html.lock().unwrap().last().cloned()
    }

    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl PdfEngine for FakePdfEngine {
    async fn print_to_pdf(&self, html: &str, output_path: &Path) -> Result<(), GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.html.lock().unwrap().push(html.to_string());
        self.paths.lock().unwrap().push(output_path.to_path_buf());

        if self.mode == EngineMode::Fail {
            return Err(GenerationError::EngineExit(1));
        }
        tokio::fs::write(output_path, format!("%PDF-1.4\n{html}"))
            .await
            .map_err(GenerationError::Workspace)?;
        if self.mode == EngineMode::FailAfterWrite {
            return Err(GenerationError::EngineExit(1));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailMode {
    Accept,
    RejectRecipient,
    TransportDown,
}

/// Keeps every message it is asked to send.
pub struct RecordingMailSender {
    mode: MailMode,
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::with_mode(MailMode::Accept)
    }

    pub fn with_mode(mode: MailMode) -> Self {
        Self {
            mode,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, message: &MailMessage) -> Result<MailReceipt, MailError> {
        self.sent.lock().unwrap().push(message.clone());
        match self.mode {
            MailMode::Accept => Ok(MailReceipt {
                accepted: vec![message.to().to_string()],
                response: "250 2.0.0 OK queued".to_string(),
                message_id: Some("<test-1@localhost>".to_string()),
            }),
            MailMode::RejectRecipient => Err(MailError::InvalidAddress {
                field: "to",
                address: message.to().to_string(),
                reason: "mailbox unavailable".to_string(),
            }),
            MailMode::TransportDown => Err(MailError::Transport("connection refused".to_string())),
        }
    }
}

// ============================================================================
// Upstream fixtures
// ============================================================================

pub fn invoice_details_body() -> Value {
    json!({
        "status": 1,
        "message": "Success",
        "data": {
            "clinicDetails": {
                "clinic_id": "12",
                "logo": "12_profile.png",
                "name": "Demo Clinic",
                "phonenumber_1": "8017410038",
                "address_line_1": "24 Jadavpur Central Road",
                "city": "KUPWARA",
                "state": "West Bengal",
                "district": "KOLKATA",
                "pincode": "700015"
            },
            "patientDetails": {
                "cp_id": "CPI1200010",
                "age": "24",
                "gender": "Female",
                "patient_name": "SUKANYA SAHU",
                "patient_phone": "9749688237"
            },
            "invoiceDetails": [
                {
                    "invoice_create_datetime": "2024-12-13 17:54:03",
                    "discount_amount": "0.00",
                    "payable_amount": "600.00",
                    "gst_amount": "100.00",
                    "total_amount": "500.00",
                    "payment_method": "Card",
                    "payment_status": "1",
                    "receipt_no": "HCP-R2425000182",
                    "paid_amount": "500.00",
                    "payment_datetime": "2024-12-29 23:59:00",
                    "fee_name": "X-ray",
                    "fee_amount": "500",
                    "unit": "1",
                    "fee_total": "500"
                },
                {
                    "invoice_create_datetime": "2024-12-13 17:54:03",
                    "receipt_no": "HCP-R2425000183",
                    "paid_amount": "100.00",
                    "payment_method": "Cash",
                    "payment_status": "1",
                    "payment_datetime": "2024-12-30 10:00:00",
                    "fee_name": "Blood test",
                    "fee_amount": 100,
                    "unit": 1,
                    "fee_total": 100
                }
            ]
        }
    })
}

pub fn logo_body() -> Value {
    json!({ "status": 1, "base64String": PNG_LOGO })
}

pub fn consultation_body() -> Value {
    json!({
        "status": 1,
        "data": {
            "patient_name": "Rahul Sen",
            "age": "41",
            "gender": "Male",
            "diagnosis": "Viral fever",
            "medicine": "[{\"medicine_name\":\"Paracetamol 500\",\"dose\":\"1 tab\",\"frequency\":\"TDS\",\"duration\":\"5 days\"},{\"medicine_name\":\"ORS\",\"dose\":\"1 sachet\",\"frequency\":\"BD\",\"duration\":\"3 days\"}]"
        }
    })
}

pub fn doctor_body() -> Value {
    json!({
        "status": 1,
        "data": {
            "id": 9,
            "doctors_name": "Dr Sambhu Das Gupta",
            "licence_number": "WBMC-5521",
            "degree": "MBBS, MD",
            "specialization": "General Medicine"
        }
    })
}

pub fn clinic_body() -> Value {
    json!({
        "status": "1",
        "data": {
            "name": "Demo Clinic",
            "address_line_1": "24 Jadavpur Central Road",
            "phonenumber_1": "8017410038",
            "phonenumber_2": "4534545454",
            "timings": "Mon-Sat 10:00-18:00",
            "logo": "12_profile.png"
        }
    })
}
