//! Headless Chromium print engine.
//!
//! Writes the page into a scratch directory, runs the browser in print mode
//! against it and checks that a PDF landed at the requested path. The child
//! is spawned with `kill_on_drop`, so a timeout or a dropped future tears it
//! down.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tempfile::tempdir;
use tokio::process::Command;

use super::common::with_print_defaults;
use super::{GenerationError, PdfEngine};
use crate::config::BrowserSettings;

pub struct ChromiumPdfEngine {
    program: String,
    timeout: Duration,
    settle: Duration,
}

impl ChromiumPdfEngine {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            program: settings.program.clone(),
            timeout: settings.timeout,
            settle: settings.settle,
        }
    }
}

#[async_trait]
impl PdfEngine for ChromiumPdfEngine {
    async fn print_to_pdf(&self, html: &str, output_path: &Path) -> Result<(), GenerationError> {
        let scratch = tempdir().map_err(GenerationError::Workspace)?;
        let page_path = scratch.path().join("document.html");
        tokio::fs::write(&page_path, with_print_defaults(html))
            .await
            .map_err(GenerationError::Workspace)?;

        let output_path = absolute(output_path).map_err(GenerationError::Workspace)?;
        let page_url = format!("file://{}", page_path.display());

        let mut command = Command::new(&self.program);
        command
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--no-pdf-header-footer")
            .arg(format!("--user-data-dir={}", scratch.path().join("profile").display()))
            .arg(format!("--virtual-time-budget={}", self.settle.as_millis()))
            .arg(format!("--print-to-pdf={}", output_path.display()))
            .arg(&page_url)
            .current_dir(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| GenerationError::Launch {
            program: self.program.clone(),
            source,
        })?;
        debug!("Started {} for {}", self.program, output_path.display());

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| GenerationError::Launch {
                program: self.program.clone(),
                source,
            })?,
            // Dropping the wait future drops the child, which kills it.
            Err(_) => return Err(GenerationError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} failed: {}", self.program, stderr.trim());
            return Err(GenerationError::EngineExit(output.status.code().unwrap_or(-1)));
        }

        match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(GenerationError::MissingOutput(output_path)),
        }
    }
}

fn absolute(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(program: &str) -> BrowserSettings {
        BrowserSettings {
            program: program.to_string(),
            timeout: Duration::from_secs(30),
            settle: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn missing_browser_is_a_launch_error() {
        let engine = ChromiumPdfEngine::new(&settings("/nonexistent/chromium-binary"));
        let dir = tempdir().unwrap();
        let err = engine
            .print_to_pdf("<html></html>", &dir.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Launch { .. }));
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium; set CHROME_BIN"]
    async fn printed_invoice_keeps_literal_fields() {
        use std::sync::Arc;

        use serde_json::json;

        use crate::compose::RenderContext;
        use crate::document::{DocumentGenerator, TemplateRenderer};

        let program = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());
        let generator = DocumentGenerator::new(
            TemplateRenderer::new(),
            Arc::new(ChromiumPdfEngine::new(&settings(&program))),
        );
        let mut ctx = RenderContext::new();
        ctx.insert("name", "Demo Clinic");
        ctx.insert("invoice_number", "INV-182");
        ctx.insert("patient_name", "SUKANYA SAHU");
        ctx.insert("receipt_no", "HCP-R2425000182");
        ctx.insert("gst_percent", "20.0%");
        ctx.insert(
            "services",
            json!([{ "fee_name": "X-ray", "fee_amount": "500", "unit": "1", "fee_total": "500" }]),
        );
        ctx.insert("payments", json!([]));

        let template = Path::new(env!("CARGO_MANIFEST_DIR")).join("static/styled_invoice.html");
        let dir = tempdir().unwrap();
        let out = dir.path().join("invoice.pdf");
        generator.generate(&template, &ctx, &out).await.unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        for field in ["SUKANYA SAHU", "HCP-R2425000182", "INV-182", "X-ray"] {
            assert!(text.contains(field), "`{field}` missing from:\n{text}");
        }
    }
}
