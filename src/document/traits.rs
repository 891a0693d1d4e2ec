//! Seam between document generation and the process that prints PDFs.

use std::path::Path;

use async_trait::async_trait;

use super::GenerationError;

/// Prints an HTML document to a PDF file.
#[async_trait]
pub trait PdfEngine: Send + Sync {
    /// Write a PDF of `html` to `output_path`. Any process the engine starts
    /// must be gone by the time this returns or the future is dropped.
    async fn print_to_pdf(&self, html: &str, output_path: &Path) -> Result<(), GenerationError>;
}
