//! Document generation: template rendering followed by PDF printing.

pub mod common;
pub mod engine;
pub mod renderer;
pub mod traits;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use thiserror::Error;

use crate::compose::RenderContext;

pub use engine::ChromiumPdfEngine;
pub use renderer::{TemplateError, TemplateRenderer};
pub use traits::PdfEngine;

/// Kinds of document this service sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Invoice,
    Prescription,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invoice => f.write_str("invoice"),
            Self::Prescription => f.write_str("prescription"),
        }
    }
}

/// Errors that can occur during document generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to prepare browser workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("browser did not finish within {0:?}")]
    Timeout(Duration),
    #[error("browser exited with status {0}")]
    EngineExit(i32),
    #[error("browser produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Renders a template and prints the result through a [`PdfEngine`].
pub struct DocumentGenerator {
    renderer: TemplateRenderer,
    engine: Arc<dyn PdfEngine>,
}

impl DocumentGenerator {
    pub fn new(renderer: TemplateRenderer, engine: Arc<dyn PdfEngine>) -> Self {
        Self { renderer, engine }
    }

    pub async fn generate(
        &self,
        template_path: &Path,
        ctx: &RenderContext,
        output_path: &Path,
    ) -> Result<(), GenerationError> {
        let html = self.renderer.render(template_path, ctx)?;
        self.engine.print_to_pdf(&html, output_path).await?;
        info!(
            "Generated {} from {}",
            output_path.display(),
            template_path.display()
        );
        Ok(())
    }
}
