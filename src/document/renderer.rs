//! HTML rendering of document templates with MiniJinja.

use std::fs;
use std::path::{Path, PathBuf};

use minijinja::value::Value;
use minijinja::{Environment, Output, State, UndefinedBehavior};
use thiserror::Error;

use crate::compose::RenderContext;

/// Fuel limit for template evaluation.
const FUEL_LIMIT: u64 = 2_000_000;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to load template {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Renders a named template file against a [`RenderContext`].
///
/// Undefined variables render as empty and are falsy. Iterating something
/// that is not a sequence is an error.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    fuel: u64,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self { fuel: FUEL_LIMIT }
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, template_path: &Path, ctx: &RenderContext) -> Result<String, TemplateError> {
        let source = fs::read_to_string(template_path).map_err(|source| TemplateError::Load {
            path: template_path.to_path_buf(),
            source,
        })?;
        // The name drives auto-escaping, so keep the file's own extension.
        let name = template_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.html")
            .to_string();
        self.render_source(&name, source, ctx)
    }

    pub fn render_source(
        &self,
        name: &str,
        source: String,
        ctx: &RenderContext,
    ) -> Result<String, TemplateError> {
        let render_err = |source: minijinja::Error| TemplateError::Render {
            name: name.to_string(),
            source,
        };

        let mut env = Environment::new();
        env.set_fuel(Some(self.fuel));
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_formatter(blank_none_formatter);
        env.add_template_owned(name.to_string(), source)
            .map_err(render_err)?;

        let template = env.get_template(name).map_err(render_err)?;
        template
            .render(Value::from_serialize(ctx))
            .map_err(render_err)
    }
}

/// Upstream nulls print as nothing rather than `none`.
fn blank_none_formatter(
    out: &mut Output,
    state: &State,
    value: &Value,
) -> Result<(), minijinja::Error> {
    if value.is_none() {
        return Ok(());
    }
    minijinja::escape_formatter(out, state, value)
}
