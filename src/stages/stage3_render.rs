use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use tracing::info;

use super::{ReconcileStats, Reconciled};
use crate::io::{NormalizedMeta, WrittenFile, safe_write_text};
use crate::models::Requirement;

/// Built-in markdown template
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/requirements.md.hbs");

/// Configuration for Stage 3 rendering
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    /// Handlebars template file; the built-in template when unset
    pub template_path: Option<PathBuf>,
}

impl RenderConfig {
    pub fn load_template(&self) -> Result<String> {
        match &self.template_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template: {:?}", path)),
            None => Ok(DEFAULT_TEMPLATE.to_string()),
        }
    }
}

/// Context handed to the template
#[derive(Debug, Serialize)]
pub struct RenderInput<'a> {
    pub generated_at: String,
    pub source: String,
    pub meta: &'a NormalizedMeta,
    pub fr: &'a [Requirement],
    pub nfr: &'a [Requirement],
    pub dec: &'a [Requirement],
    pub out_of_scope: &'a [Requirement],
    pub stats: &'a ReconcileStats,
}

impl<'a> RenderInput<'a> {
    pub fn new(reconciled: &'a Reconciled, meta: &'a NormalizedMeta, source: &Path) -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M").to_string(),
            source: source.display().to_string(),
            meta,
            fr: &reconciled.fr,
            nfr: &reconciled.nfr,
            dec: &reconciled.dec,
            out_of_scope: &reconciled.out_of_scope,
            stats: &reconciled.stats,
        }
    }
}

/// Render without touching the filesystem. Output is markdown, so HTML
/// escaping is off.
pub fn render_markdown(template: &str, input: &RenderInput<'_>) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(no_escape);
    handlebars
        .render_template(template, input)
        .context("Failed to render template")
}

/// Execute Stage 3: render and write the requirements document
pub fn execute_stage3(
    input: &RenderInput<'_>,
    output: &Path,
    config: &RenderConfig,
) -> Result<WrittenFile> {
    let template = config.load_template()?;
    let rendered = render_markdown(&template, input)?;
    let written = safe_write_text(output, &rendered)?;

    info!(
        "Stage 3: wrote {:?} (FR {}, NFR {}, DEC {}, out of scope {})",
        written.path,
        input.fr.len(),
        input.nfr.len(),
        input.dec.len(),
        input.out_of_scope.len()
    );

    Ok(written)
}
