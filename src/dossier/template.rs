//! Filling the Typst letter template for one guest.
//!
//! The template is plain Typst markup that refers to the context keys as
//! variables (`#nombre_completo`, `#fecha_carta`, ...). Rendering prepends one
//! `#let` binding per key, with the value as an escaped string literal, so a
//! guest field can never inject markup into the letter.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::context::{EventContext, RenderContext};
use super::scratch::{ScratchDir, ScratchStage};
use super::DossierError;
use crate::guest::model::GuestRecord;

pub const FILLED_EXTENSION: &str = "typ";

/// Escape special characters for Typst strings.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\r', "")
        .replace('\n', r"\n")
        .replace('\t', r"\t")
}

/// Build the filled Typst source: bindings first, then the template body.
pub fn fill_template(template: &str, context: &RenderContext) -> String {
    let mut source = String::with_capacity(template.len() + 64 * context.len());
    source.push_str("// Generated from the invitation template. Do not edit.\n");
    for (key, value) in context.iter() {
        source.push_str(&format!("#let {} = \"{}\"\n", key, escape_typst_string(value)));
    }
    source.push('\n');
    source.push_str(template);
    source
}

#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_path: PathBuf,
    settle_delay: Duration,
}

impl TemplateRenderer {
    /// `settle_delay` is waited after writing the filled file, before the
    /// engine process opens it.
    pub fn new(template_path: impl Into<PathBuf>, settle_delay: Duration) -> Self {
        Self {
            template_path: template_path.into(),
            settle_delay,
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    fn load(&self) -> Result<String, DossierError> {
        if !self.template_path.is_file() {
            return Err(DossierError::TemplateNotFound(self.template_path.clone()));
        }
        fs::read_to_string(&self.template_path).map_err(DossierError::TemplateIo)
    }

    /// Render the letter for a dossier run into `filled_<id>.typ`.
    pub fn render(
        &self,
        guest: &GuestRecord,
        event: &EventContext,
        scratch: &ScratchDir,
    ) -> Result<PathBuf, DossierError> {
        self.render_as(guest, event, scratch, ScratchStage::Filled)
    }

    /// Render into the scratch namespace of `stage`.
    pub fn render_as(
        &self,
        guest: &GuestRecord,
        event: &EventContext,
        scratch: &ScratchDir,
        stage: ScratchStage,
    ) -> Result<PathBuf, DossierError> {
        let template = self.load()?;
        let context = RenderContext::build(guest, event);
        let source = fill_template(&template, &context);

        let output = scratch.file(stage, guest.id, FILLED_EXTENSION);
        fs::write(&output, source).map_err(DossierError::Scratch)?;
        log::debug!("Rendered letter for guest {} at {}", guest.id, output.display());

        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
        Ok(output)
    }
}
