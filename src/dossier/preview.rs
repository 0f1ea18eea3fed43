//! First-page previews of the letter, without the attachments.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use super::context::EventContext;
use super::converter::DocumentConverter;
use super::process::{remove_stale_output, run_bounded};
use super::scratch::{ScratchDir, ScratchStage};
use super::template::TemplateRenderer;
use super::DossierError;
use crate::guest::model::GuestRecord;

pub const PREVIEW_DPI: u32 = 150;

/// Turns the first page of a PDF into a PNG image.
pub trait Rasterizer: Send + Sync {
    fn rasterize_first_page(&self, pdf: &Path, png_out: &Path, dpi: u32) -> Result<(), DossierError>;
}

/// Rasterises with poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize_first_page(&self, pdf: &Path, png_out: &Path, dpi: u32) -> Result<(), DossierError> {
        // With -singlefile pdftoppm appends ".png" to the output prefix.
        let prefix = png_out.with_extension("");
        remove_stale_output(png_out).map_err(|e| DossierError::Rasterize(e.to_string()))?;

        let mut command = Command::new(&self.binary);
        command
            .args(["-png", "-r", &dpi.to_string(), "-f", "1", "-l", "1", "-singlefile"])
            .arg(pdf)
            .arg(&prefix);

        let output = run_bounded(&mut command, self.timeout)
            .map_err(|e| DossierError::Rasterize(e.to_string()))?;
        if !output.status.success() {
            return Err(DossierError::Rasterize(format!(
                "pdftoppm exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                output.stderr.trim()
            )));
        }
        if !png_out.is_file() {
            return Err(DossierError::Rasterize(format!(
                "{} was not produced",
                png_out.display()
            )));
        }
        Ok(())
    }
}

/// Template rendering and conversion only, followed by rasterisation.
pub struct PreviewRenderer {
    converter: Arc<dyn DocumentConverter>,
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
}

impl PreviewRenderer {
    pub fn new(converter: Arc<dyn DocumentConverter>, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            converter,
            rasterizer,
            dpi: PREVIEW_DPI,
        }
    }

    /// Render a PNG of the letter's first page into `<scratch>/previews`.
    ///
    /// Returns `None` when no preview could be produced. The intermediate
    /// files are removed whatever the outcome.
    pub fn preview(
        &self,
        renderer: &TemplateRenderer,
        guest: &GuestRecord,
        event: &EventContext,
        scratch: &ScratchDir,
    ) -> Option<PathBuf> {
        let result = self.try_preview(renderer, guest, event, scratch);
        scratch.best_effort_cleanup(guest.id, Some(ScratchStage::Preview));

        match result {
            Ok(image) => {
                log::info!("Preview for guest {} at {}", guest.id, image.display());
                Some(image)
            }
            Err(e) => {
                log::warn!("No preview available for guest {}: {}", guest.id, e);
                None
            }
        }
    }

    fn try_preview(
        &self,
        renderer: &TemplateRenderer,
        guest: &GuestRecord,
        event: &EventContext,
        scratch: &ScratchDir,
    ) -> Result<PathBuf, DossierError> {
        let previews = scratch.previews_dir();
        let image = previews.join(format!("{}_{}.png", ScratchStage::Preview.prefix(), guest.id));
        remove_stale_output(&image).map_err(DossierError::Scratch)?;

        let filled = renderer.render_as(guest, event, scratch, ScratchStage::Preview)?;
        let pdf = scratch.file(ScratchStage::Preview, guest.id, "pdf");
        self.converter.convert_to_fixed_layout(&filled, &pdf)?;

        std::fs::create_dir_all(&previews).map_err(DossierError::Scratch)?;
        self.rasterizer.rasterize_first_page(&pdf, &image, self.dpi)?;
        Ok(image)
    }
}
