//! The per-guest dossier pipeline and the batch loop around it.
//!
//! Per guest: `Pending -> TemplateRendered -> Converted -> Merged -> Done`,
//! or `Failed` from any step. Guests are processed one after another; a
//! failure is recorded for that guest and the batch moves on.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::assets::{AssetPaths, AssetResolver, TEMPLATE_FILE};
use super::context::{validate_guest, EventContext};
use super::converter::DocumentConverter;
use super::filename::derive_filename;
use super::merge::DossierAssembler;
use super::preview::{PreviewRenderer, Rasterizer};
use super::scratch::{ScratchDir, ScratchStage};
use super::template::TemplateRenderer;
use super::DossierError;
use crate::guest::model::GuestRecord;

/// Pipeline steps, used to say where a guest failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    ResolveAssets,
    RenderTemplate,
    Convert,
    Merge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Pending,
    TemplateRendered,
    Converted,
    Merged,
    Done,
    Failed { at: Step, error: String },
}

impl Stage {
    /// The step a guest in this stage is about to run.
    fn next_step(&self) -> Step {
        match self {
            Self::Pending => Step::RenderTemplate,
            Self::TemplateRendered => Step::Convert,
            _ => Step::Merge,
        }
    }
}

/// Result of running the pipeline for one guest.
#[derive(Debug)]
pub struct GuestOutcome {
    pub guest_id: i64,
    pub guest_name: String,
    pub stage: Stage,
    pub result: Result<PathBuf, DossierError>,
}

impl GuestOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchError {
    pub guest_name: String,
    pub error_message: String,
}

/// Summary of a batch run handed back to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// `true` when every guest got a dossier
    pub success: bool,
    pub generated_count: usize,
    pub total: usize,
    pub errors: Vec<BatchError>,
    pub output_dir: String,
}

pub struct DossierGenerator {
    resolver: AssetResolver,
    scratch: ScratchDir,
    converter: Arc<dyn DocumentConverter>,
    assembler: DossierAssembler,
    previewer: PreviewRenderer,
    settle_delay: Duration,
}

impl DossierGenerator {
    pub fn new(
        resolver: AssetResolver,
        scratch: ScratchDir,
        converter: Arc<dyn DocumentConverter>,
        rasterizer: Arc<dyn Rasterizer>,
        settle_delay: Duration,
    ) -> Self {
        let previewer = PreviewRenderer::new(Arc::clone(&converter), rasterizer);
        Self {
            resolver,
            scratch,
            converter,
            assembler: DossierAssembler::new(),
            previewer,
            settle_delay,
        }
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Generate the dossier of a single guest.
    ///
    /// Event validation and asset resolution still come first; their errors
    /// end up in the outcome as `Failed { at: Validate }` and
    /// `Failed { at: ResolveAssets }` respectively.
    pub fn generate_one(&self, guest: &GuestRecord, event: &EventContext, out_dir: &Path) -> GuestOutcome {
        let prepared = event
            .validate()
            .map_err(|e| (Step::Validate, e))
            .and_then(|_| self.resolver.resolve_required().map_err(|e| (Step::ResolveAssets, e)));
        match prepared {
            Ok(assets) => self.run_guest(guest, event, &assets, out_dir),
            Err((at, error)) => GuestOutcome {
                guest_id: guest.id,
                guest_name: guest.nombre_completo.clone(),
                stage: Stage::Failed {
                    at,
                    error: error.to_string(),
                },
                result: Err(error),
            },
        }
    }

    /// Generate dossiers for every guest, in order.
    ///
    /// Returns `Err` only for failures shared by the whole run: an invalid
    /// event, or a missing template or attachment. Everything else is
    /// reported per guest in the [`BatchReport`].
    pub fn generate_batch(
        &self,
        guests: &[GuestRecord],
        event: &EventContext,
        out_dir: &Path,
    ) -> Result<BatchReport, DossierError> {
        event.validate()?;
        let assets = self.resolver.resolve_required()?;

        log::info!(
            "Generating {} dossier(s) for {}.{} into {}",
            guests.len(),
            event.anio(),
            event.periodo(),
            out_dir.display()
        );

        let mut generated_count = 0;
        let mut errors = Vec::new();

        for guest in guests {
            let outcome = self.run_guest(guest, event, &assets, out_dir);
            match outcome.result {
                Ok(_) => generated_count += 1,
                Err(error) if error.is_fatal() => {
                    log::error!("Aborting batch after guest {}: {}", guest.id, error);
                    return Err(error);
                }
                Err(error) => errors.push(BatchError {
                    guest_name: outcome.guest_name,
                    error_message: error.to_string(),
                }),
            }
        }

        log::info!(
            "Batch finished: {}/{} dossier(s) generated, {} error(s)",
            generated_count,
            guests.len(),
            errors.len()
        );

        Ok(BatchReport {
            success: errors.is_empty(),
            generated_count,
            total: guests.len(),
            errors,
            output_dir: out_dir.display().to_string(),
        })
    }

    /// PNG of the first page of a guest's letter, or `None` when none could
    /// be produced.
    pub fn preview(&self, guest: &GuestRecord, event: &EventContext) -> Option<PathBuf> {
        if let Err(e) = event.validate().and_then(|_| validate_guest(guest)) {
            log::warn!("No preview for guest {}: {}", guest.id, e);
            return None;
        }
        let template = self.resolver.resolve(TEMPLATE_FILE);
        let renderer = TemplateRenderer::new(template, self.settle_delay);
        self.previewer.preview(&renderer, guest, event, &self.scratch)
    }

    fn run_guest(
        &self,
        guest: &GuestRecord,
        event: &EventContext,
        assets: &AssetPaths,
        out_dir: &Path,
    ) -> GuestOutcome {
        let mut stage = Stage::Pending;
        let result = self.run_stages(guest, event, assets, out_dir, &mut stage);

        if let Err(error) = &result {
            let at = if matches!(error, DossierError::Validation(_)) {
                Step::Validate
            } else {
                stage.next_step()
            };
            log::error!(
                "Dossier for guest {} ({}) failed at {:?}: {}",
                guest.id,
                guest.nombre_completo,
                at,
                error
            );
            self.scratch.best_effort_cleanup(guest.id, None);
            stage = Stage::Failed {
                at,
                error: error.to_string(),
            };
        }

        GuestOutcome {
            guest_id: guest.id,
            guest_name: guest.nombre_completo.clone(),
            stage,
            result,
        }
    }

    fn run_stages(
        &self,
        guest: &GuestRecord,
        event: &EventContext,
        assets: &AssetPaths,
        out_dir: &Path,
        stage: &mut Stage,
    ) -> Result<PathBuf, DossierError> {
        validate_guest(guest)?;

        let renderer = TemplateRenderer::new(&assets.plantilla, self.settle_delay);
        let filled = renderer.render(guest, event, &self.scratch)?;
        *stage = Stage::TemplateRendered;
        log::debug!("Guest {}: template rendered", guest.id);

        let letter = self.scratch.file(ScratchStage::Letter, guest.id, "pdf");
        self.converter.convert_to_fixed_layout(&filled, &letter)?;
        *stage = Stage::Converted;
        log::debug!("Guest {}: letter converted", guest.id);

        let filename = derive_filename(guest, event.anio(), event.periodo());
        let output = self.assembler.assemble(
            &letter,
            &assets.convocatoria,
            &assets.cronograma,
            out_dir,
            &filename,
        )?;
        *stage = Stage::Merged;
        log::debug!("Guest {}: dossier merged", guest.id);

        self.scratch.best_effort_remove(&filled);
        self.scratch.best_effort_remove(&letter);
        *stage = Stage::Done;

        Ok(output)
    }
}
