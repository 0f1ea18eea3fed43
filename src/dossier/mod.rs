//! Dossier module - business logic for building invitation dossiers.
//!
//! A dossier is the invitation letter rendered for one guest, followed by the
//! two fixed attachments (convocatoria and cronograma), merged into one PDF:
//! - `assets` - locating the template and the attachments
//! - `filename` - output naming
//! - `template` - filling the Typst letter template
//! - `converter` - running the external document engine
//! - `merge` - concatenating the letter with the attachments
//! - `preview` - rasterising the first page of the letter
//! - `generator` - the per-guest pipeline and the batch loop

pub mod assets;
pub mod context;
pub mod converter;
pub mod filename;
pub mod generator;
pub mod merge;
pub mod preview;
pub mod process;
pub mod routes;
pub mod scratch;
pub mod template;
pub mod validation;

pub use assets::{AssetKind, AssetPaths, AssetResolver};
pub use context::{EventContext, RenderContext};
pub use converter::{DocumentConverter, TypstConverter};
pub use filename::derive_filename;
pub use generator::{BatchError, BatchReport, DossierGenerator, GuestOutcome, Stage, Step};
pub use merge::DossierAssembler;
pub use preview::{PdftoppmRasterizer, PreviewRenderer, Rasterizer};
pub use scratch::ScratchDir;
pub use template::TemplateRenderer;
pub use validation::{FieldViolation, ValidationErrors, ViolationKind};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building a dossier.
///
/// `MissingAsset`, `TemplateNotFound` and an invalid event context abort a
/// whole run. Everything else is scoped to a single guest.
#[derive(Debug, Error)]
pub enum DossierError {
    #[error("required asset '{}' ({}) was not found", .0.file_name(), .0.label())]
    MissingAsset(AssetKind),
    #[error("letter template not found at {}", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("failed to read letter template: {0}")]
    TemplateIo(#[source] std::io::Error),
    #[error("document conversion failed: {0}")]
    Conversion(String),
    #[error("failed to write dossier {}: {reason}", .path.display())]
    MergeWrite { path: PathBuf, reason: String },
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("scratch directory error: {0}")]
    Scratch(#[source] std::io::Error),
    #[error("preview rasterisation failed: {0}")]
    Rasterize(String),
}

impl DossierError {
    /// Whether the error must abort a batch instead of being recorded for a
    /// single guest.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingAsset(_) | Self::TemplateNotFound(_) | Self::TemplateIo(_)
        )
    }

    pub(crate) fn merge_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MergeWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
