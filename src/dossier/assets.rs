//! Locating the letter template and the two static attachments.
//!
//! Assets are looked up in the writable data directory first (where the UI
//! uploads them) and then in the read-only directory bundled with the
//! application.

use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use utoipa::ToSchema;

use super::DossierError;

pub const TEMPLATE_FILE: &str = "plantilla_base.typ";
pub const CONVOCATORIA_FILE: &str = "convocatoria.pdf";
pub const CRONOGRAMA_FILE: &str = "cronograma.pdf";

/// The three inputs every dossier run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Plantilla,
    Convocatoria,
    Cronograma,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [Self::Plantilla, Self::Convocatoria, Self::Cronograma];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Plantilla => TEMPLATE_FILE,
            Self::Convocatoria => CONVOCATORIA_FILE,
            Self::Cronograma => CRONOGRAMA_FILE,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Plantilla => "letter template",
            Self::Convocatoria => "attachment A, call for participation",
            Self::Cronograma => "attachment B, schedule",
        }
    }
}

/// Resolved paths of the three assets, existence-checked.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub plantilla: PathBuf,
    pub convocatoria: PathBuf,
    pub cronograma: PathBuf,
}

/// Where an asset currently resolves from.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssetStatus {
    pub asset: AssetKind,
    pub file_name: String,
    pub found: bool,
    /// `writable`, `bundled` or `missing`
    pub source: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct AssetResolver {
    writable_dir: PathBuf,
    bundled_dir: PathBuf,
}

impl AssetResolver {
    pub fn new(writable_dir: impl Into<PathBuf>, bundled_dir: impl Into<PathBuf>) -> Self {
        Self {
            writable_dir: writable_dir.into(),
            bundled_dir: bundled_dir.into(),
        }
    }

    pub fn writable_dir(&self) -> &Path {
        &self.writable_dir
    }

    /// Resolve a file name against the search path.
    ///
    /// Returns the writable location when the file exists in neither place;
    /// callers existence-check the result.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        let writable = self.writable_dir.join(filename);
        if writable.is_file() {
            return writable;
        }

        let bundled = self.bundled_dir.join(filename);
        if bundled.is_file() {
            return bundled;
        }

        writable
    }

    /// Resolve all three assets or fail naming the first missing one.
    pub fn resolve_required(&self) -> Result<AssetPaths, DossierError> {
        let plantilla = self.resolve(TEMPLATE_FILE);
        if !plantilla.is_file() {
            return Err(DossierError::TemplateNotFound(plantilla));
        }

        let convocatoria = self.resolve(CONVOCATORIA_FILE);
        if !convocatoria.is_file() {
            return Err(DossierError::MissingAsset(AssetKind::Convocatoria));
        }

        let cronograma = self.resolve(CRONOGRAMA_FILE);
        if !cronograma.is_file() {
            return Err(DossierError::MissingAsset(AssetKind::Cronograma));
        }

        Ok(AssetPaths {
            plantilla,
            convocatoria,
            cronograma,
        })
    }

    pub fn status(&self) -> Vec<AssetStatus> {
        AssetKind::ALL
            .iter()
            .map(|kind| {
                let path = self.resolve(kind.file_name());
                let source = if !path.is_file() {
                    "missing"
                } else if path.starts_with(&self.writable_dir) {
                    "writable"
                } else {
                    "bundled"
                };
                AssetStatus {
                    asset: *kind,
                    file_name: kind.file_name().to_string(),
                    found: source != "missing",
                    source: source.to_string(),
                    path: path.display().to_string(),
                }
            })
            .collect()
    }

    /// Store an uploaded asset under its fixed name in the writable directory.
    ///
    /// The file is written next to its destination and renamed into place, so
    /// a failed upload never replaces a good asset with a truncated one.
    pub fn install(&self, kind: AssetKind, data: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.writable_dir)?;
        let target = self.writable_dir.join(kind.file_name());

        let mut temp_file = NamedTempFile::new_in(&self.writable_dir)?;
        temp_file.write_all(data)?;
        temp_file.flush()?;
        temp_file.persist(&target).map_err(|e| e.error)?;

        log::info!("Installed {} ({} bytes) at {}", kind.file_name(), data.len(), target.display());
        Ok(target)
    }
}
