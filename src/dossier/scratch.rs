//! Per-run working storage for intermediate files.
//!
//! Files are named `<stage>_<guest id>.<ext>` so that guests never collide and
//! everything belonging to one guest can be found again for cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Intermediate file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchStage {
    /// Filled letter template
    Filled,
    /// Letter converted to PDF
    Letter,
    /// Preview intermediates
    Preview,
}

impl ScratchStage {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Letter => "letter",
            Self::Preview => "preview",
        }
    }
}

/// Outcome of a best-effort cleanup. Callers are free to ignore it; failures
/// have already been logged.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

impl CleanupReport {
    fn merge(&mut self, other: CleanupReport) {
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Open (and create if needed) the scratch directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, stage: ScratchStage, guest_id: i64, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{}", stage.prefix(), guest_id, extension))
    }

    /// Directory holding preview images handed back to callers.
    pub fn previews_dir(&self) -> PathBuf {
        self.root.join("previews")
    }

    /// Scratch files in the root belonging to `guest_id`, optionally limited to
    /// one stage. `filled_1.typ` belongs to guest 1, never to guest 11.
    pub fn files_for(&self, guest_id: i64, stage: Option<ScratchStage>) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot list scratch directory {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let id = guest_id.to_string();
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    return false;
                };
                match stem.rsplit_once('_') {
                    Some((prefix, suffix)) => {
                        suffix == id && stage.map_or(true, |s| s.prefix() == prefix)
                    }
                    None => false,
                }
            })
            .collect()
    }

    /// Remove one file, logging instead of failing.
    pub fn best_effort_remove(&self, path: &Path) -> CleanupReport {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Removed scratch file {}", path.display());
                CleanupReport { removed: 1, failed: 0 }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => CleanupReport::default(),
            Err(e) => {
                log::warn!("Could not remove scratch file {}: {}", path.display(), e);
                CleanupReport { removed: 0, failed: 1 }
            }
        }
    }

    /// Remove every scratch file of a guest (or of one stage of it).
    pub fn best_effort_cleanup(&self, guest_id: i64, stage: Option<ScratchStage>) -> CleanupReport {
        let mut report = CleanupReport::default();
        for path in self.files_for(guest_id, stage) {
            report.merge(self.best_effort_remove(&path));
        }
        if report.removed > 0 || report.failed > 0 {
            log::debug!(
                "Scratch cleanup for guest {}: {} removed, {} failed",
                guest_id,
                report.removed,
                report.failed
            );
        }
        report
    }
}
