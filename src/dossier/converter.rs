//! Converting the filled letter to PDF with the external document engine.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::process::{remove_stale_output, run_bounded};
use super::DossierError;

/// Turns a filled letter into a fixed-layout (PDF) document.
///
/// Implementations must not leave an engine process behind on any path.
pub trait DocumentConverter: Send + Sync {
    fn convert_to_fixed_layout(&self, input: &Path, output: &Path) -> Result<(), DossierError>;
}

/// Drives the `typst` compiler.
///
/// The engine lock makes sure only one engine instance runs at a time, even
/// when several requests reach the server concurrently.
pub struct TypstConverter {
    binary: PathBuf,
    timeout: Duration,
    engine_lock: Mutex<()>,
}

impl TypstConverter {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            engine_lock: Mutex::new(()),
        }
    }

    fn build_command(&self, input: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("compile").arg(input).arg(output);
        command
    }
}

impl DocumentConverter for TypstConverter {
    fn convert_to_fixed_layout(&self, input: &Path, output: &Path) -> Result<(), DossierError> {
        let _engine = self.engine_lock.lock();
        remove_stale_output(output).map_err(|e| {
            DossierError::Conversion(format!("cannot clear {}: {}", output.display(), e))
        })?;

        let mut command = self.build_command(input, output);
        let result = run_bounded(&mut command, self.timeout)
            .map_err(|e| DossierError::Conversion(e.to_string()))?;

        if !result.status.success() {
            let code = result.status.code().unwrap_or(-1);
            let detail = result.stderr.trim();
            return Err(DossierError::Conversion(if detail.is_empty() {
                format!("typst exited with status {}", code)
            } else {
                format!("typst exited with status {}: {}", code, detail)
            }));
        }

        if !output.is_file() {
            return Err(DossierError::Conversion(format!(
                "typst reported success but {} was not produced",
                output.display()
            )));
        }

        log::debug!("Converted {} -> {}", input.display(), output.display());
        Ok(())
    }
}
