//! Application configuration, read once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// User-writable directory: uploaded assets and the roster file
    pub data_dir: PathBuf,
    /// Read-only assets shipped with the application
    pub bundled_assets_dir: PathBuf,
    pub scratch_dir: PathBuf,
    /// Parent of the per-run `<anio>.<periodo>-invitaciones` folders
    pub output_root: PathBuf,
    pub typst_bin: PathBuf,
    pub pdftoppm_bin: PathBuf,
    pub engine_timeout: Duration,
    pub settle_delay: Duration,
    pub bind_addr: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                Some(value) => value
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { key, value }),
                None => Ok(default),
            }
        };

        let data_dir = get("FPIT_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data"));
        let scratch_dir = get("FPIT_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("temp_output"));
        let port = number("FPIT_PORT", 5000)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidNumber {
            key: "FPIT_PORT",
            value: port.to_string(),
        })?;

        Ok(Self {
            bundled_assets_dir: get("FPIT_BUNDLED_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))),
            scratch_dir,
            output_root: get("FPIT_OUTPUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./invitaciones")),
            typst_bin: get("FPIT_TYPST_BIN").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("typst")),
            pdftoppm_bin: get("FPIT_PDFTOPPM_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("pdftoppm")),
            engine_timeout: Duration::from_secs(number("FPIT_ENGINE_TIMEOUT_SECS", 120)?),
            settle_delay: Duration::from_millis(number("FPIT_SETTLE_DELAY_MS", 100)?),
            bind_addr: get("FPIT_BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            data_dir,
        })
    }
}
