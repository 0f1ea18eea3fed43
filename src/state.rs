//! Shared application state handed to every handler.

use anyhow::Context;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::dossier::{AssetResolver, DossierGenerator, PdftoppmRasterizer, ScratchDir, TypstConverter};
use crate::guest::roster::{GuestRoster, JsonFileRoster, ROSTER_FILE};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub roster: Arc<dyn GuestRoster>,
    pub generator: Arc<DossierGenerator>,
}

impl AppState {
    pub fn new(config: AppConfig, roster: Arc<dyn GuestRoster>, generator: Arc<DossierGenerator>) -> Self {
        Self {
            config,
            roster,
            generator,
        }
    }

    /// Wire the production components from the configuration.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("cannot create data directory {}", config.data_dir.display()))?;

        let roster = JsonFileRoster::open(config.data_dir.join(ROSTER_FILE)).context("cannot load roster")?;
        let scratch = ScratchDir::open(&config.scratch_dir)
            .with_context(|| format!("cannot create scratch directory {}", config.scratch_dir.display()))?;

        let generator = DossierGenerator::new(
            AssetResolver::new(&config.data_dir, &config.bundled_assets_dir),
            scratch,
            Arc::new(TypstConverter::new(&config.typst_bin, config.engine_timeout)),
            Arc::new(PdftoppmRasterizer::new(&config.pdftoppm_bin, config.engine_timeout)),
            config.settle_delay,
        );

        Ok(Self::new(config, Arc::new(roster), Arc::new(generator)))
    }
}
