//! Application configuration builders.
//!
//! Constructs the sheet collaborators, match engine, composer and transport
//! from `Config`.

use std::sync::Arc;

use tracing::info;

use tender_core::{Config, ConfigError, MatchEngine};
use tender_notify::{Composer, Dispatcher, InfobipTransport, LogTransport, Transport};
use tender_sheets::{GoogleAuthorizer, GoogleSheetsClient};

use crate::pipeline::{Pipeline, SheetRanges};

/// Load configuration from `.env` and environment variables.
pub fn load_config() -> Result<Config, ConfigError> {
    tender_core::config::load_dotenv();
    Config::from_env()
}

fn sheet_ranges(config: &Config) -> Result<SheetRanges, ConfigError> {
    Ok(SheetRanges {
        tender_sheet_id: config
            .sheets
            .tender_sheet_id
            .clone()
            .ok_or(ConfigError::Missing("TENDER_SHEET_ID"))?,
        tender_range: config.sheets.tender_range.clone(),
        users_sheet_id: config
            .sheets
            .users_sheet_id
            .clone()
            .ok_or(ConfigError::Missing("USERS_SHEET_ID"))?,
        users_range: config.sheets.users_range.clone(),
    })
}

/// Pick the outbound transport: a log-only one for dry runs, Infobip otherwise.
pub fn build_transport(config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    if config.infobip.dry_run {
        info!("DRY_RUN enabled: notifications will be logged, not sent");
        return Ok(Arc::new(LogTransport));
    }
    let transport = InfobipTransport::from_config(&config.infobip)
        .map_err(|e| anyhow::anyhow!("{e} (set DRY_RUN=true to run without Infobip)"))?;
    Ok(Arc::new(transport))
}

/// Build the full pipeline from config.
pub fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let ranges = sheet_ranges(config)?;
    let engine = MatchEngine::from_config(&config.matching);
    let composer = Composer::from_config(&config.infobip)?;
    let dispatcher = Arc::new(Dispatcher::new(build_transport(config)?));

    info!(
        "Pipeline ready (policy: {}, renderer: {}, channel: {})",
        engine.predicate_name(),
        composer.renderer_name(),
        dispatcher.channel_name()
    );

    Ok(Pipeline {
        authorizer: Arc::new(GoogleAuthorizer::from_config(&config.google)),
        sheets: Arc::new(GoogleSheetsClient::new(config.sheets.api_base_url.clone())),
        ranges,
        engine,
        composer,
        dispatcher,
    })
}
