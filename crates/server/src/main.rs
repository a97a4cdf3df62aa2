mod api;
mod app_config;
mod cli;
mod pipeline;
mod router;
mod state;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use tender_core::Config;

use crate::cli::{Cli, Command};
use crate::pipeline::DispatchMode;

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();
    let pipeline = app_config::build_pipeline(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;
    let state = Arc::new(state::AppState { config, pipeline });
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on PORT {}", port);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_once(config: Config) -> anyhow::Result<()> {
    config.log_summary();
    let pipeline = app_config::build_pipeline(&config)?;

    let outcome = pipeline.run(DispatchMode::Await).await?;
    if let Some(report) = &outcome.report {
        info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Run complete"
        );
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "userVsTender": outcome.group }))?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = app_config::load_config()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Run { dry_run } => {
            if dry_run {
                config.infobip.dry_run = true;
            }
            run_once(config).await
        }
    }
}
