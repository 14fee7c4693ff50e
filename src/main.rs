//! Headless entrypoint (spec §1, §6): no UI, no HTTP surface. Loads the YAML
//! config, builds the composition root, starts the task graph, and blocks
//! until Ctrl+C tears it down.

use perpcore::application::system::Application;
use perpcore::config::Config;
use tracing::{error, info, Level};
use tracing_subscriber::prelude::*;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/engine.yaml".to_string());

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let config = Config::load(&config_path)?;
        info!(path = %config_path, "configuration loaded");

        let app = Application::build(config).await?;
        let _handle = app.start().await?;
        info!("trading engine running, awaiting shutdown signal");

        std::future::pending::<()>().await;
        Ok(())
    })
    .map_err(|e: anyhow::Error| {
        error!(error = %e, "fatal error during startup");
        e
    })
}
