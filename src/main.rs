// src/main.rs
use std::sync::Arc;

use anyhow::Context;
use stack_it_now::config::AppConfig;
use stack_it_now::{PackingEngine, api, init_logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging()?;
    if let Err(err) = dotenv {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!(error = %err, "could not load .env");
        }
    }

    let app_config = AppConfig::from_env();
    let engine = Arc::new(PackingEngine::from_config(&app_config.optimizer));
    info!(config = ?engine.config(), "load planning service starting");

    let addr = app_config.api.socket_addr();
    api::start_api_server(app_config.api, engine)
        .await
        .with_context(|| format!("API server on {} terminated", addr))
}
