mod bootstrap;
mod safety;

use anyhow::Result;
use leaveform_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use leaveform_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env is normal in deployed environments
    let dotenv = dotenvy::dotenv().ok();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);
    safety::install_panic_hook();

    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment from .env");
    }

    let app = bootstrap::bootstrap(config);

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        form_channel_id = app.config.form_channel(),
        announce_channel_id = app.config.announce_channel(),
        "leaveform-server started"
    );
    app.gateway.run_until(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "leaveform-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "ctrl-c listener unavailable; running until the gateway stops");
        std::future::pending::<()>().await;
    }
}
