mod bootstrap;
mod llm_http;
mod retrieval_http;

use anyhow::Result;
use docent_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use docent_core::config::LogFormat::*;
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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let mut state = app.dispatcher.load_state().await?;

    tracing::info!(
        event_name = "system.server.started",
        poll_interval_secs = app.config.engine.poll_interval_secs,
        "docent-server started; entering poll loop"
    );

    tokio::select! {
        _ = app.dispatcher.run(&mut state) => {}
        _ = wait_for_shutdown() => {
            tracing::info!(
                event_name = "system.server.stopping",
                "shutdown signal received; stopping poll loop"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
