use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use kalshi_crypto::api;
use kalshi_crypto::config::Config;
use kalshi_crypto::engine::bot::TradingBot;
use kalshi_crypto::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("loading configuration")?;
    let log_path = telemetry::init_logging(&config.log_dir)?;

    info!(log_file = %log_path.display(), "logging initialized");
    info!(
        series = %config.series_ticker,
        dry_run = config.dry_run,
        bankroll = config.bankroll,
        api = format!("{}:{}{}", config.api_host, config.api_port, config.api_prefix),
        "kalshi-crypto starting"
    );
    if !config.dry_run {
        warn!("DRY RUN IS OFF — real orders will reach the exchange once started");
    }

    let bot = TradingBot::new(config)?;

    // Operator surface runs for the life of the process; the bot itself only
    // trades after POST /start (or a start_bot frame over the websocket).
    let api_bot = Arc::clone(&bot);
    let api_task = tokio::spawn(async move {
        if let Err(e) = api::serve(api_bot).await {
            error!(error = %e, "operator API failed");
        }
    });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");

    if bot.is_running() {
        bot.stop().await;
    }
    api_task.abort();
    info!("shutdown complete");
    Ok(())
}
