use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use feedhook::{Config, CycleScheduler, Database, FeedFetcher, Pipeline, WebhookNotifier};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Local .env is for development only
    if std::env::var("ENV").as_deref() != Ok("production") {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                eprintln!("Failed to load .env: {e}");
            }
        }
    }

    let config_path =
        std::env::var("FEEDHOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(feedhook::FeedhookError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("{config_path} not found, using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = feedhook::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedhook::logging::init_console_only(&config.logging.level);
    }

    info!("feedhook {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> feedhook::Result<()> {
    let db = Database::connect(&config.database).await?;

    let pipeline = Arc::new(Pipeline::new(
        db.pool().clone(),
        FeedFetcher::new()?,
        WebhookNotifier::new(&config.webhook.url)?,
        &config.feed.url,
    ));

    let mut scheduler = CycleScheduler::new(pipeline, &config.schedule).await?;
    scheduler.start().await?;

    info!(
        crawl = %config.schedule.crawl_cron,
        notification = %config.schedule.notification_cron,
        "feedhook is running. Press Ctrl+C to stop."
    );

    shutdown_signal().await;

    if let Err(e) = scheduler.shutdown().await {
        warn!("Error shutting down scheduler: {}", e);
    }
    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl+C: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Cannot listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C");
        }
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C");
}
