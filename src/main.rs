use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zenload::bot::{self, Bot};
use zenload::config::Config;
use zenload::db::Database;
use zenload::dispatcher::Dispatcher;
use zenload::download::sweep_stale_downloads;
use zenload::extractors::Platform;
use zenload::telegram::TelegramClient;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting zenload");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // Ensure data directories exist
    for dir in [&config.downloads_dir, &config.cookies_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    // Leftovers from a previous unclean shutdown
    if let Err(e) = sweep_stale_downloads(&config.downloads_dir).await {
        warn!("Failed to sweep downloads directory: {e}");
    }

    log_cookie_status(&config);
    if config.yandex_music_token.is_none() {
        warn!("YANDEX_MUSIC_TOKEN not set - Yandex Music links will fail");
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!(path = %config.database_path.display(), "Database initialized");

    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);

    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build Telegram HTTP client")?;
    let api = TelegramClient::new(http, &config.telegram_api_url, &config.telegram_bot_token);
    let me = api.get_me().await.context("Failed to authenticate with Telegram")?;
    let username = me
        .username
        .context("Bot account has no username")?;
    info!(bot_id = me.id, username = %username, "Authenticated with Telegram");

    let requests_per_minute = NonZeroU32::new(config.user_requests_per_minute)
        .context("USER_REQUESTS_PER_MINUTE must be at least 1")?;
    let bot = Arc::new(Bot::new(
        api,
        db.clone(),
        Arc::clone(&dispatcher),
        username,
        requests_per_minute,
    ));

    let shutdown = CancellationToken::new();
    let poll_handle = tokio::spawn(bot::run(bot, config.poll_timeout, shutdown.clone()));

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down...");
    shutdown.cancel();
    dispatcher.shutdown().await;

    match poll_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Polling stopped with error: {e:#}"),
        Err(e) => error!("Polling task panicked: {e}"),
    }
    db.close().await;

    info!("Shutdown complete");

    Ok(())
}

fn log_cookie_status(config: &Config) {
    for platform in [Platform::Instagram, Platform::TikTok, Platform::YouTube, Platform::Pinterest] {
        let path = config.cookies_file(platform.as_str());
        if path.is_file() {
            info!(platform = %platform, path = %path.display(), "Cookies file found");
        }
    }
    if !config.cookies_file(Platform::Instagram.as_str()).is_file() {
        warn!("No Instagram cookies configured - private or rate-limited posts may fail");
    }
}

fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,zenload=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
