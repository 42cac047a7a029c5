//! Instagram media downloader bot
//!
//! Receives Instagram post links over Telegram, fetches the post's media
//! with instaloader and sends it back inline or as a single ZIP archive.

mod archive;
mod config;
mod dispatcher;
mod errors;
mod fetcher;
mod handlers;
mod health;
mod locks;
mod outbound;
mod workspace;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::prelude::*;
use teloxide::types::Message;
use teloxide::update_listeners::{webhooks, Polling};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, UpdateModeConfig};
use crate::dispatcher::DeliveryDispatcher;
use crate::fetcher::InstaloaderFetcher;
use crate::health::AppState;
use crate::outbound::TelegramMessenger;
use crate::workspace::WorkspaceManager;

/// Instagram downloader bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/instagram-bot.toml")]
    config: String,

    /// Telegram bot token (overrides config file)
    #[arg(long, env = "TELEGRAM_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Scratch directory root (overrides config file)
    #[arg(long, env = "DOWNLOADS_DIR")]
    downloads_dir: Option<String>,

    /// Status/webhook HTTP port (overrides config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "instagram_bot=debug,instagram_types=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Instagram downloader bot");

    let args = Args::parse();
    let config = load_config(args)?;
    config.validate()?;
    info!("Configuration loaded successfully");

    let health_state = AppState::new();

    info!("Initializing Telegram bot...");
    let bot = Bot::new(&config.telegram.bot_token);

    match bot.get_me().await {
        Ok(me) => {
            let username = me.username().to_string();
            info!("Bot authenticated as: @{}", username);
            health_state.set_bot_username(username).await;
        }
        Err(e) => {
            error!("Failed to authenticate bot: {}", e);
            return Err(e.into());
        }
    }

    let workspaces = WorkspaceManager::new(&config.downloads.root);
    let purged = workspaces
        .prepare()
        .await
        .with_context(|| format!("Failed to prepare {}", config.downloads.root.display()))?;
    info!(
        "Scratch root {} ready ({} stale entries removed)",
        workspaces.root().display(),
        purged
    );

    let dispatcher = Arc::new(DeliveryDispatcher::new(
        Arc::new(InstaloaderFetcher::new(config.fetcher.clone())),
        Arc::new(TelegramMessenger::new(bot.clone())),
        workspaces,
        config.request_timeout(),
    ));

    let addr: SocketAddr = config
        .http_addr()
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.http_addr()))?;

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handlers::handle_text_message),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback_query));

    let mut bot_dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![dispatcher, health_state.clone()])
        .enable_ctrlc_handler()
        .build();

    match &config.telegram.update_mode {
        UpdateModeConfig::Polling { timeout, limit } => {
            info!(
                "Starting bot in POLLING mode (timeout: {}s, limit: {})",
                timeout, limit
            );

            let state = health_state.clone();
            tokio::spawn(async move {
                if let Err(e) = health::start_health_server(state, addr).await {
                    error!("Status server error: {}", e);
                }
            });

            let listener = Polling::builder(bot)
                .timeout(Duration::from_secs(u64::from(*timeout)))
                .limit(*limit)
                .delete_webhook()
                .await
                .build();

            bot_dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        UpdateModeConfig::Webhook {
            secret_token,
            max_connections,
            ..
        } => {
            let url = config
                .webhook_url()?
                .context("webhook mode without a webhook URL")?;
            info!("Starting bot in WEBHOOK mode");
            info!("Webhook URL: {}", url);
            info!("Listening on: {}", addr);

            let mut options = webhooks::Options::new(addr, url);
            if let Some(token) = secret_token {
                options = options.secret_token(token.clone());
            }
            if *max_connections > 0 {
                options = options.max_connections(*max_connections);
            }

            let (listener, stop_flag, webhook_router) =
                webhooks::axum_to_router(bot, options).await?;
            info!("Webhook registered with Telegram successfully");

            let app = webhook_router.merge(health::create_health_router(health_state));
            let tcp = tokio::net::TcpListener::bind(addr).await?;

            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp, app)
                    .with_graceful_shutdown(stop_flag)
                    .await
                {
                    error!("HTTP server error: {}", e);
                }
            });

            bot_dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
                )
                .await;
        }
    }

    info!("Instagram downloader bot stopped");
    Ok(())
}

/// Load the config file (or the environment when it is absent) and apply
/// CLI overrides.
fn load_config(args: Args) -> Result<Config> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using environment variables");
        Config::from_env()?
    };

    if let Some(bot_token) = args.bot_token {
        config.telegram.bot_token = bot_token;
    }
    if let Some(root) = args.downloads_dir {
        config.downloads.root = root.into();
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    Ok(config)
}
