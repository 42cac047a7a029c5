//! Configuration management for instagram-bot

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramBotConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Telegram bot specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramBotConfig {
    /// Bot token from BotFather
    #[serde(default)]
    pub bot_token: String,
    /// Update mode: polling or webhook
    #[serde(default)]
    pub update_mode: UpdateModeConfig,
}

/// Update mode configuration (webhook or polling)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum UpdateModeConfig {
    /// Long polling mode (default)
    Polling {
        /// Timeout in seconds for long polling
        #[serde(default = "default_polling_timeout")]
        timeout: u32,
        /// Maximum number of updates to fetch at once
        #[serde(default = "default_polling_limit")]
        limit: u8,
    },
    /// Webhook mode, served on the HTTP listener next to the status routes
    Webhook {
        /// Public base URL Telegram will push updates to
        /// Example: "https://example.com"
        url: String,
        /// Path of the webhook route (default: "/webhook")
        #[serde(default = "default_webhook_path")]
        path: String,
        /// Optional secret token to validate requests
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_token: Option<String>,
        /// Maximum allowed number of simultaneous HTTPS connections to the webhook
        #[serde(default = "default_max_connections")]
        max_connections: u8,
    },
}

/// Scratch storage and request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root of the per-conversation scratch directories
    #[serde(default = "default_downloads_root")]
    pub root: PathBuf,
    /// Upper bound for fetch plus delivery of one request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// instaloader invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Path or name of the instaloader executable
    #[serde(default = "default_fetcher_binary")]
    pub binary: String,
    /// Instagram username whose saved session is reused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// Session file written by `instaloader --login`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,
    /// Extra arguments appended before the target
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// Status and webhook HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set")?;

        // Check for webhook mode from environment
        let update_mode = if let Ok(webhook_url) = std::env::var("TELEGRAM_WEBHOOK_URL") {
            let path = std::env::var("TELEGRAM_WEBHOOK_PATH")
                .unwrap_or_else(|_| default_webhook_path());
            let secret_token = std::env::var("TELEGRAM_WEBHOOK_SECRET").ok();

            UpdateModeConfig::Webhook {
                url: webhook_url,
                path,
                secret_token,
                max_connections: default_max_connections(),
            }
        } else {
            UpdateModeConfig::default()
        };

        let mut downloads = DownloadConfig::default();
        if let Ok(root) = std::env::var("DOWNLOADS_DIR") {
            downloads.root = PathBuf::from(root);
        }
        if let Some(secs) = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            downloads.request_timeout_secs = secs;
        }

        let mut fetcher = FetcherConfig::default();
        if let Ok(binary) = std::env::var("INSTALOADER_BIN") {
            fetcher.binary = binary;
        }
        fetcher.login = std::env::var("INSTAGRAM_LOGIN").ok();
        fetcher.session_file = std::env::var("INSTAGRAM_SESSION_FILE").ok();

        let mut http = HttpConfig::default();
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            http.port = port;
        }

        Ok(Config {
            telegram: TelegramBotConfig {
                bot_token,
                update_mode,
            },
            downloads,
            fetcher,
            http,
        })
    }

    /// Reject configurations the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("Telegram bot token is empty; set TELEGRAM_BOT_TOKEN or telegram.bot_token");
        }

        if self.downloads.request_timeout_secs == 0 {
            bail!("downloads.request_timeout_secs must be greater than zero");
        }

        if let UpdateModeConfig::Webhook { .. } = &self.telegram.update_mode {
            self.webhook_url()?;
        }

        Ok(())
    }

    /// Full webhook URL (`url` + `path`) when running in webhook mode.
    pub fn webhook_url(&self) -> Result<Option<url::Url>> {
        match &self.telegram.update_mode {
            UpdateModeConfig::Polling { .. } => Ok(None),
            UpdateModeConfig::Webhook { url, path, .. } => {
                let full = format!("{}{}", url.trim_end_matches('/'), path);
                let parsed = full
                    .parse::<url::Url>()
                    .with_context(|| format!("Invalid webhook URL '{}'", full))?;
                Ok(Some(parsed))
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.downloads.request_timeout_secs)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.bind_address, self.http.port)
    }
}

fn default_polling_timeout() -> u32 {
    30
}

fn default_polling_limit() -> u8 {
    100
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_max_connections() -> u8 {
    40
}

fn default_downloads_root() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_request_timeout() -> u64 {
    300
}

fn default_fetcher_binary() -> String {
    "instaloader".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

impl Default for UpdateModeConfig {
    fn default() -> Self {
        UpdateModeConfig::Polling {
            timeout: default_polling_timeout(),
            limit: default_polling_limit(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            root: default_downloads_root(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            binary: default_fetcher_binary(),
            login: None,
            session_file: None,
            extra_args: Vec::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_http_port(),
        }
    }
}
