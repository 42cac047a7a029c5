//! Media fetching
//!
//! The scraping itself is delegated to the `instaloader` command-line tool;
//! this module only decides how it is invoked and how its failures map onto
//! [`FetchError`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use instagram_types::Shortcode;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::FetcherConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("post not found or not accessible: {0}")]
    NotFound(String),

    #[error("Instagram is rate limiting requests: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Retrieves the media of one post into a local directory
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download every media file of the post into `destination` and return
    /// the paths written.
    async fn fetch(&self, shortcode: &Shortcode, destination: &Path)
        -> Result<Vec<PathBuf>, FetchError>;
}

/// [`MediaFetcher`] backed by the `instaloader` CLI
#[derive(Debug, Clone)]
pub struct InstaloaderFetcher {
    config: FetcherConfig,
}

impl InstaloaderFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Arguments for one post download.
    ///
    /// Pictures and videos are downloaded; metadata JSON is not.
    pub fn args(&self, shortcode: &Shortcode, destination: &Path) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-metadata-json".to_string(),
            "--no-compress-json".to_string(),
            "--dirname-pattern".to_string(),
            destination.to_string_lossy().into_owned(),
        ];

        if let Some(login) = &self.config.login {
            args.push("--login".to_string());
            args.push(login.clone());
        }
        if let Some(session_file) = &self.config.session_file {
            args.push("--sessionfile".to_string());
            args.push(session_file.clone());
        }

        args.extend(self.config.extra_args.iter().cloned());

        // `-SHORTCODE` selects a single post; `--` keeps codes starting
        // with a dash from being read as options.
        args.push("--".to_string());
        args.push(format!("-{}", shortcode));
        args
    }
}

#[async_trait]
impl MediaFetcher for InstaloaderFetcher {
    async fn fetch(
        &self,
        shortcode: &Shortcode,
        destination: &Path,
    ) -> Result<Vec<PathBuf>, FetchError> {
        let args = self.args(shortcode, destination);
        debug!("Running {} {:?}", self.config.binary, args);

        let output = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out request drops this future; the child must die with it.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                FetchError::Network(format!("failed to start {}: {}", self.config.binary, e))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            warn!(
                "instaloader exited with {} for {}: {}",
                output.status,
                shortcode,
                stderr.trim()
            );
            return Err(classify_failure(&stderr));
        }

        let files = list_files(destination);

        // instaloader exits 0 for some per-post failures and only reports
        // them on stderr.
        if files.is_empty() && is_not_found(&stderr.to_ascii_lowercase()) {
            return Err(FetchError::NotFound(last_line(&stderr)));
        }

        debug!("instaloader wrote {} files for {}", files.len(), shortcode);
        Ok(files)
    }
}

/// Map instaloader's stderr onto a [`FetchError`].
pub fn classify_failure(stderr: &str) -> FetchError {
    let lower = stderr.to_ascii_lowercase();
    let detail = last_line(stderr);

    if lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("please wait a few minutes")
        || lower.contains("rate limit")
    {
        FetchError::RateLimited(detail)
    } else if is_not_found(&lower) {
        FetchError::NotFound(detail)
    } else {
        FetchError::Network(detail)
    }
}

fn is_not_found(lower: &str) -> bool {
    lower.contains("does not exist")
        || lower.contains("not found")
        || lower.contains("404")
        || lower.contains("login required")
        || lower.contains("private")
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("instaloader failed without output")
        .to_string()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}
