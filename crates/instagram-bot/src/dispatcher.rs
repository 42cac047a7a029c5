//! Fetch-and-deliver workflow
//!
//! One [`FetchRequest`] moves through
//! `Received → Validating → Fetching → Delivering → CleaningUp → Done`,
//! or ends in `Errored` from any step. Every path that allocated a
//! workspace releases it, and every failure produces exactly one
//! user-facing error message.

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod dispatcher_tests;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use instagram_types::{
    ArchiveCallback, ConversationId, DeliveryMode, FetchRequest, MediaKind, PostReference,
    StagedFile, ValidationError,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveBuilder, ArchiveError};
use crate::errors::DeliveryError;
use crate::fetcher::{FetchError, MediaFetcher};
use crate::locks::ConversationLocks;
use crate::outbound::Messenger;
use crate::workspace::{ScratchWorkspace, WorkspaceManager};

/// Sent when a post yields no files at all
pub const NO_MEDIA_TEXT: &str = "ℹ️ No media was found in this post.";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("file system error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("{}", summarize_delivery(.failed, .attempted, .first))]
    Delivery {
        failed: usize,
        attempted: usize,
        first: DeliveryError,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

fn summarize_delivery(failed: &usize, attempted: &usize, first: &DeliveryError) -> String {
    if *attempted <= 1 {
        first.to_string()
    } else {
        format!("{} of {} files could not be sent: {}", failed, attempted, first)
    }
}

impl WorkflowError {
    /// The single text message sent to the conversation for this failure.
    pub fn user_message(&self, mode: DeliveryMode) -> String {
        match (self, mode) {
            (Self::Validation(e), _) => format!("❌ Invalid Instagram URL: {}", e),
            (e, DeliveryMode::Inline) => format!("❌ Error downloading: {}", e),
            (e, DeliveryMode::Archive) => format!("❌ Error creating ZIP: {}", e),
        }
    }
}

/// What reached the conversation for one request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Files the fetcher left in the workspace
    pub staged: usize,
    pub photos_sent: usize,
    pub videos_sent: usize,
    /// Files with an extension that is neither image nor video
    pub skipped: usize,
    pub archive_sent: bool,
    pub archive_offered: bool,
}

/// Final state of one request
#[derive(Debug)]
pub enum RequestOutcome {
    /// Rejected before any fetch was attempted
    Rejected(ValidationError),
    /// Completed; the report may be empty when the post had no media
    Delivered(DeliveryReport),
    /// Failed after validation; `partial` counts what was sent anyway
    Failed {
        error: WorkflowError,
        partial: DeliveryReport,
    },
}

impl RequestOutcome {
    pub fn report(&self) -> Option<&DeliveryReport> {
        match self {
            Self::Rejected(_) => None,
            Self::Delivered(report) => Some(report),
            Self::Failed { partial, .. } => Some(partial),
        }
    }

    #[cfg(test)]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Shared request-handling core used by both the polling and the webhook
/// front-ends.
pub struct DeliveryDispatcher {
    fetcher: Arc<dyn MediaFetcher>,
    messenger: Arc<dyn Messenger>,
    workspaces: WorkspaceManager,
    archiver: ArchiveBuilder,
    locks: ConversationLocks,
    timeout: Duration,
}

impl DeliveryDispatcher {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        messenger: Arc<dyn Messenger>,
        workspaces: WorkspaceManager,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            messenger,
            workspaces,
            archiver: ArchiveBuilder,
            locks: ConversationLocks::new(),
            timeout,
        }
    }

    /// Conversations with a request in flight or queued
    pub fn active_conversations(&self) -> usize {
        self.locks.active()
    }

    /// Validate the raw reference, then fetch and deliver.
    pub async fn handle(&self, request: FetchRequest) -> RequestOutcome {
        debug!(
            "Received {} request from chat {}: {}",
            request.mode, request.conversation, request.post_reference
        );

        match PostReference::parse(&request.post_reference) {
            Ok(post) => self.handle_post(request.conversation, post, request.mode).await,
            Err(e) => self.reject(request.conversation, request.mode, e).await,
        }
    }

    /// Decode archive-button data, then fetch and deliver as an archive.
    pub async fn handle_callback(&self, conversation: ConversationId, data: &str) -> RequestOutcome {
        debug!("Received archive callback from chat {}: {}", conversation, data);

        match ArchiveCallback::decode(data) {
            Ok(callback) => {
                let post = PostReference::from(callback.shortcode().clone());
                self.handle_post(conversation, post, DeliveryMode::Archive)
                    .await
            }
            Err(e) => self.reject(conversation, DeliveryMode::Archive, e).await,
        }
    }

    /// Fetch and deliver an already validated post.
    pub async fn handle_post(
        &self,
        conversation: ConversationId,
        post: PostReference,
        mode: DeliveryMode,
    ) -> RequestOutcome {
        let _guard = self.locks.lock(conversation).await;
        info!(
            "Handling {} request for post {} in chat {}",
            mode,
            post.shortcode(),
            conversation
        );

        let workspace = match self.workspaces.acquire(conversation).await {
            Ok(ws) => ws,
            Err(e) => {
                error!("Failed to allocate workspace for chat {}: {}", conversation, e);
                return self
                    .fail(conversation, mode, WorkflowError::Io(e), DeliveryReport::default())
                    .await;
            }
        };

        let mut report = DeliveryReport::default();
        let result = match tokio::time::timeout(
            self.timeout,
            self.fetch_and_deliver(&workspace, &post, mode, &mut report),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Request for post {} in chat {} timed out after {:?}",
                    post.shortcode(),
                    conversation,
                    self.timeout
                );
                Err(WorkflowError::Timeout(self.timeout))
            }
        };

        if let Err(e) = self.workspaces.release(&workspace).await {
            error!(
                "Failed to clean up workspace {}: {}",
                workspace.dir.display(),
                e
            );
        }

        match result {
            Ok(()) => {
                info!(
                    "Delivered post {} to chat {}: {} photos, {} videos, {} skipped, archive={}",
                    post.shortcode(),
                    conversation,
                    report.photos_sent,
                    report.videos_sent,
                    report.skipped,
                    report.archive_sent
                );
                RequestOutcome::Delivered(report)
            }
            Err(e) => self.fail(conversation, mode, e, report).await,
        }
    }

    async fn fetch_and_deliver(
        &self,
        workspace: &ScratchWorkspace,
        post: &PostReference,
        mode: DeliveryMode,
        report: &mut DeliveryReport,
    ) -> Result<(), WorkflowError> {
        let written = self.fetcher.fetch(post.shortcode(), &workspace.dir).await?;
        debug!("Fetcher reported {} files for {}", written.len(), post.shortcode());

        let staged = list_staged(workspace).await?;
        report.staged = staged.len();

        if staged.is_empty() {
            info!("Post {} has no media", post.shortcode());
            if let Err(e) = self
                .messenger
                .send_text(workspace.conversation, NO_MEDIA_TEXT)
                .await
            {
                warn!("Failed to send no-media notice: {}", e);
            }
            return Ok(());
        }

        match mode {
            DeliveryMode::Inline => self.deliver_inline(workspace, post, &staged, report).await,
            DeliveryMode::Archive => self.deliver_archive(workspace, report).await,
        }
    }

    async fn deliver_inline(
        &self,
        workspace: &ScratchWorkspace,
        post: &PostReference,
        staged: &[StagedFile],
        report: &mut DeliveryReport,
    ) -> Result<(), WorkflowError> {
        let chat = workspace.conversation;
        let mut attempted = 0;
        let mut failures = Vec::new();

        for file in staged {
            let result = match file.kind {
                MediaKind::Image => {
                    attempted += 1;
                    self.messenger
                        .send_photo(chat, &file.path)
                        .await
                        .map(|_| report.photos_sent += 1)
                }
                MediaKind::Video => {
                    attempted += 1;
                    self.messenger
                        .send_video(chat, &file.path)
                        .await
                        .map(|_| report.videos_sent += 1)
                }
                MediaKind::Unknown => {
                    debug!("Skipping {}", file.path.display());
                    report.skipped += 1;
                    continue;
                }
            };

            // One rejected file does not stop the rest.
            if let Err(e) = result {
                warn!(
                    "Failed to send {} ({:?}): {}",
                    file.path.display(),
                    e.category,
                    e
                );
                failures.push(e);
            }
        }

        if let Some(first) = failures.first() {
            return Err(WorkflowError::Delivery {
                failed: failures.len(),
                attempted,
                first: first.clone(),
            });
        }

        self.messenger
            .offer_archive(chat, &ArchiveCallback::for_post(post))
            .await
            .map_err(|first| WorkflowError::Delivery {
                failed: 1,
                attempted: 1,
                first,
            })?;
        report.archive_offered = true;

        Ok(())
    }

    async fn deliver_archive(
        &self,
        workspace: &ScratchWorkspace,
        report: &mut DeliveryReport,
    ) -> Result<(), WorkflowError> {
        let chat = workspace.conversation;

        self.archiver
            .build_async(workspace.dir.clone(), workspace.archive_path.clone())
            .await?;

        let sent = self
            .messenger
            .send_document(chat, &workspace.archive_path, &chat.archive_file_name())
            .await;

        if let Err(e) = tokio::fs::remove_file(&workspace.archive_path).await {
            warn!(
                "Failed to delete archive {}: {}",
                workspace.archive_path.display(),
                e
            );
        }

        sent.map_err(|first| WorkflowError::Delivery {
            failed: 1,
            attempted: 1,
            first,
        })?;
        report.archive_sent = true;

        Ok(())
    }

    async fn reject(
        &self,
        conversation: ConversationId,
        mode: DeliveryMode,
        err: ValidationError,
    ) -> RequestOutcome {
        info!("Rejected request from chat {}: {}", conversation, err);
        let message = WorkflowError::Validation(err.clone()).user_message(mode);
        self.send_error(conversation, &message).await;
        RequestOutcome::Rejected(err)
    }

    async fn fail(
        &self,
        conversation: ConversationId,
        mode: DeliveryMode,
        error: WorkflowError,
        partial: DeliveryReport,
    ) -> RequestOutcome {
        warn!("Request in chat {} failed: {}", conversation, error);
        self.send_error(conversation, &error.user_message(mode)).await;
        RequestOutcome::Failed { error, partial }
    }

    async fn send_error(&self, conversation: ConversationId, message: &str) {
        if let Err(e) = self.messenger.send_text(conversation, message).await {
            error!("Failed to report error to chat {}: {}", conversation, e);
        }
    }
}

async fn list_staged(workspace: &ScratchWorkspace) -> Result<Vec<StagedFile>, WorkflowError> {
    let workspace = workspace.clone();
    let files = tokio::task::spawn_blocking(move || workspace.staged_files())
        .await
        .map_err(io::Error::other)??;
    Ok(files)
}
