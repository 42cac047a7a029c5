//! Outbound messages (bot → Telegram)
//!
//! The dispatcher talks to Telegram only through [`Messenger`], which keeps
//! the delivery workflow testable without a live bot.

#[cfg(test)]
#[path = "outbound_tests.rs"]
mod outbound_tests;

use std::path::Path;

use async_trait::async_trait;
use instagram_types::{ArchiveCallback, ConversationId};
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ReplyMarkup};
use teloxide::RequestError;
use tracing::debug;

use crate::errors::{classify, DeliveryCategory, DeliveryError, ErrorOutcome};

/// Text of the message carrying the archive button
pub const ARCHIVE_OFFER_TEXT: &str = "Would you like to download all media as a ZIP file?";

/// Label of the archive button
pub const ARCHIVE_BUTTON_LABEL: &str = "📦 Download as ZIP";

/// Sends typed messages to a conversation
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_photo(&self, chat: ConversationId, path: &Path) -> Result<(), DeliveryError>;

    async fn send_video(&self, chat: ConversationId, path: &Path) -> Result<(), DeliveryError>;

    /// Send a file as a document under the given file name.
    async fn send_document(
        &self,
        chat: ConversationId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), DeliveryError>;

    async fn send_text(&self, chat: ConversationId, text: &str) -> Result<(), DeliveryError>;

    /// Send the single-button follow-up that re-requests the post as a zip.
    async fn offer_archive(
        &self,
        chat: ConversationId,
        callback: &ArchiveCallback,
    ) -> Result<(), DeliveryError>;
}

/// Inline keyboard with the archive button
pub fn archive_offer_markup(callback: &ArchiveCallback) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        ARCHIVE_BUTTON_LABEL,
        callback.encode(),
    )]])
}

/// [`Messenger`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Send a request, waiting out flood control once.
    async fn send_with_retry<R, F>(&self, operation: &str, mut build: F) -> Result<(), DeliveryError>
    where
        F: FnMut() -> R + Send,
        R: Request<Err = RequestError> + Send,
    {
        let mut retried = false;
        loop {
            match build().send().await {
                Ok(_) => return Ok(()),
                Err(e) => match classify(operation, &e) {
                    ErrorOutcome::Retry(wait) if !retried => {
                        retried = true;
                        tokio::time::sleep(wait).await;
                    }
                    ErrorOutcome::Retry(wait) => {
                        return Err(DeliveryError::new(
                            DeliveryCategory::RateLimit,
                            format!("Telegram asked to wait {}s before sending more", wait.as_secs()),
                        ));
                    }
                    ErrorOutcome::Failed(err) => return Err(err),
                },
            }
        }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_photo(&self, chat: ConversationId, path: &Path) -> Result<(), DeliveryError> {
        debug!("Sending photo {} to chat {}", path.display(), chat);
        self.send_with_retry("send_photo", || {
            self.bot
                .send_photo(ChatId(chat.get()), InputFile::file(path.to_path_buf()))
        })
        .await
    }

    async fn send_video(&self, chat: ConversationId, path: &Path) -> Result<(), DeliveryError> {
        debug!("Sending video {} to chat {}", path.display(), chat);
        self.send_with_retry("send_video", || {
            let mut req = self
                .bot
                .send_video(ChatId(chat.get()), InputFile::file(path.to_path_buf()));
            req.supports_streaming = Some(true);
            req
        })
        .await
    }

    async fn send_document(
        &self,
        chat: ConversationId,
        path: &Path,
        file_name: &str,
    ) -> Result<(), DeliveryError> {
        debug!("Sending document {} to chat {}", file_name, chat);
        self.send_with_retry("send_document", || {
            let file = InputFile::file(path.to_path_buf()).file_name(file_name.to_string());
            self.bot.send_document(ChatId(chat.get()), file)
        })
        .await
    }

    async fn send_text(&self, chat: ConversationId, text: &str) -> Result<(), DeliveryError> {
        self.send_with_retry("send_message", || {
            self.bot.send_message(ChatId(chat.get()), text.to_string())
        })
        .await
    }

    async fn offer_archive(
        &self,
        chat: ConversationId,
        callback: &ArchiveCallback,
    ) -> Result<(), DeliveryError> {
        self.send_with_retry("send_message", || {
            let mut req = self
                .bot
                .send_message(ChatId(chat.get()), ARCHIVE_OFFER_TEXT);
            req.reply_markup = Some(ReplyMarkup::InlineKeyboard(archive_offer_markup(callback)));
            req
        })
        .await
    }
}
