//! Telegram send-error handling
//!
//! Converts teloxide errors into a [`DeliveryError`] the dispatcher can
//! report, and decides whether a send is worth one more attempt.

use std::fmt;
use std::time::Duration;

use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

/// Coarse classification of a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryCategory {
    /// Flood control persisted after the retry
    RateLimit,
    /// Bot was blocked/kicked by user or group
    BotBlocked,
    /// Target chat not found or migrated
    NotFound,
    /// Insufficient bot permissions
    PermissionDenied,
    /// File or text too large for Telegram
    PayloadTooLarge,
    /// Telegram rejected the payload
    InvalidInput,
    /// Network or I/O error
    Network,
    Unknown,
}

/// A message Telegram did not accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub category: DeliveryCategory,
    pub message: String,
    pub permanent: bool,
}

impl DeliveryError {
    pub fn new(category: DeliveryCategory, message: impl Into<String>) -> Self {
        let permanent = matches!(
            category,
            DeliveryCategory::BotBlocked | DeliveryCategory::NotFound
        );
        Self {
            category,
            message: message.into(),
            permanent,
        }
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DeliveryError {}

/// Result of handling an API error
#[derive(Debug)]
pub enum ErrorOutcome {
    /// Retry after this duration
    Retry(Duration),
    /// Give up and report
    Failed(DeliveryError),
}

/// Classify a `RequestError` and decide what to do next.
pub fn classify(operation: &str, err: &RequestError) -> ErrorOutcome {
    match err {
        // ── Flood control ────────────────────────────────────────────────────
        RequestError::RetryAfter(secs) => {
            let wait = Duration::from_secs(secs.duration().as_secs().max(1));
            warn!("Flood control on '{}': retry after {:?}", operation, wait);
            ErrorOutcome::Retry(wait)
        }

        // ── Chat migration ───────────────────────────────────────────────────
        RequestError::MigrateToChatId(new_id) => {
            warn!("Chat migrated on '{}': new_id={}", operation, new_id.0);
            ErrorOutcome::Failed(DeliveryError::new(
                DeliveryCategory::NotFound,
                format!("This group was upgraded; send the link again in the new chat ({})", new_id.0),
            ))
        }

        // ── Network / I/O ────────────────────────────────────────────────────
        RequestError::Network(_) | RequestError::Io(_) => {
            debug!("Network error on '{}': {}", operation, err);
            ErrorOutcome::Failed(DeliveryError::new(
                DeliveryCategory::Network,
                format!("Network error while talking to Telegram: {}", err),
            ))
        }

        // ── Invalid JSON ─────────────────────────────────────────────────────
        RequestError::InvalidJson { raw, .. } => {
            warn!("Invalid JSON on '{}': {}", operation, raw);
            ErrorOutcome::Failed(DeliveryError::new(
                DeliveryCategory::Unknown,
                format!("Invalid JSON response: {}", raw),
            ))
        }

        // ── Telegram API errors ──────────────────────────────────────────────
        RequestError::Api(api_err) => ErrorOutcome::Failed(classify_api(operation, api_err)),
    }
}

fn classify_api(operation: &str, api_err: &ApiError) -> DeliveryError {
    use DeliveryCategory::*;

    let (category, message): (DeliveryCategory, String) = match api_err {
        // Bot status ──────────────────────────────────────────────────────────
        ApiError::BotBlocked => (BotBlocked, "Bot was blocked by the user".into()),
        ApiError::BotKicked => (BotBlocked, "Bot was kicked from the group".into()),
        ApiError::BotKickedFromSupergroup => (BotBlocked, "Bot was kicked from the supergroup".into()),
        ApiError::CantInitiateConversation => (BotBlocked, "Can't initiate conversation with the user".into()),
        ApiError::CantTalkWithBots => (BotBlocked, "Can't send messages to bots".into()),

        // Chat ────────────────────────────────────────────────────────────────
        ApiError::ChatNotFound => (NotFound, "Chat not found".into()),
        ApiError::GroupDeactivated => (NotFound, "Group is deactivated".into()),
        ApiError::UserDeactivated => (NotFound, "User is deactivated".into()),

        // Permissions ─────────────────────────────────────────────────────────
        ApiError::NotEnoughRightsToPostMessages => (PermissionDenied, "Not enough rights to post messages".into()),

        // Files ───────────────────────────────────────────────────────────────
        ApiError::RequestEntityTooLarge => (PayloadTooLarge, "File is too large for Telegram".into()),
        ApiError::WrongFileIdOrUrl => (InvalidInput, "Wrong file ID or URL".into()),
        ApiError::FailedToGetUrlContent => (InvalidInput, "Failed to get content from URL".into()),
        ApiError::PhotoAsInputFileRequired => (InvalidInput, "Photo must be uploaded as input file".into()),

        // Messages ────────────────────────────────────────────────────────────
        ApiError::ButtonDataInvalid => (InvalidInput, "Button data is invalid or too long (max 64 bytes)".into()),
        ApiError::MessageIsTooLong => (PayloadTooLarge, "Message is too long (max 4096 characters)".into()),
        ApiError::TooMuchMessages => (RateLimit, "Too many messages sent to this chat".into()),
        ApiError::InvalidToken => (InvalidInput, "Bot token is invalid".into()),

        // Catch-all ───────────────────────────────────────────────────────────
        ApiError::Unknown(raw) => (Unknown, format!("Telegram rejected the message: {}", raw)),

        _ => (Unknown, format!("Telegram rejected the message: {}", api_err)),
    };

    let err = DeliveryError::new(category, message);
    if err.permanent {
        warn!("Permanent Telegram error on '{}' [{:?}]: {}", operation, category, err.message);
    } else {
        debug!("Telegram error on '{}' [{:?}]: {}", operation, category, err.message);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::ChatId;

    fn failed(outcome: ErrorOutcome) -> DeliveryError {
        match outcome {
            ErrorOutcome::Failed(err) => err,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_too_large_is_payload_error() {
        let err = failed(classify(
            "send_video",
            &RequestError::Api(ApiError::RequestEntityTooLarge),
        ));
        assert_eq!(err.category, DeliveryCategory::PayloadTooLarge);
        assert!(!err.permanent);
    }

    #[test]
    fn test_blocked_is_permanent() {
        let err = failed(classify("send_photo", &RequestError::Api(ApiError::BotBlocked)));
        assert_eq!(err.category, DeliveryCategory::BotBlocked);
        assert!(err.permanent);
    }

    #[test]
    fn test_migration_is_reported() {
        let err = failed(classify("send_document", &RequestError::MigrateToChatId(ChatId(-100777))));
        assert_eq!(err.category, DeliveryCategory::NotFound);
        assert!(err.message.contains("-100777"));
    }

    #[test]
    fn test_unknown_api_error_keeps_raw_text() {
        let err = failed(classify(
            "send_photo",
            &RequestError::Api(ApiError::Unknown("Bad Request: IMAGE_PROCESS_FAILED".into())),
        ));
        assert_eq!(err.category, DeliveryCategory::Unknown);
        assert!(err.message.contains("IMAGE_PROCESS_FAILED"));
    }

    #[test]
    fn test_display_is_message() {
        let err = DeliveryError::new(DeliveryCategory::Network, "boom");
        assert_eq!(err.to_string(), "boom");
    }
}
