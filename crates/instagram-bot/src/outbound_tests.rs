//! Tests for the Telegram messenger.
//!
//! The fake Telegram API URL (http://127.0.0.1:19999/) causes instant
//! "Connection refused" errors, which exercise error classification without
//! internet access.

#[cfg(test)]
mod tests {
    use crate::errors::DeliveryCategory;
    use crate::outbound::{archive_offer_markup, Messenger, TelegramMessenger, ARCHIVE_BUTTON_LABEL};
    use instagram_types::{ArchiveCallback, ConversationId, Shortcode};
    use teloxide::types::InlineKeyboardButtonKind;
    use teloxide::Bot;

    /// Creates a bot that immediately fails all API calls (connection refused).
    fn fake_bot() -> Bot {
        Bot::new("1234567890:AAAAAAAAAAAAAAAAAAAaaaaaaaaa")
            .set_api_url(url::Url::parse("http://127.0.0.1:19999/").unwrap())
    }

    fn callback() -> ArchiveCallback {
        ArchiveCallback::new(Shortcode::parse("ABC123").unwrap())
    }

    // ── Unit tests (no I/O) ───────────────────────────────────────────────────

    #[test]
    fn test_archive_offer_markup_has_single_button() {
        let markup = archive_offer_markup(&callback());
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0].len(), 1);

        let button = &markup.inline_keyboard[0][0];
        assert_eq!(button.text, ARCHIVE_BUTTON_LABEL);
        assert!(matches!(
            &button.kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "zip:ABC123"
        ));
    }

    // ── Connection refused ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_send_text_network_error() {
        let messenger = TelegramMessenger::new(fake_bot());
        let err = messenger
            .send_text(ConversationId::new(1), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.category, DeliveryCategory::Network);
        assert!(!err.permanent);
    }

    #[tokio::test]
    async fn test_offer_archive_network_error() {
        let messenger = TelegramMessenger::new(fake_bot());
        let err = messenger
            .offer_archive(ConversationId::new(1), &callback())
            .await
            .unwrap_err();
        assert_eq!(err.category, DeliveryCategory::Network);
    }

    #[tokio::test]
    async fn test_send_photo_network_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let messenger = TelegramMessenger::new(fake_bot());
        let err = messenger
            .send_photo(ConversationId::new(1), &path)
            .await
            .unwrap_err();
        assert_eq!(err.category, DeliveryCategory::Network);
    }
}
