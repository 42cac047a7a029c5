//! Conversation identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a chat with the bot.
///
/// Scratch storage is keyed by this value, so two conversations never share
/// a directory. Group chats have negative ids; the sign is kept verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Name of the per-conversation scratch directory.
    pub fn workspace_dir_name(&self) -> String {
        self.0.to_string()
    }

    /// File name of the archive document sent to this conversation.
    ///
    /// Format: `instagram_media_{chat_id}.zip`
    pub fn archive_file_name(&self) -> String {
        format!("instagram_media_{}.zip", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_chat_names() {
        let id = ConversationId::new(123456789);
        assert_eq!(id.workspace_dir_name(), "123456789");
        assert_eq!(id.archive_file_name(), "instagram_media_123456789.zip");
    }

    #[test]
    fn test_group_chat_keeps_sign() {
        let id = ConversationId::from(-1001234567890);
        assert_eq!(id.workspace_dir_name(), "-1001234567890");
        assert_eq!(id.archive_file_name(), "instagram_media_-1001234567890.zip");
        assert_eq!(id.get(), -1001234567890);
    }

    #[test]
    fn test_serializes_as_bare_number() {
        let json = serde_json::to_string(&ConversationId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}
