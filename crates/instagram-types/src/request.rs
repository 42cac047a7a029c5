//! Fetch requests

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversation::ConversationId;

/// How fetched media is delivered back to the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One photo or video message per file, followed by an archive offer
    #[default]
    Inline,
    /// A single zip document
    Archive,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::Archive => f.write_str("archive"),
        }
    }
}

/// One inbound download request.
///
/// The post reference is kept raw; validation happens when the request is
/// handled so that rejections are reported like every other failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub conversation: ConversationId,
    pub post_reference: String,
    pub mode: DeliveryMode,
}

impl FetchRequest {
    pub fn new(
        conversation: ConversationId,
        post_reference: impl Into<String>,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            conversation,
            post_reference: post_reference.into(),
            mode,
        }
    }

    pub fn inline(conversation: ConversationId, post_reference: impl Into<String>) -> Self {
        Self::new(conversation, post_reference, DeliveryMode::Inline)
    }

    pub fn archive(conversation: ConversationId, post_reference: impl Into<String>) -> Self {
        Self::new(conversation, post_reference, DeliveryMode::Archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_inline() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Inline);
    }

    #[test]
    fn test_constructors() {
        let id = ConversationId::new(7);
        let req = FetchRequest::archive(id, "ABC123");
        assert_eq!(req.mode, DeliveryMode::Archive);
        assert_eq!(req.post_reference, "ABC123");
        assert_eq!(FetchRequest::inline(id, "x").mode, DeliveryMode::Inline);
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(serde_json::to_string(&DeliveryMode::Archive).unwrap(), "\"archive\"");
        assert_eq!(DeliveryMode::Inline.to_string(), "inline");
    }
}
