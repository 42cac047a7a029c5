//! Inline-button payload for "download as zip"
//!
//! Telegram limits `callback_data` to 64 bytes. The payload therefore carries
//! only the validated shortcode, never the raw URL the user sent.

use crate::errors::ValidationError;
use crate::post::{PostReference, Shortcode};

/// Telegram's `callback_data` size limit in bytes
pub const CALLBACK_DATA_LIMIT: usize = 64;

const PREFIX: &str = "zip:";

/// Request to re-deliver a previously shown post as an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveCallback {
    shortcode: Shortcode,
}

impl ArchiveCallback {
    pub fn new(shortcode: Shortcode) -> Self {
        Self { shortcode }
    }

    pub fn for_post(post: &PostReference) -> Self {
        Self::new(post.shortcode().clone())
    }

    pub fn shortcode(&self) -> &Shortcode {
        &self.shortcode
    }

    /// Encode as `zip:{shortcode}`.
    pub fn encode(&self) -> String {
        format!("{}{}", PREFIX, self.shortcode)
    }

    /// Decode and validate button data received from Telegram.
    pub fn decode(data: &str) -> Result<Self, ValidationError> {
        if data.len() > CALLBACK_DATA_LIMIT {
            return Err(ValidationError::CallbackTooLong {
                len: data.len(),
                limit: CALLBACK_DATA_LIMIT,
            });
        }

        let code = data
            .strip_prefix(PREFIX)
            .ok_or_else(|| ValidationError::MalformedCallback(data.to_string()))?;

        Ok(Self {
            shortcode: Shortcode::parse(code)?,
        })
    }
}
