//! Validation errors for post references and callback payloads

use thiserror::Error;

/// Reasons a post reference or callback payload is rejected before any
/// network call is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no post link was given")]
    Empty,

    #[error("not an Instagram post link: {0}")]
    NotInstagram(String),

    #[error("the link does not point at a post: {0}")]
    MissingShortcode(String),

    #[error("invalid post code: {0}")]
    InvalidShortcode(String),

    #[error("button data is {len} bytes, limit is {limit}")]
    CallbackTooLong { len: usize, limit: usize },

    #[error("unrecognised button data: {0}")]
    MalformedCallback(String),
}
