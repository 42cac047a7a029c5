//! Shared types for the Instagram downloader bot
//!
//! This crate holds the pure domain model used by the bot binary: post
//! references and their validation, conversation identifiers, fetch
//! requests, staged media classification and the inline-button payload
//! that re-requests a post as an archive.

pub mod callback;
pub mod conversation;
pub mod errors;
pub mod media;
pub mod post;
pub mod request;

// Re-export commonly used types
pub use callback::ArchiveCallback;
pub use conversation::ConversationId;
pub use errors::ValidationError;
pub use media::{MediaKind, StagedFile};
pub use post::{PostReference, Shortcode};
pub use request::{DeliveryMode, FetchRequest};
