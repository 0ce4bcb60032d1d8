//! # parley-shared
//!
//! Identifiers, limits and validation errors shared by the Parley store and
//! service crates.

pub mod constants;
pub mod error;
pub mod types;

pub use error::ValidationError;
pub use types::{ConversationKey, MessageId, UserId};
