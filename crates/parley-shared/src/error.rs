use thiserror::Error;

/// Input rejected before any storage access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Message is too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Malformed identifier: {0:?}")]
    MalformedId(String),

    #[error("Malformed email address: {0:?}")]
    MalformedEmail(String),

    #[error("Nickname must not be empty")]
    EmptyNickname,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("A user cannot target themselves")]
    SelfReference,
}
