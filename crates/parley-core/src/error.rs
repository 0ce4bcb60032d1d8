use parley_shared::{MessageId, UserId, ValidationError};
use parley_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Backend unavailable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Business-rule violations. Retrying the same call cannot succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Uid already registered: {0}")]
    DuplicateUid(UserId),

    #[error("Users are already friends")]
    AlreadyFriends,

    #[error("Friend request already pending")]
    RequestAlreadyPending,

    #[error("Users are not friends")]
    NotFriends,

    #[error("No pending friend request")]
    NoPendingRequest,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("user {0}")]
    User(UserId),

    #[error("message {0}")]
    Message(MessageId),
}

impl ServiceError {
    /// Transient backend failure worth another attempt.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Storage(e) if e.is_transient())
    }

    /// The conflict kind, if this is a business-rule violation.
    pub fn conflict(&self) -> Option<&ConflictError> {
        match self {
            ServiceError::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
