//! # parley-core
//!
//! Messaging and social-graph service for Parley.
//!
//! [`Messenger`] is the entry point. It owns one store handle and hands out
//! the four service components, all sharing that handle and one change
//! feed:
//!
//! - [`IdentityStore`]: registration, authentication, lookup and search
//! - [`FriendshipManager`]: friend requests and mutual friendships
//! - [`MessageStore`]: sending and deleting messages
//! - [`ConversationService`]: per-viewer conversation views and live watches
//!
//! ```no_run
//! use parley_core::{Messenger, NewUser, ServiceConfig};
//!
//! # fn main() -> parley_core::Result<()> {
//! let messenger = Messenger::open(ServiceConfig::from_env())?;
//! let anna = messenger.identity().create_user(NewUser::new(
//!     "Ivanova", "Anna", "anna", "anna@example.com", "correct horse",
//! ))?;
//! # let _ = anna;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod friendship;
pub mod identity;
pub mod messages;
pub mod retry;
pub mod telemetry;

mod backend;

use std::sync::Arc;

use parley_store::Database;

use crate::backend::Backend;

pub use config::{ServiceConfig, StorageLocation};
pub use conversation::{ConversationService, ConversationWatch};
pub use error::{ConflictError, NotFoundError, Result, ServiceError};
pub use events::ChangeEvent;
pub use friendship::FriendshipManager;
pub use identity::{IdentityStore, NewUser};
pub use messages::MessageStore;
pub use parley_shared::{ConversationKey, MessageId, UserId, ValidationError};
pub use parley_store::{Message, User};

/// Handle to a running service. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Messenger {
    backend: Arc<Backend>,
}

impl Messenger {
    /// Open the store named by `config.storage`, migrating it if needed.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        Ok(Self {
            backend: Arc::new(Backend::open(config)?),
        })
    }

    /// Run on an already opened database.
    pub fn with_database(database: Database, config: ServiceConfig) -> Result<Self> {
        Ok(Self {
            backend: Arc::new(Backend::with_database(database, config)?),
        })
    }

    pub fn identity(&self) -> IdentityStore {
        IdentityStore::new(self.backend.clone())
    }

    pub fn friendships(&self) -> FriendshipManager {
        FriendshipManager::new(self.backend.clone())
    }

    pub fn messages(&self) -> MessageStore {
        MessageStore::new(self.backend.clone())
    }

    pub fn conversations(&self) -> ConversationService {
        ConversationService::new(self.backend.clone())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.backend.config
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn uid(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    /// In-memory service with cheap password hashing and short retry delays.
    pub fn messenger() -> Messenger {
        messenger_with(|_| {})
    }

    pub fn messenger_with(tweak: impl FnOnce(&mut ServiceConfig)) -> Messenger {
        let mut config = fast_config(ServiceConfig::in_memory());
        tweak(&mut config);
        Messenger::open(config).unwrap()
    }

    pub fn fast_config(mut config: ServiceConfig) -> ServiceConfig {
        config.password_memory_kib = 64;
        config.password_iterations = 1;
        config.retry_base_delay_ms = 1;
        config.retry_max_delay_ms = 1;
        config
    }

    /// Register `nickname` under uid `id`, with email `{nickname}@example.com`
    /// and password `password-{nickname}`.
    pub fn register(m: &Messenger, id: &str, nickname: &str) -> UserId {
        m.identity()
            .create_user(
                NewUser::new(
                    "Last",
                    "First",
                    nickname,
                    format!("{nickname}@example.com"),
                    format!("password-{nickname}"),
                )
                .with_uid(uid(id)),
            )
            .unwrap()
    }
}
