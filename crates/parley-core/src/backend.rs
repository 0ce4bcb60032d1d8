//! Shared state behind every service component.
//!
//! The [`Backend`] owns the store handle, the change feed and the settings.
//! It is wrapped in an `Arc` and cloned into each component, so all of them
//! observe the same records and publish on the same feed.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use parley_store::Database;

use crate::auth::PasswordHasher;
use crate::config::{ServiceConfig, StorageLocation};
use crate::error::{Result, ServiceError};
use crate::events::ChangeEvent;
use crate::retry::RetryPolicy;

pub(crate) struct Backend {
    /// Single writer: every operation holds this lock for its whole
    /// read-modify-write, inside one SQLite transaction for mutations.
    db: Mutex<Database>,
    retry: RetryPolicy,
    feed: broadcast::Sender<ChangeEvent>,
    pub(crate) hasher: PasswordHasher,
    pub(crate) config: ServiceConfig,
}

impl Backend {
    pub(crate) fn open(config: ServiceConfig) -> Result<Self> {
        let database = match &config.storage {
            StorageLocation::Default => Database::new(config.busy_timeout())?,
            StorageLocation::Path(path) => Database::open_at(path, config.busy_timeout())?,
            StorageLocation::InMemory => Database::open_in_memory()?,
        };
        tracing::info!(storage = ?config.storage, "backend ready");
        Self::with_database(database, config)
    }

    pub(crate) fn with_database(database: Database, config: ServiceConfig) -> Result<Self> {
        let (feed, _) = broadcast::channel(config.watch_buffer.max(1));
        Ok(Self {
            db: Mutex::new(database),
            retry: RetryPolicy::from_config(&config),
            feed,
            hasher: PasswordHasher::from_config(&config)?,
            config,
        })
    }

    /// Run a read-only query against one snapshot, retrying transient
    /// failures.
    pub(crate) fn read<T, F>(&self, name: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut(&Database) -> Result<T>,
    {
        self.retry.run(name, || {
            let db = self.lock()?;
            db.read_transaction(|tx| f(tx))
        })
    }

    /// Run `f` as one transaction, retrying transient failures. Nothing `f`
    /// wrote survives an error.
    pub(crate) fn write<T, F>(&self, name: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut(&Database) -> Result<T>,
    {
        self.retry.run(name, || {
            let db = self.lock()?;
            db.transaction(|tx| f(tx))
        })
    }

    /// Notify watchers of committed changes.
    pub(crate) fn publish<I>(&self, events: I)
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        for event in events {
            // Err only means nobody is listening.
            let _ = self.feed.send(event);
        }
    }

    pub(crate) fn watch(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    pub(crate) fn watcher_count(&self) -> usize {
        self.feed.receiver_count()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {e}")))
    }
}
