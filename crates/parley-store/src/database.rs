//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/parley/parley.db`
    /// - macOS:   `~/Library/Application Support/com.parley.parley/parley.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\parley\parley\data\parley.db`
    pub fn new(busy_timeout: Duration) -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", "parley", "parley").ok_or(StoreError::NoDataDir)?;

        let data_dir = project_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("parley.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path, busy_timeout)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::prepare(conn, busy_timeout)
    }

    /// Open a private in-memory database. Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn, Duration::ZERO)
    }

    fn prepare(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(busy_timeout)?;

        migrations::run_migrations(&conn)?;

        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so a read-modify-write inside `f`
    /// cannot interleave with another writer. The transaction commits only
    /// when `f` returns `Ok`; any error rolls back every statement `f` ran.
    /// The typed helpers on `Database` may be called freely from `f`.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let value = f(self)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Run read-only `f` inside a `DEFERRED` transaction.
    ///
    /// Every statement in `f` reads the same snapshot, so a record made of
    /// several rows is never observed half-updated by another connection's
    /// commit.
    pub fn read_transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Self) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)
            .map_err(StoreError::from)?;
        let value = f(self)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUserRecord;
    use parley_shared::UserId;

    fn record(uid: &str, email: &str) -> NewUserRecord {
        NewUserRecord {
            uid: UserId::parse(uid).unwrap(),
            last_name: "Last".into(),
            first_name: "First".into(),
            nickname: uid.into(),
            email: email.into(),
            password_hash: "00:00".into(),
        }
    }

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let db = Database::open_at(&path, Duration::from_millis(50)).expect("should open");
            assert!(db.path().is_some());
            db.insert_user(&record("u1", "a@example.com")).unwrap();
        }

        let db = Database::open_at(&path, Duration::from_millis(50)).expect("should reopen");
        let uid = UserId::parse("u1").unwrap();
        assert!(db.get_user(&uid).unwrap().is_some());
    }

    #[test]
    fn in_memory_has_no_path() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let db = Database::open_in_memory().unwrap();

        let result: std::result::Result<(), StoreError> = db.transaction(|db| {
            db.insert_user(&record("u1", "a@example.com"))?;
            db.insert_user(&record("u2", "b@example.com"))?;
            Err(StoreError::Corrupt("abort".into()))
        });
        assert!(result.is_err());

        assert!(db.get_user(&UserId::parse("u1").unwrap()).unwrap().is_none());
        assert!(db.get_user(&UserId::parse("u2").unwrap()).unwrap().is_none());
    }

    #[test]
    fn committed_transaction_is_visible() {
        let db = Database::open_in_memory().unwrap();

        db.transaction(|db| -> Result<()> {
            db.insert_user(&record("u1", "a@example.com"))?;
            db.insert_user(&record("u2", "b@example.com"))
        })
        .unwrap();

        assert!(db.user_exists(&UserId::parse("u1").unwrap()).unwrap());
        assert!(db.user_exists(&UserId::parse("u2").unwrap()).unwrap());
    }

    #[test]
    fn read_transaction_sees_one_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");

        let reader = Database::open_at(&path, Duration::from_millis(50)).unwrap();
        let writer = Database::open_at(&path, Duration::from_millis(50)).unwrap();
        writer.insert_user(&record("u1", "a@example.com")).unwrap();

        let (before, after) = reader
            .read_transaction(|db| -> Result<(bool, bool)> {
                let before = db.user_exists(&UserId::parse("u1").unwrap())?;
                writer.insert_user(&record("u2", "b@example.com"))?;
                let after = db.user_exists(&UserId::parse("u2").unwrap())?;
                Ok((before, after))
            })
            .unwrap();
        assert!(before);
        assert!(!after, "commit leaked into an open read snapshot");

        assert!(reader.user_exists(&UserId::parse("u2").unwrap()).unwrap());
    }

    #[test]
    fn concurrent_writer_sees_busy_as_transient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.db");

        let first = Database::open_at(&path, Duration::ZERO).unwrap();
        let second = Database::open_at(&path, Duration::ZERO).unwrap();

        let _held = Transaction::new_unchecked(first.conn(), TransactionBehavior::Immediate)
            .unwrap();

        let err = second
            .transaction(|db| db.insert_user(&record("u1", "a@example.com")))
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
