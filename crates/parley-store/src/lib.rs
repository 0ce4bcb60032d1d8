//! # parley-store
//!
//! Embedded document store for Parley, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for users, friendships,
//! friend requests, messages and per-user message deletions. Multi-record
//! updates go through [`Database::transaction`] so they are applied
//! all-or-nothing.

pub mod database;
pub mod friends;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use rusqlite;
