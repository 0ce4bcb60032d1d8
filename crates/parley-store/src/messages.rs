use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension};

use parley_shared::{MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "m.id, m.sender_uid, m.receiver_uid, m.text, m.timestamp";

const PAIR_FILTER: &str = "((m.sender_uid = ?1 AND m.receiver_uid = ?2)
                            OR (m.sender_uid = ?2 AND m.receiver_uid = ?1))";

impl Database {
    /// Insert a message and any soft deletions it already carries.
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, sender_uid, receiver_uid, text, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.sender_uid.as_str(),
                message.receiver_uid.as_str(),
                message.text,
                message.timestamp,
            ],
        )?;
        for uid in &message.deleted_for {
            self.add_message_deletion(message.id, uid)?;
        }
        Ok(())
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .optional()?;

        row.map(|m| self.attach_deletions(m)).transpose()
    }

    /// Every message exchanged between `a` and `b`, oldest first. Equal
    /// timestamps keep insertion order.
    pub fn messages_between(&self, a: &UserId, b: &UserId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE {PAIR_FILTER}
                 ORDER BY m.timestamp ASC, m.seq ASC"
            ),
            params![a.as_str(), b.as_str()],
        )
    }

    /// Messages between `viewer` and `peer` that `viewer` has not hidden,
    /// oldest first.
    pub fn visible_messages(&self, viewer: &UserId, peer: &UserId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE {PAIR_FILTER}
                   AND NOT EXISTS (
                       SELECT 1 FROM message_deletions d
                       WHERE d.message_id = m.id AND d.uid = ?1
                   )
                 ORDER BY m.timestamp ASC, m.seq ASC"
            ),
            params![viewer.as_str(), peer.as_str()],
        )
    }

    /// Newest timestamp currently stored for the pair.
    pub fn latest_timestamp_between(&self, a: &UserId, b: &UserId) -> Result<Option<i64>> {
        let latest: Option<i64> = self.conn().query_row(
            &format!("SELECT MAX(m.timestamp) FROM messages m WHERE {PAIR_FILTER}"),
            params![a.as_str(), b.as_str()],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// Record that `uid` hid the message. Returns `false` if it already was.
    pub fn add_message_deletion(&self, id: MessageId, uid: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO message_deletions (message_id, uid) VALUES (?1, ?2)",
            params![id.to_string(), uid.as_str()],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete every message between `a` and `b`. Returns the number removed.
    pub fn delete_messages_between(&self, a: &UserId, b: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            &format!("DELETE FROM messages AS m WHERE {PAIR_FILTER}"),
            params![a.as_str(), b.as_str()],
        )?;
        Ok(affected)
    }

    fn query_messages(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare_cached(sql)?;
        let rows = stmt.query_map(params, row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(self.attach_deletions(row?)?);
        }
        Ok(messages)
    }

    fn attach_deletions(&self, mut message: Message) -> Result<Message> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT uid FROM message_deletions WHERE message_id = ?1")?;
        let rows = stmt.query_map(params![message.id.to_string()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut deleted_for = BTreeSet::new();
        for row in rows {
            let raw = row?;
            deleted_for.insert(UserId::parse(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?);
        }
        message.deleted_for = deleted_for;
        Ok(message)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let sender_str: String = row.get(1)?;
    let receiver_str: String = row.get(2)?;

    let id = MessageId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender_uid = UserId::parse(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let receiver_uid = UserId::parse(&receiver_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Message {
        id,
        sender_uid,
        receiver_uid,
        text: row.get(3)?,
        timestamp: row.get(4)?,
        deleted_for: BTreeSet::new(),
    })
}
