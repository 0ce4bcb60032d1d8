//! v001 -- Initial schema creation.
//!
//! Creates the user record tables (`users`, `friends`, `friend_requests`)
//! and the message tables (`messages`, `message_deletions`).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    uid           TEXT PRIMARY KEY NOT NULL,
    last_name     TEXT NOT NULL,
    first_name    TEXT NOT NULL,
    nickname      TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,       -- lowercased before insert
    password_hash TEXT NOT NULL               -- hex(salt):hex(argon2id)
);

-- ----------------------------------------------------------------
-- Friendships: one row per direction, both written together
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friends (
    user_uid   TEXT NOT NULL,
    friend_uid TEXT NOT NULL,

    PRIMARY KEY (user_uid, friend_uid),
    CHECK (user_uid <> friend_uid),
    FOREIGN KEY (user_uid)   REFERENCES users(uid),
    FOREIGN KEY (friend_uid) REFERENCES users(uid)
);

-- ----------------------------------------------------------------
-- Pending incoming friend requests
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    target_uid    TEXT NOT NULL,
    requester_uid TEXT NOT NULL,

    PRIMARY KEY (target_uid, requester_uid),
    CHECK (target_uid <> requester_uid),
    FOREIGN KEY (target_uid)    REFERENCES users(uid),
    FOREIGN KEY (requester_uid) REFERENCES users(uid)
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion order
    id           TEXT NOT NULL UNIQUE,               -- UUID v4
    sender_uid   TEXT NOT NULL,
    receiver_uid TEXT NOT NULL,
    text         TEXT NOT NULL,
    timestamp    INTEGER NOT NULL,                   -- ms since epoch

    CHECK (sender_uid <> receiver_uid),
    FOREIGN KEY (sender_uid)   REFERENCES users(uid),
    FOREIGN KEY (receiver_uid) REFERENCES users(uid)
);

CREATE INDEX IF NOT EXISTS idx_messages_pair_ts
    ON messages(sender_uid, receiver_uid, timestamp);

-- ----------------------------------------------------------------
-- Per-user soft deletions
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS message_deletions (
    message_id TEXT NOT NULL,
    uid        TEXT NOT NULL,

    PRIMARY KEY (message_id, uid),
    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
