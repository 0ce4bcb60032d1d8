//! CRUD operations for [`User`] records.

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension};

use parley_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::{NewUserRecord, User};

/// Profile columns of a user row, before the friend edges are attached.
struct UserRow {
    uid: UserId,
    last_name: String,
    first_name: String,
    nickname: String,
    email: String,
    password_hash: String,
}

const USER_COLUMNS: &str = "uid, last_name, first_name, nickname, email, password_hash";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user row. The email must already be normalised.
    pub fn insert_user(&self, user: &NewUserRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (uid, last_name, first_name, nickname, email, password_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.uid.as_str(),
                user.last_name,
                user.first_name,
                user.nickname,
                user.email,
                user.password_hash,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a user with its friends and pending requests.
    pub fn get_user(&self, uid: &UserId) -> Result<Option<User>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1"),
                params![uid.as_str()],
                row_to_user,
            )
            .optional()?;

        row.map(|r| self.attach_edges(r.into_user())).transpose()
    }

    /// Fetch a user by (normalised) email.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?;

        row.map(|r| self.attach_edges(r.into_user())).transpose()
    }

    pub fn user_exists(&self, uid: &UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM users WHERE uid = ?1",
                params![uid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Users whose profile passes `keep`, ordered by nickname then uid, at
    /// most `limit` of them.
    ///
    /// `keep` sees the profile columns only; `friends` and `friend_requests`
    /// are still empty at that point and get loaded for accepted users.
    pub fn find_users<P>(&self, limit: usize, mut keep: P) -> Result<Vec<User>>
    where
        P: FnMut(&User) -> bool,
    {
        let mut stmt = self.conn().prepare_cached(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY nickname ASC, uid ASC"
        ))?;

        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            if users.len() >= limit {
                break;
            }
            let profile = row?.into_user();
            if keep(&profile) {
                users.push(self.attach_edges(profile)?);
            }
        }
        Ok(users)
    }

    /// Fetch several users at once, silently skipping unknown uids.
    pub fn get_users<'a, I>(&self, uids: I) -> Result<Vec<User>>
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let mut users = Vec::new();
        for uid in uids {
            if let Some(user) = self.get_user(uid)? {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn attach_edges(&self, mut user: User) -> Result<User> {
        user.friends = self.friends_of(&user.uid)?;
        user.friend_requests = self.friend_requests_of(&user.uid)?;
        Ok(user)
    }
}

impl UserRow {
    /// Profile only; edges left empty.
    fn into_user(self) -> User {
        User {
            uid: self.uid,
            last_name: self.last_name,
            first_name: self.first_name,
            nickname: self.nickname,
            email: self.email,
            password_hash: self.password_hash,
            friends: BTreeSet::new(),
            friend_requests: BTreeSet::new(),
        }
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    let uid_str: String = row.get(0)?;
    let uid = UserId::parse(&uid_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(UserRow {
        uid,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        nickname: row.get(3)?,
        email: row.get(4)?,
        password_hash: row.get(5)?,
    })
}
