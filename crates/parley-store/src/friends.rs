//! Friendship edges and pending friend requests.
//!
//! A friendship is stored as two directed rows. Callers that create or
//! remove one must do so inside [`Database::transaction`] so both rows move
//! together.

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension};

use parley_shared::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    // ------------------------------------------------------------------
    // Friends
    // ------------------------------------------------------------------

    pub fn friends_of(&self, uid: &UserId) -> Result<BTreeSet<UserId>> {
        self.uid_set(
            "SELECT friend_uid FROM friends WHERE user_uid = ?1",
            uid,
        )
    }

    /// Whether `friend` appears in `user`'s friend list.
    pub fn is_friend(&self, user: &UserId, friend: &UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM friends WHERE user_uid = ?1 AND friend_uid = ?2",
                params![user.as_str(), friend.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether both directed rows exist.
    pub fn are_mutual_friends(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self.is_friend(a, b)? && self.is_friend(b, a)?)
    }

    /// Insert both directions of a friendship.
    pub fn insert_friendship(&self, a: &UserId, b: &UserId) -> Result<()> {
        let mut stmt = self.conn().prepare_cached(
            "INSERT INTO friends (user_uid, friend_uid) VALUES (?1, ?2)",
        )?;
        stmt.execute(params![a.as_str(), b.as_str()])?;
        stmt.execute(params![b.as_str(), a.as_str()])?;
        Ok(())
    }

    /// Delete both directions of a friendship. Returns the number of rows
    /// removed (0, 1 or 2).
    pub fn delete_friendship(&self, a: &UserId, b: &UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM friends
             WHERE (user_uid = ?1 AND friend_uid = ?2)
                OR (user_uid = ?2 AND friend_uid = ?1)",
            params![a.as_str(), b.as_str()],
        )?;
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Friend requests
    // ------------------------------------------------------------------

    /// Uids that have a pending request addressed to `target`.
    pub fn friend_requests_of(&self, target: &UserId) -> Result<BTreeSet<UserId>> {
        self.uid_set(
            "SELECT requester_uid FROM friend_requests WHERE target_uid = ?1",
            target,
        )
    }

    pub fn has_friend_request(&self, target: &UserId, requester: &UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM friend_requests WHERE target_uid = ?1 AND requester_uid = ?2",
                params![target.as_str(), requester.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert_friend_request(&self, target: &UserId, requester: &UserId) -> Result<()> {
        self.conn().execute(
            "INSERT INTO friend_requests (target_uid, requester_uid) VALUES (?1, ?2)",
            params![target.as_str(), requester.as_str()],
        )?;
        Ok(())
    }

    /// Returns `true` if a request was removed.
    pub fn delete_friend_request(&self, target: &UserId, requester: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM friend_requests WHERE target_uid = ?1 AND requester_uid = ?2",
            params![target.as_str(), requester.as_str()],
        )?;
        Ok(affected > 0)
    }

    fn uid_set(&self, sql: &str, uid: &UserId) -> Result<BTreeSet<UserId>> {
        let mut stmt = self.conn().prepare_cached(sql)?;
        let rows = stmt.query_map(params![uid.as_str()], |row| row.get::<_, String>(0))?;

        let mut set = BTreeSet::new();
        for row in rows {
            let raw = row?;
            let parsed = UserId::parse(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
            set.insert(parsed);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUserRecord;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn db_with_users(ids: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for id in ids {
            db.insert_user(&NewUserRecord {
                uid: uid(id),
                last_name: String::new(),
                first_name: String::new(),
                nickname: id.to_string(),
                email: format!("{id}@example.com"),
                password_hash: "00:00".into(),
            })
            .unwrap();
        }
        db
    }

    #[test]
    fn friendship_rows_are_symmetric() {
        let db = db_with_users(&["a", "b"]);
        db.insert_friendship(&uid("a"), &uid("b")).unwrap();

        assert!(db.are_mutual_friends(&uid("a"), &uid("b")).unwrap());
        assert_eq!(db.friends_of(&uid("a")).unwrap(), BTreeSet::from([uid("b")]));
        assert_eq!(db.friends_of(&uid("b")).unwrap(), BTreeSet::from([uid("a")]));

        assert_eq!(db.delete_friendship(&uid("b"), &uid("a")).unwrap(), 2);
        assert!(!db.is_friend(&uid("a"), &uid("b")).unwrap());
        assert!(!db.is_friend(&uid("b"), &uid("a")).unwrap());
        assert_eq!(db.delete_friendship(&uid("a"), &uid("b")).unwrap(), 0);
    }

    #[test]
    fn self_friendship_is_rejected_by_schema() {
        let db = db_with_users(&["a"]);
        assert!(db.insert_friendship(&uid("a"), &uid("a")).is_err());
    }

    #[test]
    fn friend_requests_are_directed() {
        let db = db_with_users(&["a", "b"]);
        db.insert_friend_request(&uid("b"), &uid("a")).unwrap();

        assert!(db.has_friend_request(&uid("b"), &uid("a")).unwrap());
        assert!(!db.has_friend_request(&uid("a"), &uid("b")).unwrap());
        assert_eq!(
            db.friend_requests_of(&uid("b")).unwrap(),
            BTreeSet::from([uid("a")])
        );

        // the primary key keeps a single pending row per ordered pair
        assert!(db.insert_friend_request(&uid("b"), &uid("a")).is_err());

        assert!(db.delete_friend_request(&uid("b"), &uid("a")).unwrap());
        assert!(!db.delete_friend_request(&uid("b"), &uid("a")).unwrap());
    }

    #[test]
    fn edges_are_attached_to_user_records() {
        let db = db_with_users(&["a", "b", "c"]);
        db.insert_friendship(&uid("a"), &uid("b")).unwrap();
        db.insert_friend_request(&uid("a"), &uid("c")).unwrap();

        let a = db.get_user(&uid("a")).unwrap().unwrap();
        assert_eq!(a.friends, BTreeSet::from([uid("b")]));
        assert_eq!(a.friend_requests, BTreeSet::from([uid("c")]));
    }
}
