//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the presentation layer. Field names serialize in camelCase.

use std::collections::BTreeSet;

use parley_shared::{MessageId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account together with its social graph edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: UserId,
    pub last_name: String,
    pub first_name: String,
    /// Display name. Not unique.
    pub nickname: String,
    /// Stored lowercased; unique per account.
    pub email: String,
    /// `hex(salt):hex(argon2id digest)`. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Accepted friends. Symmetric across both records.
    pub friends: BTreeSet<UserId>,
    /// Uids with a pending request addressed to this user.
    pub friend_requests: BTreeSet<UserId>,
}

/// Column values for a freshly registered user.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub uid: UserId,
    pub last_name: String,
    pub first_name: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single direct message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_uid: UserId,
    pub receiver_uid: UserId,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Participants who hid this message from their own view.
    pub deleted_for: BTreeSet<UserId>,
}

impl Message {
    pub fn involves(&self, uid: &UserId) -> bool {
        &self.sender_uid == uid || &self.receiver_uid == uid
    }

    /// A message is visible to `uid` iff they take part in it and have not
    /// soft-deleted it.
    pub fn is_visible_to(&self, uid: &UserId) -> bool {
        self.involves(uid) && !self.deleted_for.contains(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[test]
    fn visibility_follows_participation_and_deletions() {
        let mut msg = Message {
            id: MessageId::new(),
            sender_uid: uid("a"),
            receiver_uid: uid("b"),
            text: "hi".into(),
            timestamp: 1,
            deleted_for: BTreeSet::new(),
        };

        assert!(msg.is_visible_to(&uid("a")));
        assert!(msg.is_visible_to(&uid("b")));
        assert!(!msg.is_visible_to(&uid("c")));

        msg.deleted_for.insert(uid("b"));
        assert!(msg.is_visible_to(&uid("a")));
        assert!(!msg.is_visible_to(&uid("b")));
    }

    #[test]
    fn user_json_uses_record_field_names_and_hides_hash() {
        let user = User {
            uid: uid("u1"),
            last_name: "Ivanova".into(),
            first_name: "Anna".into(),
            nickname: "anna".into(),
            email: "anna@example.com".into(),
            password_hash: "secret".into(),
            friends: BTreeSet::from([uid("u2")]),
            friend_requests: BTreeSet::new(),
        };

        let json = serde_json::to_value(&user).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "uid",
            "lastName",
            "firstName",
            "nickname",
            "email",
            "friends",
            "friendRequests",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("passwordHash"));
        assert_eq!(json["friends"][0], "u2");
    }

    #[test]
    fn message_json_uses_record_field_names() {
        let msg = Message {
            id: MessageId::new(),
            sender_uid: uid("u1"),
            receiver_uid: uid("u2"),
            text: "hello".into(),
            timestamp: 42,
            deleted_for: BTreeSet::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["senderUid"], "u1");
        assert_eq!(json["receiverUid"], "u2");
        assert_eq!(json["timestamp"], 42);
        assert!(json["deletedFor"].as_array().unwrap().is_empty());
    }
}
