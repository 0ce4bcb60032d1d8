//! Message Store: sending, per-user soft delete, delete for everyone and
//! clearing a whole conversation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use parley_shared::{ConversationKey, MessageId, UserId, ValidationError};
use parley_store::{Database, Message};

use crate::backend::Backend;
use crate::error::{ConflictError, NotFoundError, Result};
use crate::events::ChangeEvent;
use crate::identity::ensure_exists;

#[derive(Clone)]
pub struct MessageStore {
    backend: Arc<Backend>,
}

impl MessageStore {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Send `text` from `sender` to `receiver`.
    ///
    /// The timestamp is the wall clock, raised if needed so it is never
    /// below the newest message already in the conversation.
    pub fn send(&self, sender: &UserId, receiver: &UserId, text: &str) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let max = self.backend.config.max_message_chars;
        let len = text.chars().count();
        if len > max {
            return Err(ValidationError::MessageTooLong { len, max }.into());
        }
        if sender == receiver {
            return Err(ValidationError::SelfReference.into());
        }

        let require_friendship = self.backend.config.require_friendship_to_message;
        let message = self.backend.write("send_message", |db| {
            ensure_exists(db, sender)?;
            ensure_exists(db, receiver)?;
            if require_friendship && !db.are_mutual_friends(sender, receiver)? {
                return Err(ConflictError::NotFriends.into());
            }

            let now = Utc::now().timestamp_millis();
            let timestamp = match db.latest_timestamp_between(sender, receiver)? {
                Some(latest) => now.max(latest),
                None => now,
            };

            let message = Message {
                id: MessageId::new(),
                sender_uid: sender.clone(),
                receiver_uid: receiver.clone(),
                text: text.to_string(),
                timestamp,
                deleted_for: BTreeSet::new(),
            };
            db.insert_message(&message)?;
            Ok(message)
        })?;

        info!(id = %message.id, sender = %sender.short(), receiver = %receiver.short(), "message sent");
        self.backend.publish([ChangeEvent::ConversationChanged(
            ConversationKey::new(sender, receiver),
        )]);
        Ok(message)
    }

    /// Hide a message from `uid`'s own view. The other participant keeps
    /// seeing it. Hiding twice is a no-op.
    pub fn soft_delete_for_user(&self, uid: &UserId, id: MessageId) -> Result<()> {
        let (key, added) = self.backend.write("soft_delete_message", |db| {
            let message = participant_message(db, uid, id)?;
            let added = db.add_message_deletion(id, uid)?;
            Ok((
                ConversationKey::new(&message.sender_uid, &message.receiver_uid),
                added,
            ))
        })?;

        if added {
            info!(id = %id, uid = %uid.short(), "message hidden for user");
            self.backend.publish([ChangeEvent::ConversationChanged(key)]);
        } else {
            debug!(id = %id, uid = %uid.short(), "message already hidden");
        }
        Ok(())
    }

    /// Delete a message for both participants. Either participant may do it.
    pub fn hard_delete(&self, actor: &UserId, id: MessageId) -> Result<()> {
        let key = self.backend.write("hard_delete_message", |db| {
            let message = participant_message(db, actor, id)?;
            db.delete_message(id)?;
            Ok(ConversationKey::new(
                &message.sender_uid,
                &message.receiver_uid,
            ))
        })?;

        info!(id = %id, actor = %actor.short(), "message deleted for everyone");
        self.backend.publish([ChangeEvent::ConversationChanged(key)]);
        Ok(())
    }

    /// Delete every message between the pair, whatever their soft-delete
    /// state. Returns how many were removed.
    pub fn clear_conversation(&self, a: &UserId, b: &UserId) -> Result<usize> {
        if a == b {
            return Err(ValidationError::SelfReference.into());
        }

        let removed = self.backend.write("clear_conversation", |db| {
            ensure_exists(db, a)?;
            ensure_exists(db, b)?;
            Ok(db.delete_messages_between(a, b)?)
        })?;

        info!(user = %a.short(), peer = %b.short(), removed, "conversation cleared");
        self.backend
            .publish([ChangeEvent::ConversationChanged(ConversationKey::new(a, b))]);
        Ok(removed)
    }
}

/// Load a message `uid` takes part in. Outsiders get the same `NotFound` as
/// for a missing message.
fn participant_message(db: &Database, uid: &UserId, id: MessageId) -> Result<Message> {
    match db.get_message(id)? {
        Some(message) if message.involves(uid) => Ok(message),
        _ => Err(NotFoundError::Message(id).into()),
    }
}
