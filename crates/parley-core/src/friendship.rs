//! Friendship Manager: the friend-request state machine.
//!
//! Per ordered pair (requester, target):
//!
//! ```text
//! None --send--> Requested --accept--> Friends --remove--> None
//!                    |
//!                    +------decline--> None
//! ```
//!
//! Every transition runs as one store transaction, so both user records
//! change together or not at all.

use std::sync::Arc;

use tracing::info;

use parley_shared::{UserId, ValidationError};

use crate::backend::Backend;
use crate::error::{ConflictError, Result};
use crate::events::ChangeEvent;
use crate::identity::ensure_exists;

#[derive(Clone)]
pub struct FriendshipManager {
    backend: Arc<Backend>,
}

impl FriendshipManager {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Add `requester` to `target`'s pending requests.
    pub fn send_friend_request(&self, requester: &UserId, target: &UserId) -> Result<()> {
        if requester == target {
            return Err(ValidationError::SelfReference.into());
        }

        self.backend.write("send_friend_request", |db| {
            ensure_exists(db, requester)?;
            ensure_exists(db, target)?;
            if db.is_friend(target, requester)? {
                return Err(ConflictError::AlreadyFriends.into());
            }
            if db.has_friend_request(target, requester)? {
                return Err(ConflictError::RequestAlreadyPending.into());
            }
            db.insert_friend_request(target, requester)?;
            Ok(())
        })?;

        info!(requester = %requester, target = %target, "friend request sent");
        self.backend
            .publish([ChangeEvent::UserChanged(target.clone())]);
        Ok(())
    }

    /// `target` accepts the request `requester` sent them.
    ///
    /// A reverse request (target → requester) is cleared as well, since the
    /// pair is now friends.
    pub fn accept_friend_request(&self, target: &UserId, requester: &UserId) -> Result<()> {
        if requester == target {
            return Err(ValidationError::SelfReference.into());
        }

        self.backend.write("accept_friend_request", |db| {
            ensure_exists(db, target)?;
            ensure_exists(db, requester)?;
            if !db.delete_friend_request(target, requester)? {
                return Err(ConflictError::NoPendingRequest.into());
            }
            db.delete_friend_request(requester, target)?;
            if db.is_friend(target, requester)? || db.is_friend(requester, target)? {
                return Err(ConflictError::AlreadyFriends.into());
            }
            db.insert_friendship(target, requester)?;
            Ok(())
        })?;

        info!(target = %target, requester = %requester, "friend request accepted");
        self.backend.publish([
            ChangeEvent::UserChanged(target.clone()),
            ChangeEvent::UserChanged(requester.clone()),
        ]);
        Ok(())
    }

    /// `target` turns down the request `requester` sent them.
    pub fn decline_friend_request(&self, target: &UserId, requester: &UserId) -> Result<()> {
        if requester == target {
            return Err(ValidationError::SelfReference.into());
        }

        self.backend.write("decline_friend_request", |db| {
            ensure_exists(db, target)?;
            if !db.delete_friend_request(target, requester)? {
                return Err(ConflictError::NoPendingRequest.into());
            }
            Ok(())
        })?;

        info!(target = %target, requester = %requester, "friend request declined");
        self.backend
            .publish([ChangeEvent::UserChanged(target.clone())]);
        Ok(())
    }

    /// End a mutual friendship from either side.
    pub fn remove_friend(&self, a: &UserId, b: &UserId) -> Result<()> {
        if a == b {
            return Err(ValidationError::SelfReference.into());
        }

        self.backend.write("remove_friend", |db| {
            ensure_exists(db, a)?;
            ensure_exists(db, b)?;
            if !db.are_mutual_friends(a, b)? {
                return Err(ConflictError::NotFriends.into());
            }
            db.delete_friendship(a, b)?;
            Ok(())
        })?;

        info!(user = %a, friend = %b, "friendship removed");
        self.backend.publish([
            ChangeEvent::UserChanged(a.clone()),
            ChangeEvent::UserChanged(b.clone()),
        ]);
        Ok(())
    }

    pub fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool> {
        self.backend
            .read("are_friends", |db| Ok(db.are_mutual_friends(a, b)?))
    }
}
