use serde::Serialize;

use parley_shared::{ConversationKey, UserId};

/// Published on the change feed after a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "subject", rename_all = "camelCase")]
pub enum ChangeEvent {
    /// A user record changed (profile, friends or pending requests).
    UserChanged(UserId),
    /// Messages of a conversation were added, hidden or removed.
    ConversationChanged(ConversationKey),
}

impl ChangeEvent {
    pub fn affects_conversation(&self, key: &ConversationKey) -> bool {
        matches!(self, ChangeEvent::ConversationChanged(k) if k == key)
    }
}
