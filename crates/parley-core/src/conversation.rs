//! Conversation Service: what one participant currently sees of a
//! conversation, and live updates of that view.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use parley_shared::{ConversationKey, UserId, ValidationError};
use parley_store::Message;

use crate::backend::Backend;
use crate::error::{Result, ServiceError};
use crate::events::ChangeEvent;
use crate::identity::ensure_exists;

#[derive(Clone)]
pub struct ConversationService {
    backend: Arc<Backend>,
}

impl ConversationService {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Messages between `viewer` and `peer` that `viewer` has not hidden,
    /// oldest first.
    pub fn list_visible(&self, viewer: &UserId, peer: &UserId) -> Result<Vec<Message>> {
        if viewer == peer {
            return Err(ValidationError::SelfReference.into());
        }
        snapshot(&self.backend, viewer, peer)
    }

    /// Watch the conversation from `viewer`'s side.
    ///
    /// The first item is the current view. A fresh full view follows every
    /// committed change to the pair. A watcher that falls behind the feed
    /// skips straight to the latest view.
    pub fn subscribe(&self, viewer: &UserId, peer: &UserId) -> Result<ConversationWatch> {
        if viewer == peer {
            return Err(ValidationError::SelfReference.into());
        }

        // Subscribe before reading so no change slips in between.
        let rx = self.backend.watch();
        let initial = snapshot(&self.backend, viewer, peer)?;

        let key = ConversationKey::new(viewer, peer);
        let state = WatchState {
            backend: Arc::downgrade(&self.backend),
            rx,
            viewer: viewer.clone(),
            peer: peer.clone(),
            key: key.clone(),
            initial: Some(initial),
        };

        debug!(viewer = %viewer.short(), peer = %peer.short(), "watch opened");
        Ok(ConversationWatch {
            inner: stream::unfold(state, next_view).boxed(),
            viewer: viewer.clone(),
            key,
        })
    }

    /// Number of live subscriptions.
    pub fn active_watches(&self) -> usize {
        self.backend.watcher_count()
    }
}

/// Stream of conversation views returned by [`ConversationService::subscribe`].
///
/// Must be polled inside a Tokio runtime: follow-up views are read on the
/// blocking pool. Ends when the service is dropped. Dropping the watch
/// unsubscribes it.
pub struct ConversationWatch {
    inner: BoxStream<'static, Result<Vec<Message>>>,
    viewer: UserId,
    key: ConversationKey,
}

impl Stream for ConversationWatch {
    type Item = Result<Vec<Message>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for ConversationWatch {
    fn drop(&mut self) {
        debug!(viewer = %self.viewer.short(), conversation = %self.key, "watch closed");
    }
}

struct WatchState {
    /// Weak so an open watch does not keep the service alive.
    backend: Weak<Backend>,
    rx: broadcast::Receiver<ChangeEvent>,
    viewer: UserId,
    peer: UserId,
    key: ConversationKey,
    initial: Option<Vec<Message>>,
}

async fn next_view(mut state: WatchState) -> Option<(Result<Vec<Message>>, WatchState)> {
    if let Some(view) = state.initial.take() {
        return Some((Ok(view), state));
    }

    loop {
        match state.rx.recv().await {
            Ok(event) if event.affects_conversation(&state.key) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                debug!(conversation = %state.key, skipped, "watch lagged, resyncing");
                break;
            }
            Err(RecvError::Closed) => return None,
        }
    }

    let backend = state.backend.upgrade()?;
    let (viewer, peer) = (state.viewer.clone(), state.peer.clone());
    // The store lock and retry backoff block, so keep them off the executor.
    let view = tokio::task::spawn_blocking(move || snapshot(&backend, &viewer, &peer))
        .await
        .unwrap_or_else(|e| Err(ServiceError::Internal(format!("snapshot task failed: {e}"))));
    Some((view, state))
}

fn snapshot(backend: &Backend, viewer: &UserId, peer: &UserId) -> Result<Vec<Message>> {
    backend.read("list_visible", |db| {
        ensure_exists(db, viewer)?;
        ensure_exists(db, peer)?;
        Ok(db.visible_messages(viewer, peer)?)
    })
}
