//! Realtime change notification plumbing.
//!
//! The hosted backend emits a row-level change stream; this module fans it
//! out to in-process subscribers keyed by *scope* (one post's comments, the
//! global feed, one channel's messages). Scope names are derived from the
//! resource identity and nothing else, so re-subscribing for the same scope
//! always lands on the same logical channel.

pub mod redis_feed;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Buffered events per scope before slow subscribers start lagging.
/// A lagged subscriber refetches anyway, so losing intermediate events is
/// harmless.
const SCOPE_BUFFER: usize = 64;

/// Kind of row change observed on the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Table the change occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Posts,
    Comments,
    CommentLikes,
    ChannelMessages,
}

/// A single row-level change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    /// Primary identifier of the changed row's entity (post id, comment id,
    /// message id).
    pub id: Uuid,
    /// Owning post, for comment-scoped tables.
    pub post_id: Option<Uuid>,
    /// Owning channel, for message-scoped tables.
    pub channel_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, op: ChangeOp, id: Uuid) -> Self {
        Self {
            table,
            op,
            id,
            post_id: None,
            channel_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_post(table: Table, op: ChangeOp, id: Uuid, post_id: Uuid) -> Self {
        Self {
            post_id: Some(post_id),
            ..Self::new(table, op, id)
        }
    }

    pub fn for_channel(op: ChangeOp, id: Uuid, channel_id: Uuid) -> Self {
        Self {
            channel_id: Some(channel_id),
            ..Self::new(Table::ChannelMessages, op, id)
        }
    }

    /// The scope this event is delivered to, if any.
    pub fn scope(&self) -> Option<Scope> {
        match self.table {
            Table::Posts => Some(Scope::Feed),
            Table::Comments | Table::CommentLikes => self.post_id.map(Scope::Comments),
            Table::ChannelMessages => self.channel_id.map(Scope::ChannelMessages),
        }
    }
}

/// Filter key bounding a realtime subscription to a relevant subset of a
/// table. Channel names are stable per logical scope - never time-random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The global posts feed
    Feed,
    /// Comments (and comment likes) of a single post
    Comments(Uuid),
    /// Messages of a single channel
    ChannelMessages(Uuid),
}

impl Scope {
    pub fn channel_name(&self) -> String {
        match self {
            Scope::Feed => "posts:feed".to_string(),
            Scope::Comments(post_id) => format!("comments:{}", post_id),
            Scope::ChannelMessages(channel_id) => format!("channel:{}:messages", channel_id),
        }
    }
}

/// In-process fan-out of change events, keyed by scope name.
#[derive(Default)]
pub struct RealtimeHub {
    scopes: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
}

impl RealtimeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to a scope. The returned guard detaches synchronously on
    /// drop, so tearing down before establishing a replacement never leaves
    /// two live subscriptions for the same consumer.
    pub fn subscribe(self: &Arc<Self>, scope: Scope) -> Subscription {
        let name = scope.channel_name();
        let rx = {
            let mut scopes = self.scopes.lock().expect("realtime hub lock poisoned");
            scopes
                .entry(name.clone())
                .or_insert_with(|| broadcast::channel(SCOPE_BUFFER).0)
                .subscribe()
        };
        debug!(scope = %name, "realtime subscription established");
        Subscription {
            name,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver an event to its scope. Events without subscribers (or without
    /// a resolvable scope) are dropped.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let Some(scope) = event.scope() else {
            return 0;
        };
        let name = scope.channel_name();
        let scopes = self.scopes.lock().expect("realtime hub lock poisoned");
        match scopes.get(&name) {
            Some(tx) => tx.send(event.clone()).unwrap_or(0),
            None => 0,
        }
    }

    fn release(&self, name: &str) {
        let mut scopes = self.scopes.lock().expect("realtime hub lock poisoned");
        if let Some(tx) = scopes.get(name) {
            if tx.receiver_count() == 0 {
                scopes.remove(name);
                debug!(scope = %name, "realtime scope released");
            }
        }
    }

    #[cfg(test)]
    fn scope_count(&self) -> usize {
        self.scopes.lock().unwrap().len()
    }
}

/// Live subscription to one scope. Dropping it releases the scope's channel
/// once the last subscriber is gone.
pub struct Subscription {
    name: String,
    rx: broadcast::Receiver<ChangeEvent>,
    hub: Weak<RealtimeHub>,
}

impl Subscription {
    /// Next event for this scope; `None` once the hub is gone. Lagged
    /// deliveries are skipped - consumers refetch on any event, so a gap
    /// collapses into the next received event.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(scope = %self.name, skipped, "subscriber lagged, continuing");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn scope_name(&self) -> &str {
        &self.name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Receiver must detach before the hub prunes the scope entry.
        self.rx = {
            let (tx, rx) = broadcast::channel(1);
            drop(tx);
            rx
        };
        if let Some(hub) = self.hub.upgrade() {
            hub.release(&self.name);
        }
    }
}
