//! Binds realtime subscriptions to shared controllers.
//!
//! Each spawn helper subscribes to the scope *before* starting its task, so
//! replacing a reconciler (drop the old handle, spawn a new one) never
//! leaves two live subscriptions delivering to the same consumer.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use super::comments::CommentThread;
use super::posts::PostFeed;
use crate::channels::ChannelChat;
use crate::realtime::{RealtimeHub, Scope};
use crate::store::SocialStore;

/// Owns a reconciler task; dropping it cancels the task, which releases the
/// underlying subscription.
pub struct ReconcilerHandle {
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Any change to a post's comments (or their likes) triggers a full refetch
/// of that post's thread.
pub fn spawn_comment_reconciler<S: SocialStore + 'static>(
    thread: Arc<Mutex<CommentThread<S>>>,
    hub: &Arc<RealtimeHub>,
    post_id: Uuid,
) -> ReconcilerHandle {
    let mut sub = hub.subscribe(Scope::Comments(post_id));
    let task = tokio::spawn(async move {
        while let Some(_event) = sub.recv().await {
            let mut thread = thread.lock().await;
            if let Err(e) = thread.refresh().await {
                warn!(error = %e, post_id = %post_id, "comment refetch after change event failed");
            }
        }
    });
    ReconcilerHandle { task }
}

/// Feed changes are patched row-by-row rather than refetching the feed.
pub fn spawn_feed_reconciler<S: SocialStore + 'static>(
    feed: Arc<Mutex<PostFeed<S>>>,
    hub: &Arc<RealtimeHub>,
) -> ReconcilerHandle {
    let mut sub = hub.subscribe(Scope::Feed);
    let task = tokio::spawn(async move {
        while let Some(event) = sub.recv().await {
            let mut feed = feed.lock().await;
            if let Err(e) = feed.apply_change(&event).await {
                warn!(error = %e, "feed patch after change event failed");
            }
        }
    });
    ReconcilerHandle { task }
}

/// New channel messages trigger a message refetch.
pub fn spawn_channel_reconciler<S: SocialStore + 'static>(
    chat: Arc<Mutex<ChannelChat<S>>>,
    hub: &Arc<RealtimeHub>,
    channel_id: Uuid,
) -> ReconcilerHandle {
    let mut sub = hub.subscribe(Scope::ChannelMessages(channel_id));
    let task = tokio::spawn(async move {
        while let Some(_event) = sub.recv().await {
            let mut chat = chat.lock().await;
            if let Err(e) = chat.refresh().await {
                warn!(error = %e, channel_id = %channel_id, "message refetch after change event failed");
            }
        }
    });
    ReconcilerHandle { task }
}
