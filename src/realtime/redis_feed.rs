//! Redis pub/sub bridge for the change feed.
//!
//! The hosted backend publishes row-level change events to scope-named Redis
//! channels; `ChangeFeedListener` forwards them into the in-process
//! [`RealtimeHub`](super::RealtimeHub). `ChangeFeedPublisher` is the write
//! side, for deployments where this process also owns the mutations.

use std::sync::Arc;

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ChangeEvent, RealtimeHub};
use crate::error::ServiceResult;

/// Prefix shared by all change-feed channels; the listener pattern-subscribes
/// below it.
const CHANNEL_PREFIX: &str = "realtime:";

/// Publishes change events onto the Redis feed
#[derive(Clone)]
pub struct ChangeFeedPublisher {
    conn: ConnectionManager,
}

impl ChangeFeedPublisher {
    pub async fn new(redis_url: &str) -> ServiceResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Publish one event to its scope-named channel.
    /// Returns the number of remote subscribers that received it.
    pub async fn publish(&self, event: &ChangeEvent) -> ServiceResult<usize> {
        let Some(scope) = event.scope() else {
            return Ok(0);
        };
        let channel = format!("{}{}", CHANNEL_PREFIX, scope.channel_name());
        let payload = serde_json::to_string(event)?;

        debug!(
            channel = %channel,
            table = ?event.table,
            op = ?event.op,
            "publishing change event"
        );

        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(&channel, payload).await?;
        Ok(receivers)
    }
}

/// Subscribes to the Redis feed and forwards events into a hub
pub struct ChangeFeedListener {
    client: Client,
}

impl ChangeFeedListener {
    pub fn new(redis_url: &str) -> ServiceResult<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Start the background forwarding task.
    ///
    /// A failure here degrades to fetch-only operation; callers log it and
    /// keep serving from the request/response path.
    pub async fn spawn(&self, hub: Arc<RealtimeHub>) -> ServiceResult<JoinHandle<()>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(format!("{}*", CHANNEL_PREFIX)).await?;

        info!(pattern = %format!("{}*", CHANNEL_PREFIX), "subscribed to change feed");

        let handle = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "unreadable change feed payload");
                        continue;
                    }
                };
                match serde_json::from_str::<ChangeEvent>(&payload) {
                    Ok(event) => {
                        let delivered = hub.publish(&event);
                        debug!(
                            table = ?event.table,
                            op = ?event.op,
                            delivered,
                            "forwarded change event"
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, payload = %payload, "malformed change event");
                    }
                }
            }
            info!("change feed stream ended");
        });

        Ok(handle)
    }
}
