//! Paid channels: directory, subscriptions and message streams.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Channel, ChannelMessageView, NewChannel, Session};
use crate::error::{ServiceError, ServiceResult};
use crate::store::SocialStore;

/// Outcome of a channel subscription attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    /// Already subscribed; not an error.
    AlreadySubscribed,
}

/// Channel listing and membership
pub struct ChannelDirectory<S> {
    store: Arc<S>,
    session: Option<Session>,
    channels: Vec<Channel>,
}

impl<S: SocialStore> ChannelDirectory<S> {
    pub fn new(store: Arc<S>, session: Option<Session>) -> Self {
        Self {
            store,
            session,
            channels: Vec::new(),
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Reload the directory, newest first.
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        self.channels = self.store.fetch_channels().await?;
        debug!(count = self.channels.len(), "channel directory refreshed");
        Ok(())
    }

    pub async fn create(&mut self, input: NewChannel) -> ServiceResult<Channel> {
        let session = self
            .session
            .as_ref()
            .ok_or(ServiceError::NotAuthenticated)?;
        if input.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "channel name cannot be empty".to_string(),
            ));
        }
        if input.price < 0.0 {
            return Err(ServiceError::InvalidInput(
                "channel price cannot be negative".to_string(),
            ));
        }

        let channel = self.store.insert_channel(session.user_id, &input).await?;
        info!(channel_id = %channel.id, "channel created");
        self.refresh().await?;
        Ok(channel)
    }

    pub async fn subscribe(&self, channel_id: Uuid) -> ServiceResult<SubscribeOutcome> {
        let session = self
            .session
            .as_ref()
            .ok_or(ServiceError::NotAuthenticated)?;
        match self
            .store
            .insert_channel_subscription(channel_id, session.user_id)
            .await
        {
            Ok(()) => Ok(SubscribeOutcome::Subscribed),
            Err(e) if e.is_conflict() => Ok(SubscribeOutcome::AlreadySubscribed),
            Err(e) => Err(e),
        }
    }
}

/// Message stream of a single channel
pub struct ChannelChat<S> {
    store: Arc<S>,
    session: Option<Session>,
    channel_id: Uuid,
    messages: Vec<ChannelMessageView>,
}

impl<S: SocialStore> ChannelChat<S> {
    pub fn new(store: Arc<S>, session: Option<Session>, channel_id: Uuid) -> Self {
        Self {
            store,
            session,
            channel_id,
            messages: Vec::new(),
        }
    }

    pub fn channel_id(&self) -> Uuid {
        self.channel_id
    }

    /// Messages, creation ascending.
    pub fn messages(&self) -> &[ChannelMessageView] {
        &self.messages
    }

    pub async fn refresh(&mut self) -> ServiceResult<()> {
        self.messages = self.store.fetch_channel_messages(self.channel_id).await?;
        Ok(())
    }

    pub async fn send(&mut self, content: &str) -> ServiceResult<Uuid> {
        let session = self
            .session
            .as_ref()
            .ok_or(ServiceError::NotAuthenticated)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::InvalidInput(
                "message cannot be empty".to_string(),
            ));
        }

        let message = self
            .store
            .insert_channel_message(self.channel_id, session.user_id, content)
            .await?;
        self.refresh().await?;
        Ok(message.id)
    }
}
