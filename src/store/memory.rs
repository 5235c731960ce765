//! In-memory store double.
//!
//! Mirrors the conflict and idempotency contracts of [`PgStore`]
//! (duplicate like -> `Conflict`, `ON CONFLICT DO NOTHING` toggles ->
//! `Ok(false)`) and, when wired to a [`RealtimeHub`], emits the change
//! events the hosted backend's change stream would - which is what lets
//! tests exercise the reconciler, including the echo of a client's own
//! write.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::SocialStore;
use crate::domain::{
    Author, Channel, ChannelMessage, ChannelMessageView, Comment, CommentView, NewChannel,
    NewPost, Post, PostView, Profile, ShareKind,
};
use crate::error::{ServiceError, ServiceResult};
use crate::realtime::{ChangeEvent, ChangeOp, RealtimeHub, Table};

/// Operations a test can make fail exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOp {
    InsertPost,
    InsertComment,
    InsertPostLike,
}

#[derive(Default)]
struct State {
    profiles: HashMap<Uuid, Profile>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    post_likes: HashSet<(Uuid, Uuid)>,
    comment_likes: HashSet<(Uuid, Uuid)>,
    follows: HashSet<(Uuid, Uuid)>,
    blocks: HashSet<(Uuid, Uuid)>,
    saved: HashSet<(Uuid, Uuid)>,
    hidden: HashSet<(Uuid, Uuid)>,
    reports: HashSet<(Uuid, Uuid)>,
    shares: Vec<(Uuid, Uuid, ShareKind)>,
    channels: Vec<Channel>,
    channel_subscriptions: HashSet<(Uuid, Uuid)>,
    channel_messages: Vec<ChannelMessage>,
    fail_next: HashSet<FailOp>,
    seq: i64,
}

pub struct MemoryStore {
    state: Mutex<State>,
    epoch: DateTime<Utc>,
    hub: Option<Arc<RealtimeHub>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            epoch: Utc::now(),
            hub: None,
        }
    }

    /// Emit change events into `hub` after every committed write.
    pub fn with_hub(hub: Arc<RealtimeHub>) -> Self {
        Self {
            hub: Some(hub),
            ..Self::new()
        }
    }

    pub fn upsert_profile(&self, profile: Profile) {
        let mut state = self.lock();
        state.profiles.insert(profile.id, profile);
    }

    /// Make the next occurrence of `op` fail with a remote error.
    pub fn fail_next(&self, op: FailOp) {
        self.lock().fail_next.insert(op);
    }

    pub fn post_like_count(&self, post_id: Uuid) -> usize {
        self.lock()
            .post_likes
            .iter()
            .filter(|(p, _)| *p == post_id)
            .count()
    }

    pub fn comment_like_count(&self, comment_id: Uuid) -> usize {
        self.lock()
            .comment_likes
            .iter()
            .filter(|(c, _)| *c == comment_id)
            .count()
    }

    pub fn share_count(&self, post_id: Uuid) -> usize {
        self.lock().shares.iter().filter(|(p, _, _)| *p == post_id).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }

    /// Strictly increasing timestamps so creation order is total even when
    /// many rows land within one clock tick.
    fn next_timestamp(state: &mut State, epoch: DateTime<Utc>) -> DateTime<Utc> {
        state.seq += 1;
        epoch + Duration::milliseconds(state.seq)
    }

    fn take_failure(state: &mut State, op: FailOp) -> ServiceResult<()> {
        if state.fail_next.remove(&op) {
            return Err(ServiceError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }

    fn emit(&self, event: ChangeEvent) {
        if let Some(hub) = &self.hub {
            hub.publish(&event);
        }
    }

    fn view_of(state: &State, post: &Post, viewer: Option<Uuid>) -> PostView {
        PostView {
            post: post.clone(),
            author: state.profiles.get(&post.user_id).map(Author::from),
            is_liked: viewer
                .map(|v| state.post_likes.contains(&(post.id, v)))
                .unwrap_or(false),
        }
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    async fn fetch_posts_page(
        &self,
        page: usize,
        page_size: usize,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<PostView>> {
        let state = self.lock();
        let mut posts: Vec<&Post> = state.posts.iter().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .map(|post| Self::view_of(&state, post, viewer))
            .collect())
    }

    async fn fetch_post(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Option<PostView>> {
        let state = self.lock();
        Ok(state
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .map(|post| Self::view_of(&state, post, viewer)))
    }

    async fn insert_post(&self, author_id: Uuid, input: &NewPost) -> ServiceResult<Post> {
        let post = {
            let mut state = self.lock();
            Self::take_failure(&mut state, FailOp::InsertPost)?;
            let created_at = Self::next_timestamp(&mut state, self.epoch);
            let post = Post {
                id: Uuid::new_v4(),
                user_id: author_id,
                content: input.analysis.trim().to_string(),
                sport: input.sport.clone(),
                match_teams: input.match_teams.clone(),
                prediction_text: input.prediction_text.clone(),
                analysis: Some(input.analysis.trim().to_string()),
                odds: input.odds,
                confidence: input.confidence,
                image_url: input.image_url.clone(),
                video_url: input.video_url.clone(),
                likes: 0,
                comments: 0,
                shares: 0,
                created_at,
            };
            state.posts.push(post.clone());
            post
        };
        self.emit(ChangeEvent::new(Table::Posts, ChangeOp::Insert, post.id));
        Ok(post)
    }

    async fn fetch_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<CommentView>> {
        let state = self.lock();
        let mut comments: Vec<&Comment> = state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments
            .into_iter()
            .map(|comment| CommentView {
                comment: comment.clone(),
                author: state.profiles.get(&comment.user_id).map(Author::from),
                is_liked: viewer
                    .map(|v| state.comment_likes.contains(&(comment.id, v)))
                    .unwrap_or(false),
                replies: Vec::new(),
            })
            .collect())
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Comment> {
        let comment = {
            let mut state = self.lock();
            Self::take_failure(&mut state, FailOp::InsertComment)?;
            let created_at = Self::next_timestamp(&mut state, self.epoch);
            let comment = Comment {
                id: Uuid::new_v4(),
                post_id,
                user_id: author_id,
                content: content.to_string(),
                parent_id,
                likes: 0,
                created_at,
            };
            state.comments.push(comment.clone());
            if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                post.comments += 1;
            }
            comment
        };
        self.emit(ChangeEvent::for_post(
            Table::Comments,
            ChangeOp::Insert,
            comment.id,
            post_id,
        ));
        self.emit(ChangeEvent::new(Table::Posts, ChangeOp::Update, post_id));
        Ok(comment)
    }

    async fn insert_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        {
            let mut state = self.lock();
            Self::take_failure(&mut state, FailOp::InsertPostLike)?;
            if !state.post_likes.insert((post_id, user_id)) {
                return Err(ServiceError::Conflict(
                    "duplicate key value violates unique constraint \"post_likes_pkey\""
                        .to_string(),
                ));
            }
            if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                post.likes += 1;
            }
        }
        self.emit(ChangeEvent::new(Table::Posts, ChangeOp::Update, post_id));
        Ok(())
    }

    async fn delete_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let removed = {
            let mut state = self.lock();
            let removed = state.post_likes.remove(&(post_id, user_id));
            if removed {
                if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                    post.likes = (post.likes - 1).max(0);
                }
            }
            removed
        };
        if removed {
            self.emit(ChangeEvent::new(Table::Posts, ChangeOp::Update, post_id));
        }
        Ok(removed)
    }

    async fn post_like_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().post_likes.contains(&(post_id, user_id)))
    }

    async fn insert_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        let post_id = {
            let mut state = self.lock();
            if !state.comment_likes.insert((comment_id, user_id)) {
                return Err(ServiceError::Conflict(
                    "duplicate key value violates unique constraint \"comment_likes_pkey\""
                        .to_string(),
                ));
            }
            let post_id = match state.comments.iter_mut().find(|c| c.id == comment_id) {
                Some(comment) => {
                    comment.likes += 1;
                    Some(comment.post_id)
                }
                None => None,
            };
            post_id
        };
        if let Some(post_id) = post_id {
            self.emit(ChangeEvent::for_post(
                Table::CommentLikes,
                ChangeOp::Insert,
                comment_id,
                post_id,
            ));
        }
        Ok(())
    }

    async fn delete_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let (removed, post_id) = {
            let mut state = self.lock();
            let removed = state.comment_likes.remove(&(comment_id, user_id));
            let post_id = if removed {
                match state.comments.iter_mut().find(|c| c.id == comment_id) {
                    Some(comment) => {
                        comment.likes = (comment.likes - 1).max(0);
                        Some(comment.post_id)
                    }
                    None => None,
                }
            } else {
                None
            };
            (removed, post_id)
        };
        if let Some(post_id) = post_id {
            self.emit(ChangeEvent::for_post(
                Table::CommentLikes,
                ChangeOp::Delete,
                comment_id,
                post_id,
            ));
        }
        Ok(removed)
    }

    async fn comment_like_exists(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().comment_likes.contains(&(comment_id, user_id)))
    }

    async fn profile_by_username(&self, username: &str) -> ServiceResult<Option<Profile>> {
        Ok(self
            .lock()
            .profiles
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn fetch_profiles(&self, ids: &[Uuid]) -> ServiceResult<Vec<Profile>> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.profiles.get(id).cloned())
            .collect())
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().follows.insert((follower_id, following_id)))
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().follows.remove(&(follower_id, following_id)))
    }

    async fn follow_exists(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().follows.contains(&(follower_id, following_id)))
    }

    async fn insert_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().blocks.insert((blocker_id, blocked_id)))
    }

    async fn delete_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().blocks.remove(&(blocker_id, blocked_id)))
    }

    async fn block_exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().blocks.contains(&(blocker_id, blocked_id)))
    }

    async fn insert_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().saved.insert((post_id, user_id)))
    }

    async fn delete_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().saved.remove(&(post_id, user_id)))
    }

    async fn saved_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().saved.contains(&(post_id, user_id)))
    }

    async fn insert_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().hidden.insert((post_id, user_id)))
    }

    async fn delete_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().hidden.remove(&(post_id, user_id)))
    }

    async fn hidden_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().hidden.contains(&(post_id, user_id)))
    }

    async fn insert_report(
        &self,
        post_id: Uuid,
        reporter_id: Uuid,
        _reason: &str,
        _description: Option<&str>,
    ) -> ServiceResult<()> {
        if !self.lock().reports.insert((post_id, reporter_id)) {
            return Err(ServiceError::Conflict(
                "duplicate key value violates unique constraint \"post_reports_pkey\"".to_string(),
            ));
        }
        Ok(())
    }

    async fn report_exists(&self, post_id: Uuid, reporter_id: Uuid) -> ServiceResult<bool> {
        Ok(self.lock().reports.contains(&(post_id, reporter_id)))
    }

    async fn insert_share(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ShareKind,
    ) -> ServiceResult<()> {
        let mut state = self.lock();
        state.shares.push((post_id, user_id, kind));
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            post.shares += 1;
        }
        Ok(())
    }

    async fn fetch_channels(&self) -> ServiceResult<Vec<Channel>> {
        let mut channels = self.lock().channels.clone();
        channels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(channels)
    }

    async fn insert_channel(&self, creator_id: Uuid, input: &NewChannel) -> ServiceResult<Channel> {
        let mut state = self.lock();
        let created_at = Self::next_timestamp(&mut state, self.epoch);
        let channel = Channel {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            creator_id,
            is_private: true,
            price: input.price,
            created_at,
            updated_at: created_at,
        };
        state.channels.push(channel.clone());
        Ok(channel)
    }

    async fn insert_channel_subscription(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<()> {
        if !self
            .lock()
            .channel_subscriptions
            .insert((channel_id, user_id))
        {
            return Err(ServiceError::Conflict(
                "duplicate key value violates unique constraint \"channel_subscriptions_pkey\""
                    .to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch_channel_messages(
        &self,
        channel_id: Uuid,
    ) -> ServiceResult<Vec<ChannelMessageView>> {
        let state = self.lock();
        let mut messages: Vec<&ChannelMessage> = state
            .channel_messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages
            .into_iter()
            .map(|message| ChannelMessageView {
                message: message.clone(),
                author: state.profiles.get(&message.user_id).map(Author::from),
            })
            .collect())
    }

    async fn insert_channel_message(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> ServiceResult<ChannelMessage> {
        let message = {
            let mut state = self.lock();
            let created_at = Self::next_timestamp(&mut state, self.epoch);
            let message = ChannelMessage {
                id: Uuid::new_v4(),
                channel_id,
                user_id,
                content: content.to_string(),
                created_at,
            };
            state.channel_messages.push(message.clone());
            message
        };
        self.emit(ChangeEvent::for_channel(
            ChangeOp::Insert,
            message.id,
            channel_id,
        ));
        Ok(message)
    }
}
