//! Remote store abstraction.
//!
//! One method per remote operation the controllers need. The hosted
//! relational backend is reached through [`PgStore`]; [`MemoryStore`] is a
//! behaviorally equivalent double that also emits the change events the
//! hosted backend would.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Channel, ChannelMessage, ChannelMessageView, Comment, CommentView, NewChannel, NewPost, Post,
    PostView, Profile, ShareKind,
};
use crate::error::ServiceResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Remote data store operations.
///
/// Uniqueness contracts: like, follow, block, save and hide pairs hold at
/// most one row; `insert_*` on an existing pair either no-ops (`Ok(false)`
/// where a bool is returned) or surfaces `ServiceError::Conflict` where the
/// duplicate must be visible to the caller.
#[async_trait]
pub trait SocialStore: Send + Sync {
    // ---- posts ----

    /// Fetch one page of posts, newest first, with author fields and the
    /// viewer's like state attached. Pages are 0-indexed.
    async fn fetch_posts_page(
        &self,
        page: usize,
        page_size: usize,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<PostView>>;

    /// Fetch a single post by id (targeted realtime patch path).
    async fn fetch_post(&self, post_id: Uuid, viewer: Option<Uuid>)
        -> ServiceResult<Option<PostView>>;

    async fn insert_post(&self, author_id: Uuid, input: &NewPost) -> ServiceResult<Post>;

    // ---- comments ----

    /// All comments of a post, flat, creation ascending, with author fields
    /// and the viewer's like state attached; `replies` is left empty.
    /// Grouping into threads is the caller's concern.
    async fn fetch_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<CommentView>>;

    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Comment>;

    // ---- likes ----

    async fn insert_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<()>;
    async fn delete_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn post_like_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;

    async fn insert_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<()>;
    async fn delete_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn comment_like_exists(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;

    // ---- profiles ----

    async fn profile_by_username(&self, username: &str) -> ServiceResult<Option<Profile>>;
    async fn fetch_profiles(&self, ids: &[Uuid]) -> ServiceResult<Vec<Profile>>;

    // ---- follows ----

    /// Idempotent; returns true if a new row was inserted.
    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool>;
    /// Idempotent; returns true if a row was removed.
    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool>;
    async fn follow_exists(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool>;

    // ---- blocks ----

    async fn insert_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool>;
    async fn delete_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool>;
    async fn block_exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool>;

    // ---- saved / hidden posts ----

    async fn insert_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn delete_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn saved_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;

    async fn insert_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn delete_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;
    async fn hidden_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool>;

    // ---- reports & shares ----

    async fn insert_report(
        &self,
        post_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        description: Option<&str>,
    ) -> ServiceResult<()>;
    async fn report_exists(&self, post_id: Uuid, reporter_id: Uuid) -> ServiceResult<bool>;

    async fn insert_share(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ShareKind,
    ) -> ServiceResult<()>;

    // ---- channels ----

    async fn fetch_channels(&self) -> ServiceResult<Vec<Channel>>;
    async fn insert_channel(&self, creator_id: Uuid, input: &NewChannel) -> ServiceResult<Channel>;
    /// Surfaces `Conflict` on a duplicate subscription.
    async fn insert_channel_subscription(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<()>;
    async fn fetch_channel_messages(
        &self,
        channel_id: Uuid,
    ) -> ServiceResult<Vec<ChannelMessageView>>;
    async fn insert_channel_message(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> ServiceResult<ChannelMessage>;
}
