//! Postgres-backed store.
//!
//! Counter columns on posts and comments are denormalized and maintained
//! alongside the relation writes; they are eventually consistent with the
//! relation cardinality, never authoritative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::SocialStore;
use crate::config::DatabaseConfig;
use crate::domain::{
    Author, Channel, ChannelMessage, ChannelMessageView, Comment, CommentView, NewChannel,
    NewPost, Post, PostView, Profile, ShareKind,
};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Flat row for the posts + profiles + viewer-like join
#[derive(sqlx::FromRow)]
struct PostViewRow {
    id: Uuid,
    user_id: Uuid,
    content: String,
    sport: Option<String>,
    match_teams: Option<String>,
    prediction_text: Option<String>,
    analysis: Option<String>,
    odds: f64,
    confidence: i16,
    image_url: Option<String>,
    video_url: Option<String>,
    likes: i32,
    comments: i32,
    shares: i32,
    created_at: DateTime<Utc>,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    badge: Option<String>,
    is_liked: bool,
}

impl From<PostViewRow> for PostView {
    fn from(row: PostViewRow) -> Self {
        let author = row.username.map(|username| Author {
            username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            badge: row.badge,
        });
        PostView {
            post: Post {
                id: row.id,
                user_id: row.user_id,
                content: row.content,
                sport: row.sport,
                match_teams: row.match_teams,
                prediction_text: row.prediction_text,
                analysis: row.analysis,
                odds: row.odds,
                confidence: row.confidence,
                image_url: row.image_url,
                video_url: row.video_url,
                likes: row.likes,
                comments: row.comments,
                shares: row.shares,
                created_at: row.created_at,
            },
            author,
            is_liked: row.is_liked,
        }
    }
}

const POST_VIEW_COLUMNS: &str = r#"
    p.id, p.user_id, p.content, p.sport, p.match_teams, p.prediction_text, p.analysis,
    p.odds, p.confidence, p.image_url, p.video_url, p.likes, p.comments, p.shares,
    p.created_at,
    pr.username, pr.display_name, pr.avatar_url, pr.badge,
    EXISTS(
        SELECT 1 FROM post_likes pl
        WHERE pl.post_id = p.id AND pl.user_id = $1
    ) AS is_liked
"#;

/// Flat row for the comments + profiles + viewer-like join
#[derive(sqlx::FromRow)]
struct CommentViewRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    content: String,
    parent_id: Option<Uuid>,
    likes: i32,
    created_at: DateTime<Utc>,
    username: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
    badge: Option<String>,
    is_liked: bool,
}

impl From<CommentViewRow> for CommentView {
    fn from(row: CommentViewRow) -> Self {
        let author = row.username.map(|username| Author {
            username,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            badge: row.badge,
        });
        CommentView {
            comment: Comment {
                id: row.id,
                post_id: row.post_id,
                user_id: row.user_id,
                content: row.content,
                parent_id: row.parent_id,
                likes: row.likes,
                created_at: row.created_at,
            },
            author,
            is_liked: row.is_liked,
            replies: Vec::new(),
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the configured pool bounds.
    pub async fn connect(config: &DatabaseConfig) -> ServiceResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SocialStore for PgStore {
    async fn fetch_posts_page(
        &self,
        page: usize,
        page_size: usize,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<PostView>> {
        let query = format!(
            r#"
            SELECT {POST_VIEW_COLUMNS}
            FROM posts p
            LEFT JOIN profiles pr ON pr.id = p.user_id
            ORDER BY p.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let rows = sqlx::query_as::<_, PostViewRow>(&query)
            .bind(viewer)
            .bind(page_size as i64)
            .bind((page * page_size) as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PostView::from).collect())
    }

    async fn fetch_post(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Option<PostView>> {
        let query = format!(
            r#"
            SELECT {POST_VIEW_COLUMNS}
            FROM posts p
            LEFT JOIN profiles pr ON pr.id = p.user_id
            WHERE p.id = $2
            "#
        );

        let row = sqlx::query_as::<_, PostViewRow>(&query)
            .bind(viewer)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PostView::from))
    }

    async fn insert_post(&self, author_id: Uuid, input: &NewPost) -> ServiceResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (
                id, user_id, content, sport, match_teams, prediction_text, analysis,
                odds, confidence, image_url, video_url, likes, comments, shares, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, 0, 0, NOW())
            RETURNING id, user_id, content, sport, match_teams, prediction_text, analysis,
                      odds, confidence, image_url, video_url, likes, comments, shares, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(input.analysis.trim())
        .bind(&input.sport)
        .bind(&input.match_teams)
        .bind(&input.prediction_text)
        .bind(input.analysis.trim())
        .bind(input.odds)
        .bind(input.confidence)
        .bind(&input.image_url)
        .bind(&input.video_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(post)
    }

    async fn fetch_comments(
        &self,
        post_id: Uuid,
        viewer: Option<Uuid>,
    ) -> ServiceResult<Vec<CommentView>> {
        let rows = sqlx::query_as::<_, CommentViewRow>(
            r#"
            SELECT c.id, c.post_id, c.user_id, c.content, c.parent_id, c.likes, c.created_at,
                   pr.username, pr.display_name, pr.avatar_url, pr.badge,
                   EXISTS(
                       SELECT 1 FROM comment_likes cl
                       WHERE cl.comment_id = c.id AND cl.user_id = $1
                   ) AS is_liked
            FROM comments c
            LEFT JOIN profiles pr ON pr.id = c.user_id
            WHERE c.post_id = $2
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(viewer)
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn insert_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (id, post_id, user_id, content, parent_id, likes, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, NOW())
            RETURNING id, post_id, user_id, content, parent_id, likes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(author_id)
        .bind(content)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query("UPDATE posts SET comments = comments + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn insert_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        // A duplicate surfaces as Conflict (23505); the overlapping-toggle
        // race resolves to at most one row either way.
        sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE posts SET likes = likes + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_post_like(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM post_likes
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected > 0 {
            sqlx::query("UPDATE posts SET likes = GREATEST(likes - 1, 0) WHERE id = $1")
                .bind(post_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(affected > 0)
    }

    async fn post_like_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_likes
                WHERE post_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE comments SET likes = likes + 1 WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_comment_like(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM comment_likes
            WHERE comment_id = $1 AND user_id = $2
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected > 0 {
            sqlx::query("UPDATE comments SET likes = GREATEST(likes - 1, 0) WHERE id = $1")
                .bind(comment_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(affected > 0)
    }

    async fn comment_like_exists(&self, comment_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM comment_likes
                WHERE comment_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn profile_by_username(&self, username: &str) -> ServiceResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, username, display_name, avatar_url, badge
            FROM profiles
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn fetch_profiles(&self, ids: &[Uuid]) -> ServiceResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, username, display_name, avatar_url, badge
            FROM profiles
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn insert_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO user_follows (follower_id, following_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, following_id) DO NOTHING
            RETURNING follower_id
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn delete_follow(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM user_follows
            WHERE follower_id = $1 AND following_id = $2
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn follow_exists(&self, follower_id: Uuid, following_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_follows
                WHERE follower_id = $1 AND following_id = $2
            )
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO blocked_users (blocker_id, blocked_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (blocker_id, blocked_id) DO NOTHING
            RETURNING blocker_id
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn delete_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM blocked_users
            WHERE blocker_id = $1 AND blocked_id = $2
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn block_exists(&self, blocker_id: Uuid, blocked_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM blocked_users
                WHERE blocker_id = $1 AND blocked_id = $2
            )
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO saved_posts (post_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (post_id, user_id) DO NOTHING
            RETURNING post_id
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn delete_saved_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM saved_posts
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn saved_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM saved_posts
                WHERE post_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let inserted = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO hidden_posts (post_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (post_id, user_id) DO NOTHING
            RETURNING post_id
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_some())
    }

    async fn delete_hidden_post(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let affected = sqlx::query(
            r#"
            DELETE FROM hidden_posts
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn hidden_post_exists(&self, post_id: Uuid, user_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM hidden_posts
                WHERE post_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_report(
        &self,
        post_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        description: Option<&str>,
    ) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO post_reports (id, reporter_id, post_id, reason, description, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reporter_id)
        .bind(post_id)
        .bind(reason)
        .bind(description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn report_exists(&self, post_id: Uuid, reporter_id: Uuid) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM post_reports
                WHERE post_id = $1 AND reporter_id = $2
            )
            "#,
        )
        .bind(post_id)
        .bind(reporter_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_share(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ShareKind,
    ) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO post_shares (id, post_id, user_id, share_type, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(user_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE posts SET shares = shares + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_channels(&self) -> ServiceResult<Vec<Channel>> {
        let channels = sqlx::query_as::<_, Channel>(
            r#"
            SELECT id, name, description, creator_id, is_private, price, created_at, updated_at
            FROM channels
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(channels)
    }

    async fn insert_channel(&self, creator_id: Uuid, input: &NewChannel) -> ServiceResult<Channel> {
        let channel = sqlx::query_as::<_, Channel>(
            r#"
            INSERT INTO channels (id, name, description, creator_id, is_private, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, NOW(), NOW())
            RETURNING id, name, description, creator_id, is_private, price, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(creator_id)
        .bind(input.price)
        .fetch_one(&self.pool)
        .await?;

        Ok(channel)
    }

    async fn insert_channel_subscription(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
    ) -> ServiceResult<()> {
        // Duplicate subscription surfaces as Conflict so the caller can
        // phrase the "already subscribed" notice.
        sqlx::query(
            r#"
            INSERT INTO channel_subscriptions (channel_id, user_id, is_active, created_at)
            VALUES ($1, $2, TRUE, NOW())
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_channel_messages(
        &self,
        channel_id: Uuid,
    ) -> ServiceResult<Vec<ChannelMessageView>> {
        #[derive(sqlx::FromRow)]
        struct MessageRow {
            id: Uuid,
            channel_id: Uuid,
            user_id: Uuid,
            content: String,
            created_at: DateTime<Utc>,
            username: Option<String>,
            display_name: Option<String>,
            avatar_url: Option<String>,
            badge: Option<String>,
        }

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.channel_id, m.user_id, m.content, m.created_at,
                   pr.username, pr.display_name, pr.avatar_url, pr.badge
            FROM channel_messages m
            LEFT JOIN profiles pr ON pr.id = m.user_id
            WHERE m.channel_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ChannelMessageView {
                message: ChannelMessage {
                    id: row.id,
                    channel_id: row.channel_id,
                    user_id: row.user_id,
                    content: row.content,
                    created_at: row.created_at,
                },
                author: row.username.map(|username| Author {
                    username,
                    display_name: row.display_name,
                    avatar_url: row.avatar_url,
                    badge: row.badge,
                }),
            })
            .collect())
    }

    async fn insert_channel_message(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> ServiceResult<ChannelMessage> {
        let message = sqlx::query_as::<_, ChannelMessage>(
            r#"
            INSERT INTO channel_messages (id, channel_id, user_id, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, channel_id, user_id, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(channel_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }
}
