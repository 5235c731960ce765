use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Profile entity - public identity attached to posts and comments
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub badge: Option<String>,
}

/// Authenticated identity; controllers draw optimistic author fields from
/// the cached profile.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub profile: Profile,
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        Self {
            user_id: profile.id,
            profile,
        }
    }
}

/// Author fields denormalized onto views at fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub badge: Option<String>,
}

impl From<&Profile> for Author {
    fn from(profile: &Profile) -> Self {
        Self {
            username: profile.username.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            badge: profile.badge.clone(),
        }
    }
}

/// Post entity - a prediction ("pronostic") with denormalized counters
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub sport: Option<String>,
    pub match_teams: Option<String>,
    pub prediction_text: Option<String>,
    pub analysis: Option<String>,
    pub odds: f64,
    /// Confidence level, 1 through 5
    pub confidence: i16,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    /// Eventually consistent with the post_likes relation; never assumed
    /// strictly equal while other clients mutate concurrently.
    pub likes: i32,
    pub comments: i32,
    pub shares: i32,
    pub created_at: DateTime<Utc>,
}

/// Post joined with its author and the viewer's like state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub post: Post,
    pub author: Option<Author>,
    /// Derived from the post_likes relation for the viewing user, not
    /// persisted on the post row.
    pub is_liked: bool,
}

/// Input for creating a post
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub sport: Option<String>,
    pub match_teams: Option<String>,
    pub prediction_text: Option<String>,
    pub analysis: String,
    pub odds: f64,
    pub confidence: i16,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl NewPost {
    /// Local validation; rejected input never reaches the store.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.analysis.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "analysis cannot be empty".to_string(),
            ));
        }
        if !(1..=5).contains(&self.confidence) {
            return Err(ServiceError::InvalidInput(format!(
                "confidence must be between 1 and 5, got {}",
                self.confidence
            )));
        }
        if self.odds < 1.0 {
            return Err(ServiceError::InvalidInput(format!(
                "odds must be at least 1.0, got {}",
                self.odds
            )));
        }
        Ok(())
    }
}

/// Comment entity - single-level reply nesting only
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    /// Non-null means this comment is a reply to a root comment.
    pub parent_id: Option<Uuid>,
    pub likes: i32,
    pub created_at: DateTime<Utc>,
}

/// Comment joined with its author and the viewer's like state.
/// `replies` is populated on root comments only, by client-side grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub comment: Comment,
    pub author: Option<Author>,
    pub is_liked: bool,
    pub replies: Vec<CommentView>,
}

impl CommentView {
    pub fn id(&self) -> Uuid {
        self.comment.id
    }
}

/// Paid channel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub creator_id: Uuid,
    pub is_private: bool,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a channel
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub name: String,
    pub description: String,
    pub price: f64,
}

/// Message inside a channel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelMessage {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Channel message joined with its author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessageView {
    pub message: ChannelMessage,
    pub author: Option<Author>,
}

/// Net effect of a membership toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// How a post was shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareKind {
    Direct,
    Repost,
    External,
}

impl ShareKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareKind::Direct => "direct",
            ShareKind::Repost => "repost",
            ShareKind::External => "external",
        }
    }
}

impl Default for ShareKind {
    fn default() -> Self {
        ShareKind::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_post() -> NewPost {
        NewPost {
            analysis: "Home side unbeaten in 12".to_string(),
            odds: 1.85,
            confidence: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_post_validation() {
        assert!(valid_post().validate().is_ok());

        let mut post = valid_post();
        post.analysis = "   ".to_string();
        assert!(matches!(
            post.validate(),
            Err(ServiceError::InvalidInput(_))
        ));

        let mut post = valid_post();
        post.confidence = 6;
        assert!(post.validate().is_err());

        let mut post = valid_post();
        post.odds = 0.5;
        assert!(post.validate().is_err());
    }
}
