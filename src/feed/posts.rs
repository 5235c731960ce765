//! Optimistic post feed controller.
//!
//! Holds the in-memory page list, applies user mutations locally before the
//! remote write confirms, and reconciles (rollback on failure, targeted
//! patch on realtime change events).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Author, NewPost, Post, PostView, Session, Toggle};
use crate::error::{ServiceError, ServiceResult};
use crate::realtime::{ChangeEvent, ChangeOp, Table};
use crate::store::SocialStore;

pub struct PostFeed<S> {
    store: Arc<S>,
    session: Option<Session>,
    posts: Vec<PostView>,
    /// Next page to request, 0-indexed.
    page: usize,
    page_size: usize,
    has_more: bool,
    /// Advisory guard against redundant load-more requests; mutual
    /// exclusion itself comes from `&mut self`.
    loading: bool,
}

impl<S: SocialStore> PostFeed<S> {
    pub fn new(store: Arc<S>, session: Option<Session>, page_size: usize) -> Self {
        Self {
            store,
            session,
            posts: Vec::new(),
            page: 0,
            page_size,
            has_more: true,
            loading: false,
        }
    }

    pub fn posts(&self) -> &[PostView] {
        &self.posts
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn viewer(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user_id)
    }

    /// Load page 0 and replace the collection wholesale.
    pub async fn load_initial(&mut self) -> ServiceResult<()> {
        self.loading = true;
        let result = self
            .store
            .fetch_posts_page(0, self.page_size, self.viewer())
            .await;
        self.loading = false;

        let batch = result?;
        self.has_more = batch.len() == self.page_size;
        self.page = 1;
        self.posts = batch;
        debug!(count = self.posts.len(), has_more = self.has_more, "initial feed loaded");
        Ok(())
    }

    /// Pull-to-refresh: reload from page 0, discarding loaded pages.
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        self.load_initial().await
    }

    /// Append the next page. Returns false when the call was a no-op
    /// (already loading, or no further pages exist).
    pub async fn load_more(&mut self) -> ServiceResult<bool> {
        if self.loading || !self.has_more {
            return Ok(false);
        }

        self.loading = true;
        let result = self
            .store
            .fetch_posts_page(self.page, self.page_size, self.viewer())
            .await;
        self.loading = false;

        let batch = result?;
        if batch.is_empty() {
            self.has_more = false;
            return Ok(false);
        }

        self.has_more = batch.len() == self.page_size;
        self.page += 1;
        // Realtime patches may already hold some of these rows.
        for view in batch {
            if !self.posts.iter().any(|p| p.post.id == view.post.id) {
                self.posts.push(view);
            }
        }
        Ok(true)
    }

    /// Create a post optimistically: a provisional entry with a local id is
    /// visible immediately and its identity is rewritten in place once the
    /// server assigns one. On failure the provisional entry is removed.
    pub async fn create_post(&mut self, input: NewPost) -> ServiceResult<Uuid> {
        let session = self
            .session
            .clone()
            .ok_or(ServiceError::NotAuthenticated)?;
        input.validate()?;

        let temp_id = Uuid::new_v4();
        let provisional = PostView {
            post: Post {
                id: temp_id,
                user_id: session.user_id,
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
                created_at: Utc::now(),
            },
            author: Some(Author::from(&session.profile)),
            is_liked: false,
        };
        self.posts.insert(0, provisional);

        match self.store.insert_post(session.user_id, &input).await {
            Ok(created) => {
                if let Some(entry) = self.posts.iter_mut().find(|p| p.post.id == temp_id) {
                    entry.post.id = created.id;
                    entry.post.created_at = created.created_at;
                }
                info!(post_id = %created.id, "post created");
                Ok(created.id)
            }
            Err(e) => {
                self.posts.retain(|p| p.post.id != temp_id);
                warn!(error = %e, "post creation failed, provisional entry removed");
                Err(e)
            }
        }
    }

    /// Toggle the viewer's like on a post.
    ///
    /// Local `is_liked` is trusted; the flip is applied optimistically and
    /// rolled back if the relation write fails. A conflict (two toggles
    /// racing on the same pair) also rolls back: membership after the
    /// erroring call equals membership before it.
    pub async fn toggle_like(&mut self, post_id: Uuid) -> ServiceResult<Toggle> {
        let user_id = self.viewer().ok_or(ServiceError::NotAuthenticated)?;
        let was_liked = self
            .posts
            .iter()
            .find(|p| p.post.id == post_id)
            .map(|p| p.is_liked)
            .ok_or_else(|| ServiceError::NotFound(format!("post {}", post_id)))?;

        self.set_liked(post_id, !was_liked);

        let result = if was_liked {
            self.store
                .delete_post_like(post_id, user_id)
                .await
                .map(|_| ())
        } else {
            self.store.insert_post_like(post_id, user_id).await
        };

        match result {
            Ok(()) => Ok(if was_liked {
                Toggle::Removed
            } else {
                Toggle::Added
            }),
            Err(e) => {
                self.set_liked(post_id, was_liked);
                if e.is_conflict() {
                    warn!(post_id = %post_id, "like toggle raced a concurrent toggle");
                }
                Err(e)
            }
        }
    }

    fn set_liked(&mut self, post_id: Uuid, liked: bool) {
        if let Some(entry) = self.posts.iter_mut().find(|p| p.post.id == post_id) {
            if entry.is_liked != liked {
                entry.is_liked = liked;
                entry.post.likes = if liked {
                    entry.post.likes + 1
                } else {
                    (entry.post.likes - 1).max(0)
                };
            }
        }
    }

    /// Targeted patch for the global feed scope: refetch only the changed
    /// row and splice it in by identifier, instead of refetching the feed.
    /// Idempotent under the echo of this client's own writes.
    pub async fn apply_change(&mut self, event: &ChangeEvent) -> ServiceResult<()> {
        if event.table != Table::Posts {
            return Ok(());
        }

        if event.op == ChangeOp::Delete {
            self.posts.retain(|p| p.post.id != event.id);
            return Ok(());
        }

        match self.store.fetch_post(event.id, self.viewer()).await? {
            Some(view) => {
                if let Some(entry) = self.posts.iter_mut().find(|p| p.post.id == view.post.id) {
                    *entry = view;
                } else if event.op == ChangeOp::Insert {
                    self.posts.insert(0, view);
                }
                // an update for a row outside the loaded window is ignored
            }
            None => {
                // row vanished between the event and the refetch
                self.posts.retain(|p| p.post.id != event.id);
            }
        }
        Ok(())
    }
}
