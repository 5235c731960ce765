//! Optimistic comment thread controller for a single post.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Author, Comment, CommentView, Session, Toggle};
use crate::error::{ServiceError, ServiceResult};
use crate::store::SocialStore;

/// Group a flat, creation-ascending comment list into root threads.
///
/// Roots keep their fetch order; each reply is attached to its root in fetch
/// order. Replies addressing an unknown parent (deleted root, or a reply -
/// nesting is single-level) are dropped rather than promoted to roots.
pub fn group_into_threads(flat: Vec<CommentView>) -> Vec<CommentView> {
    let (mut roots, replies): (Vec<CommentView>, Vec<CommentView>) = flat
        .into_iter()
        .partition(|c| c.comment.parent_id.is_none());

    let index: HashMap<Uuid, usize> = roots
        .iter()
        .enumerate()
        .map(|(i, c)| (c.comment.id, i))
        .collect();

    for reply in replies {
        if let Some(parent_id) = reply.comment.parent_id {
            if let Some(&i) = index.get(&parent_id) {
                roots[i].replies.push(reply);
            }
        }
    }
    roots
}

pub struct CommentThread<S> {
    store: Arc<S>,
    session: Option<Session>,
    post_id: Uuid,
    threads: Vec<CommentView>,
    loading: bool,
}

impl<S: SocialStore> CommentThread<S> {
    pub fn new(store: Arc<S>, session: Option<Session>, post_id: Uuid) -> Self {
        Self {
            store,
            session,
            post_id,
            threads: Vec::new(),
            loading: false,
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    /// Root comments with their replies attached.
    pub fn comments(&self) -> &[CommentView] {
        &self.threads
    }

    /// Roots plus replies.
    pub fn total_count(&self) -> usize {
        self.threads.len() + self.threads.iter().map(|c| c.replies.len()).sum::<usize>()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn viewer(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.user_id)
    }

    /// Fetch all comments flat and regroup. The wholesale replacement is
    /// what keeps refetch-after-own-write idempotent.
    pub async fn refresh(&mut self) -> ServiceResult<()> {
        self.loading = true;
        let result = self.store.fetch_comments(self.post_id, self.viewer()).await;
        self.loading = false;

        let flat = result?;
        self.threads = group_into_threads(flat);
        debug!(post_id = %self.post_id, count = self.total_count(), "comment thread refreshed");
        Ok(())
    }

    /// Create a comment (or a reply when `parent_id` addresses a root).
    ///
    /// A provisional entry with a local id appears immediately at the end of
    /// the root list or the parent's reply list; on success its identity is
    /// swapped in place, on failure it is removed.
    pub async fn create(
        &mut self,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> ServiceResult<Uuid> {
        let session = self
            .session
            .clone()
            .ok_or(ServiceError::NotAuthenticated)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::InvalidInput(
                "comment cannot be empty".to_string(),
            ));
        }

        if let Some(parent_id) = parent_id {
            let parent_is_root = self.threads.iter().any(|c| c.comment.id == parent_id);
            if !parent_is_root {
                let parent_is_reply = self
                    .threads
                    .iter()
                    .flat_map(|c| c.replies.iter())
                    .any(|r| r.comment.id == parent_id);
                return Err(if parent_is_reply {
                    ServiceError::InvalidInput("replies cannot be nested".to_string())
                } else {
                    ServiceError::NotFound(format!("comment {}", parent_id))
                });
            }
        }

        let temp_id = Uuid::new_v4();
        let provisional = CommentView {
            comment: Comment {
                id: temp_id,
                post_id: self.post_id,
                user_id: session.user_id,
                content: content.to_string(),
                parent_id,
                likes: 0,
                created_at: Utc::now(),
            },
            author: Some(Author::from(&session.profile)),
            is_liked: false,
            replies: Vec::new(),
        };
        match parent_id {
            Some(parent_id) => {
                if let Some(root) = self.threads.iter_mut().find(|c| c.comment.id == parent_id) {
                    root.replies.push(provisional);
                }
            }
            None => self.threads.push(provisional),
        }

        match self
            .store
            .insert_comment(self.post_id, session.user_id, content, parent_id)
            .await
        {
            Ok(created) => {
                if let Some(entry) = self.find_mut(temp_id) {
                    entry.comment.id = created.id;
                    entry.comment.created_at = created.created_at;
                }
                Ok(created.id)
            }
            Err(e) => {
                self.remove(temp_id);
                warn!(error = %e, post_id = %self.post_id, "comment creation failed, provisional entry removed");
                Err(e)
            }
        }
    }

    /// Toggle the viewer's like on a comment, trusting local `is_liked`;
    /// same optimistic-flip-then-rollback contract as the post feed.
    pub async fn toggle_like(&mut self, comment_id: Uuid) -> ServiceResult<Toggle> {
        let user_id = self.viewer().ok_or(ServiceError::NotAuthenticated)?;
        let was_liked = self
            .find(comment_id)
            .map(|c| c.is_liked)
            .ok_or_else(|| ServiceError::NotFound(format!("comment {}", comment_id)))?;

        self.set_liked(comment_id, !was_liked);

        let result = if was_liked {
            self.store
                .delete_comment_like(comment_id, user_id)
                .await
                .map(|_| ())
        } else {
            self.store.insert_comment_like(comment_id, user_id).await
        };

        match result {
            Ok(()) => Ok(if was_liked {
                Toggle::Removed
            } else {
                Toggle::Added
            }),
            Err(e) => {
                self.set_liked(comment_id, was_liked);
                if e.is_conflict() {
                    warn!(comment_id = %comment_id, "like toggle raced a concurrent toggle");
                }
                Err(e)
            }
        }
    }

    fn find(&self, comment_id: Uuid) -> Option<&CommentView> {
        self.threads
            .iter()
            .flat_map(|c| std::iter::once(c).chain(c.replies.iter()))
            .find(|c| c.comment.id == comment_id)
    }

    fn find_mut(&mut self, comment_id: Uuid) -> Option<&mut CommentView> {
        for root in self.threads.iter_mut() {
            if root.comment.id == comment_id {
                return Some(root);
            }
            for reply in root.replies.iter_mut() {
                if reply.comment.id == comment_id {
                    return Some(reply);
                }
            }
        }
        None
    }

    fn remove(&mut self, comment_id: Uuid) {
        self.threads.retain(|c| c.comment.id != comment_id);
        for root in self.threads.iter_mut() {
            root.replies.retain(|r| r.comment.id != comment_id);
        }
    }

    fn set_liked(&mut self, comment_id: Uuid, liked: bool) {
        if let Some(entry) = self.find_mut(comment_id) {
            if entry.is_liked != liked {
                entry.is_liked = liked;
                entry.comment.likes = if liked {
                    entry.comment.likes + 1
                } else {
                    (entry.comment.likes - 1).max(0)
                };
            }
        }
    }
}
