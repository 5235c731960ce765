//! Social graph and per-post toggles: follow, save, hide, block, share,
//! report, plus the membership checks views need.
//!
//! All mutual exclusion is delegated to the store's uniqueness constraints;
//! these toggles use check-then-act and treat the resulting races as the
//! benign outcomes they are (an idempotent insert that raced resolves to
//! the same membership).

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Session, ShareKind, Toggle, UserRef};
use crate::error::{ServiceError, ServiceResult};
use crate::store::SocialStore;

/// Outcome of a report submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Submitted,
    /// This reporter already reported this post; not an error.
    AlreadyReported,
}

pub struct UserActions<S> {
    store: Arc<S>,
    session: Option<Session>,
}

impl<S: SocialStore> UserActions<S> {
    pub fn new(store: Arc<S>, session: Option<Session>) -> Self {
        Self { store, session }
    }

    fn current_user(&self) -> ServiceResult<Uuid> {
        self.session
            .as_ref()
            .map(|s| s.user_id)
            .ok_or(ServiceError::NotAuthenticated)
    }

    /// Resolve a user reference to a stable identifier. Handles hit the
    /// profile table once; identifiers pass through.
    async fn resolve_user(&self, target: &UserRef) -> ServiceResult<Uuid> {
        match target {
            UserRef::Id(id) => Ok(*id),
            UserRef::Username(username) => self
                .store
                .profile_by_username(username)
                .await?
                .map(|p| p.id)
                .ok_or_else(|| ServiceError::NotFound(format!("user @{}", username))),
        }
    }

    pub async fn toggle_follow(&self, target: &UserRef) -> ServiceResult<Toggle> {
        let me = self.current_user()?;
        let them = self.resolve_user(target).await?;

        if self.store.follow_exists(me, them).await? {
            self.store.delete_follow(me, them).await?;
            debug!(follower = %me, following = %them, "unfollowed");
            Ok(Toggle::Removed)
        } else {
            self.store.insert_follow(me, them).await?;
            debug!(follower = %me, following = %them, "followed");
            Ok(Toggle::Added)
        }
    }

    /// Blocking also severs the blocker's follow edge to the blocked user.
    /// The two writes are not atomic; the follow delete is idempotent, so a
    /// retry converges.
    pub async fn toggle_block(&self, target: &UserRef) -> ServiceResult<Toggle> {
        let me = self.current_user()?;
        let them = self.resolve_user(target).await?;

        if self.store.block_exists(me, them).await? {
            self.store.delete_block(me, them).await?;
            info!(blocker = %me, blocked = %them, "unblocked");
            Ok(Toggle::Removed)
        } else {
            self.store.insert_block(me, them).await?;
            self.store.delete_follow(me, them).await?;
            info!(blocker = %me, blocked = %them, "blocked");
            Ok(Toggle::Added)
        }
    }

    pub async fn toggle_save(&self, post_id: Uuid) -> ServiceResult<Toggle> {
        let me = self.current_user()?;
        if self.store.saved_post_exists(post_id, me).await? {
            self.store.delete_saved_post(post_id, me).await?;
            Ok(Toggle::Removed)
        } else {
            self.store.insert_saved_post(post_id, me).await?;
            Ok(Toggle::Added)
        }
    }

    pub async fn toggle_hide(&self, post_id: Uuid) -> ServiceResult<Toggle> {
        let me = self.current_user()?;
        if self.store.hidden_post_exists(post_id, me).await? {
            self.store.delete_hidden_post(post_id, me).await?;
            Ok(Toggle::Removed)
        } else {
            self.store.insert_hidden_post(post_id, me).await?;
            Ok(Toggle::Added)
        }
    }

    /// Shares are append-only; sharing twice records two shares.
    pub async fn share_post(&self, post_id: Uuid, kind: ShareKind) -> ServiceResult<()> {
        let me = self.current_user()?;
        self.store.insert_share(post_id, me, kind).await?;
        debug!(post_id = %post_id, kind = kind.as_str(), "post shared");
        Ok(())
    }

    /// At most one report per (reporter, post); a duplicate is reported as
    /// an outcome, not an error.
    pub async fn report_post(
        &self,
        post_id: Uuid,
        reason: &str,
        description: Option<&str>,
    ) -> ServiceResult<ReportOutcome> {
        let me = self.current_user()?;
        if reason.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "report reason cannot be empty".to_string(),
            ));
        }
        if self.store.report_exists(post_id, me).await? {
            return Ok(ReportOutcome::AlreadyReported);
        }
        match self.store.insert_report(post_id, me, reason, description).await {
            Ok(()) => {
                info!(post_id = %post_id, "post reported");
                Ok(ReportOutcome::Submitted)
            }
            // the exists check raced another submission from the same user
            Err(e) if e.is_conflict() => Ok(ReportOutcome::AlreadyReported),
            Err(e) => Err(e),
        }
    }

    // Membership checks mirror their toggles; an anonymous viewer holds no
    // memberships.

    pub async fn is_following(&self, target: &UserRef) -> ServiceResult<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        let them = self.resolve_user(target).await?;
        self.store.follow_exists(session.user_id, them).await
    }

    pub async fn is_blocked(&self, target: &UserRef) -> ServiceResult<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        let them = self.resolve_user(target).await?;
        self.store.block_exists(session.user_id, them).await
    }

    pub async fn is_saved(&self, post_id: Uuid) -> ServiceResult<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        self.store.saved_post_exists(post_id, session.user_id).await
    }

    pub async fn is_hidden(&self, post_id: Uuid) -> ServiceResult<bool> {
        let Some(session) = &self.session else {
            return Ok(false);
        };
        self.store.hidden_post_exists(post_id, session.user_id).await
    }
}
