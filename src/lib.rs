//! Data layer for a sports-prediction social feed.
//!
//! Users post predictions ("pronostics") with odds, confidence and analysis,
//! then like, comment, follow, save, hide, share, report, block, and chat in
//! paid channels. This crate owns everything between the UI and the hosted
//! relational backend:
//!
//! - [`store`] - the remote store seam ([`store::SocialStore`]) with a
//!   Postgres implementation and an in-memory double,
//! - [`feed`] - optimistic controllers for the post feed and per-post
//!   comment threads, plus the reconcilers that re-synchronize them when
//!   change notifications arrive,
//! - [`realtime`] - scope-keyed change-event fan-out and the Redis bridge
//!   to the backend's change stream,
//! - [`actions`] - follow/save/hide/block/report/share toggles,
//! - [`channels`] - the paid channel directory and message streams,
//! - [`media`] - post media upload behind blob-store and image-optimizer
//!   seams,
//! - [`settings`] - theme preference with write-through persistence.
//!
//! Mutations are applied to local state first and reconciled against the
//! remote outcome: rolled back on failure, patched or refetched on realtime
//! echo. Uniqueness of like/follow/block relations is delegated to the
//! store's constraints; a duplicate-key conflict is an expected, recoverable
//! outcome everywhere in this crate.

pub mod actions;
pub mod channels;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod media;
pub mod realtime;
pub mod settings;
pub mod store;

pub use actions::{ReportOutcome, UserActions};
pub use channels::{ChannelChat, ChannelDirectory, SubscribeOutcome};
pub use config::Config;
pub use domain::{
    Author, Channel, ChannelMessage, Comment, CommentView, NewChannel, NewPost, Post, PostView,
    Profile, Session, ShareKind, Toggle, UserRef,
};
pub use error::{ServiceError, ServiceResult};
pub use feed::{CommentThread, PostFeed, ReconcilerHandle};
pub use realtime::RealtimeHub;
pub use store::{MemoryStore, PgStore, SocialStore};
