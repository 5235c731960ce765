pub mod comments;
pub mod posts;
pub mod reconciler;

pub use comments::{group_into_threads, CommentThread};
pub use posts::PostFeed;
pub use reconciler::{
    spawn_channel_reconciler, spawn_comment_reconciler, spawn_feed_reconciler, ReconcilerHandle,
};
