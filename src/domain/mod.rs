pub mod models;
pub mod user_ref;

pub use models::{
    Author, Channel, ChannelMessage, ChannelMessageView, Comment, CommentView, NewChannel,
    NewPost, Post, PostView, Profile, Session, ShareKind, Toggle,
};
pub use user_ref::UserRef;
