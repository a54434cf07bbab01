//! Domain entities - the core business objects.

mod activity;
mod comment;
mod like;
mod post;
mod user;

pub use activity::{ActivityEvent, DashboardStats};
pub use comment::{
    COMMENT_MAX_CHARS, Comment, CommentPatch, CommentThread, MAX_REPLY_DEPTH, NewComment,
    build_threads,
};
pub use like::{Like, LikeKey, LikeOutcome, LikeState, LikeTarget};
pub use post::{
    Category, DEFAULT_COVER_IMAGE, EXCERPT_MAX_CHARS, NewPost, Post, PostPatch, TITLE_MAX_CHARS,
    slugify,
};
pub use user::{Actor, Role, User};
