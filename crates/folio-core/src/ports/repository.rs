use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Comment, Like, LikeKey, LikeTarget, Post, User};
use crate::error::RepoError;
use crate::query::{Page, PostQuery};

/// A denormalized counter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    PostLikes(Uuid),
    PostComments(Uuid),
    CommentLikes(Uuid),
}

impl Counter {
    /// The counter that tracks likes on `target`.
    pub fn likes_of(target: LikeTarget) -> Self {
        match target {
            LikeTarget::Post(id) => Counter::PostLikes(id),
            LikeTarget::Comment(id) => Counter::CommentLikes(id),
        }
    }
}

/// A single row-level change. Stores enforce referential rules per step:
///
/// - `InsertComment` requires the post (and the parent, if any) to exist.
/// - `InsertLike` fails with [`RepoError::Constraint`] when the key exists
///   or the target row is missing.
/// - `DeleteLike` fails with [`RepoError::NotFound`] when the key is absent.
/// - `DeleteComment` fails with [`RepoError::Integrity`] while replies or
///   likes still reference it; `DeletePost` likewise for comments and likes.
/// - `AdjustCounter` fails with [`RepoError::Integrity`] if the result
///   would be negative.
/// - `Recount` recomputes a counter from the rows it summarizes, holding the
///   owning row locked while counting.
/// - `UpdatePost`/`UpdateComment` write editable fields only; counters,
///   views and `created_at` are never overwritten by them.
/// - Counter steps on a missing row fail with [`RepoError::NotFound`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertPost(Post),
    UpdatePost(Post),
    DeletePost(Uuid),
    InsertComment(Comment),
    UpdateComment(Comment),
    DeleteComment(Uuid),
    InsertLike(Like),
    DeleteLike(LikeKey),
    DeleteLikesOf(LikeTarget),
    AdjustCounter { counter: Counter, delta: i64 },
    Recount(Counter),
}

/// Ordered list of mutations committed as one atomic unit: either every
/// step is applied or none is, and no reader observes a partial batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    steps: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.steps.push(mutation);
        self
    }

    pub fn with(mut self, mutation: Mutation) -> Self {
        self.steps.push(mutation);
        self
    }

    pub fn extend(&mut self, other: WriteBatch) {
        self.steps.extend(other.steps);
    }

    pub fn steps(&self) -> &[Mutation] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Mutation> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Persistence port for posts, comments and likes.
///
/// Reads never mutate, except [`ContentRepository::increment_views`].
/// All other writes go through [`ContentRepository::commit`].
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// Filtered, sorted page of posts plus the total matching count.
    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, RepoError>;

    async fn post_ids(&self) -> Result<Vec<Uuid>, RepoError>;

    async fn count_posts(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError>;

    /// Every comment on a post, replies included, oldest first.
    async fn comments_of_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// Direct replies to a comment, oldest first.
    async fn replies_to(&self, comment_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// Most recent comments across all posts, newest first.
    async fn recent_comments(&self, limit: u64) -> Result<Vec<Comment>, RepoError>;

    async fn comment_ids(&self) -> Result<Vec<Uuid>, RepoError>;

    async fn count_comments(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError>;

    async fn find_like(&self, key: LikeKey) -> Result<Option<Like>, RepoError>;

    /// Number of like rows on a target, counted from the rows themselves.
    async fn count_likes(&self, target: LikeTarget) -> Result<u64, RepoError>;

    /// Best-effort view bump. Returns the updated post, or `None` if absent.
    async fn increment_views(&self, post_id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Apply a batch atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), RepoError>;
}

/// Read access to users owned by the identity subsystem.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    /// Most recently registered users, newest first.
    async fn recent(&self, limit: u64) -> Result<Vec<User>, RepoError>;

    async fn count(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError>;

    /// Register or update a user record.
    async fn save(&self, user: User) -> Result<User, RepoError>;
}
