//! In-memory repositories - used when no database is configured, and by tests.
//!
//! Data is lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use folio_core::domain::{Comment, Like, LikeKey, LikeTarget, Post, User};
use folio_core::error::RepoError;
use folio_core::ports::{ContentRepository, Counter, Mutation, UserRepository, WriteBatch};
use folio_core::query::{Page, PostQuery};

#[derive(Debug, Default)]
struct Tables {
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    likes: HashMap<LikeKey, Like>,
}

/// Prior contents of the rows one mutation can touch.
enum Saved {
    Post(Uuid, Option<Post>),
    Comment(Uuid, Option<Comment>),
    Like(LikeKey, Option<Like>),
    LikesOf(Vec<(LikeKey, Like)>),
}

impl Tables {
    fn likes_on(&self, target: LikeTarget) -> u64 {
        self.likes.keys().filter(|k| k.target == target).count() as u64
    }

    fn comments_on(&self, post_id: Uuid) -> u64 {
        self.comments.values().filter(|c| c.post_id == post_id).count() as u64
    }

    fn target_exists(&self, target: LikeTarget) -> bool {
        match target {
            LikeTarget::Post(id) => self.posts.contains_key(&id),
            LikeTarget::Comment(id) => self.comments.contains_key(&id),
        }
    }

    fn counter_mut(&mut self, counter: Counter) -> Result<&mut u64, RepoError> {
        match counter {
            Counter::PostLikes(id) => self.posts.get_mut(&id).map(|p| &mut p.like_count),
            Counter::PostComments(id) => self.posts.get_mut(&id).map(|p| &mut p.comment_count),
            Counter::CommentLikes(id) => self.comments.get_mut(&id).map(|c| &mut c.like_count),
        }
        .ok_or(RepoError::NotFound)
    }

    fn save(&self, mutation: &Mutation) -> Saved {
        let post = |id: Uuid| Saved::Post(id, self.posts.get(&id).cloned());
        let comment = |id: Uuid| Saved::Comment(id, self.comments.get(&id).cloned());
        match mutation {
            Mutation::InsertPost(p) | Mutation::UpdatePost(p) => post(p.id),
            Mutation::DeletePost(id) => post(*id),
            Mutation::InsertComment(c) | Mutation::UpdateComment(c) => comment(c.id),
            Mutation::DeleteComment(id) => comment(*id),
            Mutation::InsertLike(like) => {
                let key = like.key();
                Saved::Like(key, self.likes.get(&key).cloned())
            }
            Mutation::DeleteLike(key) => Saved::Like(*key, self.likes.get(key).cloned()),
            Mutation::DeleteLikesOf(target) => Saved::LikesOf(
                self.likes
                    .iter()
                    .filter(|(key, _)| key.target == *target)
                    .map(|(key, like)| (*key, like.clone()))
                    .collect(),
            ),
            Mutation::AdjustCounter { counter, .. } | Mutation::Recount(counter) => match *counter {
                Counter::PostLikes(id) | Counter::PostComments(id) => post(id),
                Counter::CommentLikes(id) => comment(id),
            },
        }
    }

    fn restore(&mut self, saved: Saved) {
        match saved {
            Saved::Post(id, Some(post)) => {
                self.posts.insert(id, post);
            }
            Saved::Post(id, None) => {
                self.posts.remove(&id);
            }
            Saved::Comment(id, Some(comment)) => {
                self.comments.insert(id, comment);
            }
            Saved::Comment(id, None) => {
                self.comments.remove(&id);
            }
            Saved::Like(key, Some(like)) => {
                self.likes.insert(key, like);
            }
            Saved::Like(key, None) => {
                self.likes.remove(&key);
            }
            Saved::LikesOf(likes) => self.likes.extend(likes),
        }
    }

    fn apply(&mut self, mutation: Mutation) -> Result<(), RepoError> {
        match mutation {
            Mutation::InsertPost(post) => {
                if self.posts.contains_key(&post.id) {
                    return Err(RepoError::Constraint(format!("post {} exists", post.id)));
                }
                if self.posts.values().any(|p| p.slug == post.slug) {
                    return Err(RepoError::Constraint(format!("slug '{}' is taken", post.slug)));
                }
                self.posts.insert(post.id, post);
            }
            Mutation::UpdatePost(post) => {
                if self
                    .posts
                    .values()
                    .any(|p| p.slug == post.slug && p.id != post.id)
                {
                    return Err(RepoError::Constraint(format!("slug '{}' is taken", post.slug)));
                }
                let stored = self.posts.get_mut(&post.id).ok_or(RepoError::NotFound)?;
                stored.title = post.title;
                stored.slug = post.slug;
                stored.excerpt = post.excerpt;
                stored.content = post.content;
                stored.cover_image = post.cover_image;
                stored.category = post.category;
                stored.tags = post.tags;
                stored.featured = post.featured;
                stored.updated_at = post.updated_at;
            }
            Mutation::DeletePost(id) => {
                if !self.posts.contains_key(&id) {
                    return Err(RepoError::NotFound);
                }
                if self.comments.values().any(|c| c.post_id == id)
                    || self.likes_on(LikeTarget::Post(id)) > 0
                {
                    return Err(RepoError::Integrity(format!(
                        "post {} still has comments or likes",
                        id
                    )));
                }
                self.posts.remove(&id);
            }
            Mutation::InsertComment(comment) => {
                if self.comments.contains_key(&comment.id) {
                    return Err(RepoError::Constraint(format!("comment {} exists", comment.id)));
                }
                if !self.posts.contains_key(&comment.post_id) {
                    return Err(RepoError::Constraint(format!(
                        "post {} does not exist",
                        comment.post_id
                    )));
                }
                if let Some(parent_id) = comment.parent_id {
                    match self.comments.get(&parent_id) {
                        Some(parent) if parent.post_id == comment.post_id => {}
                        _ => {
                            return Err(RepoError::Constraint(format!(
                                "parent comment {} is not on post {}",
                                parent_id, comment.post_id
                            )));
                        }
                    }
                }
                self.comments.insert(comment.id, comment);
            }
            Mutation::UpdateComment(comment) => {
                let stored = self
                    .comments
                    .get_mut(&comment.id)
                    .ok_or(RepoError::NotFound)?;
                stored.content = comment.content;
                stored.updated_at = comment.updated_at;
            }
            Mutation::DeleteComment(id) => {
                if !self.comments.contains_key(&id) {
                    return Err(RepoError::NotFound);
                }
                if self.comments.values().any(|c| c.parent_id == Some(id))
                    || self.likes_on(LikeTarget::Comment(id)) > 0
                {
                    return Err(RepoError::Integrity(format!(
                        "comment {} still has replies or likes",
                        id
                    )));
                }
                self.comments.remove(&id);
            }
            Mutation::InsertLike(like) => {
                let key = like.key();
                if self.likes.contains_key(&key) {
                    return Err(RepoError::Constraint(format!("{} already liked", key.target)));
                }
                if !self.target_exists(key.target) {
                    return Err(RepoError::Constraint(format!("{} does not exist", key.target)));
                }
                self.likes.insert(key, like);
            }
            Mutation::DeleteLike(key) => {
                self.likes.remove(&key).ok_or(RepoError::NotFound)?;
            }
            Mutation::DeleteLikesOf(target) => {
                self.likes.retain(|key, _| key.target != target);
            }
            Mutation::AdjustCounter { counter, delta } => {
                let value = self.counter_mut(counter)?;
                let current = *value;
                let adjusted = (current as i64).checked_add(delta).filter(|v| *v >= 0);
                *value = adjusted.ok_or_else(|| {
                    RepoError::Integrity(format!(
                        "{:?} would go negative ({} {:+})",
                        counter, current, delta
                    ))
                })? as u64;
            }
            Mutation::Recount(counter) => {
                let actual = match counter {
                    Counter::PostLikes(id) => self.likes_on(LikeTarget::Post(id)),
                    Counter::PostComments(id) => self.comments_on(id),
                    Counter::CommentLikes(id) => self.likes_on(LikeTarget::Comment(id)),
                };
                *self.counter_mut(counter)? = actual;
            }
        }
        Ok(())
    }
}

fn since_filter(since: Option<DateTime<Utc>>) -> impl Fn(&DateTime<Utc>) -> bool {
    move |created_at| since.is_none_or(|since| *created_at >= since)
}

/// Content repository over a single lock-guarded set of tables.
///
/// A commit holds the write lock for the whole batch and records the prior
/// contents of every row it touches. If a step fails the touched rows are
/// restored in reverse order, so readers see all of a batch or none of it.
#[derive(Default)]
pub struct InMemoryContentRepository {
    tables: RwLock<Tables>,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.values().find(|p| p.slug == slug).cloned())
    }

    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, RepoError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Post> = tables.posts.values().filter(|p| query.matches(p)).collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        Ok(self.tables.read().await.posts.keys().copied().collect())
    }

    async fn count_posts(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let keep = since_filter(since);
        let tables = self.tables.read().await;
        Ok(tables.posts.values().filter(|p| keep(&p.created_at)).count() as u64)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn comments_of_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }

    async fn replies_to(&self, comment_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut replies: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.parent_id == Some(comment_id))
            .cloned()
            .collect();
        replies.sort_by_key(|c| (c.created_at, c.id));
        Ok(replies)
    }

    async fn recent_comments(&self, limit: u64) -> Result<Vec<Comment>, RepoError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables.comments.values().cloned().collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        comments.truncate(limit as usize);
        Ok(comments)
    }

    async fn comment_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        Ok(self.tables.read().await.comments.keys().copied().collect())
    }

    async fn count_comments(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let keep = since_filter(since);
        let tables = self.tables.read().await;
        Ok(tables.comments.values().filter(|c| keep(&c.created_at)).count() as u64)
    }

    async fn find_like(&self, key: LikeKey) -> Result<Option<Like>, RepoError> {
        Ok(self.tables.read().await.likes.get(&key).cloned())
    }

    async fn count_likes(&self, target: LikeTarget) -> Result<u64, RepoError> {
        Ok(self.tables.read().await.likes_on(target))
    }

    async fn increment_views(&self, post_id: Uuid) -> Result<Option<Post>, RepoError> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.get_mut(&post_id).map(|post| {
            post.view_count += 1;
            post.clone()
        }))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), RepoError> {
        let mut tables = self.tables.write().await;
        let mut undo = Vec::with_capacity(batch.steps().len());
        for mutation in batch.into_steps() {
            undo.push(tables.save(&mutation));
            if let Err(e) = tables.apply(mutation) {
                for saved in undo.into_iter().rev() {
                    tables.restore(saved);
                }
                return Err(e);
            }
        }
        Ok(())
    }
}

/// User records kept in memory.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn recent(&self, limit: u64) -> Result<Vec<User>, RepoError> {
        let users = self.users.read().await;
        let mut recent: Vec<User> = users.values().cloned().collect();
        recent.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn count(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        let keep = since_filter(since);
        let users = self.users.read().await;
        Ok(users.values().filter(|u| keep(&u.created_at)).count() as u64)
    }

    async fn save(&self, user: User) -> Result<User, RepoError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(RepoError::Constraint("email already registered".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests;
