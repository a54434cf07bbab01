//! Post and comment operations.
//!
//! Every write is validated here, planned with the integrity manager where
//! it cascades, and committed as a single batch together with the counter
//! deltas it implies.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    Actor, Category, Comment, CommentPatch, CommentThread, NewComment, NewPost, Post, PostPatch,
    build_threads,
};
use crate::error::{DomainError, DomainResult, RepoError};
use crate::ports::{ContentRepository, Counter, Mutation, UserRepository, WriteBatch};
use crate::query::{
    FilterValue, MAX_PAGE_LIMIT, Op, PageRequest, Pagination, PostField, PostListing, PostQuery, Predicate,
    QueryBuilder,
};
use crate::services::counters::CounterMaintenance;
use crate::services::integrity::{CascadePlan, IntegrityManager};

const FEATURED_LIMIT: u64 = 5;
const RELATED_LIMIT: u64 = 3;

/// A post with its comment threads joined at read time.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentThread>,
}

#[derive(Clone)]
pub struct ContentStore {
    repo: Arc<dyn ContentRepository>,
    users: Arc<dyn UserRepository>,
    integrity: IntegrityManager,
    counters: CounterMaintenance,
    queries: QueryBuilder,
}

fn require_actor(actor: Option<&Actor>) -> DomainResult<&Actor> {
    actor.ok_or(DomainError::Unauthenticated)
}

impl ContentStore {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        integrity: IntegrityManager,
        counters: CounterMaintenance,
        queries: QueryBuilder,
    ) -> Self {
        Self {
            repo,
            users,
            integrity,
            counters,
            queries,
        }
    }

    async fn ensure_user(&self, user_id: Uuid) -> DomainResult<()> {
        match self.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("user", user_id)),
        }
    }

    async fn load_post(&self, id: Uuid) -> DomainResult<Post> {
        self.repo
            .find_post(id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", id))
    }

    async fn load_comment(&self, id: Uuid) -> DomainResult<Comment> {
        self.repo
            .find_comment(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", id))
    }

    // ---- posts ----

    #[instrument(skip(self, input, actor), fields(title = %input.title))]
    pub async fn create_post(&self, input: NewPost, actor: Option<&Actor>) -> DomainResult<Post> {
        let actor = require_actor(actor)?;
        self.ensure_user(actor.user_id).await?;

        let post = input.into_post(actor.user_id)?;
        if self.repo.find_post_by_slug(&post.slug).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "a post with slug '{}' already exists",
                post.slug
            )));
        }

        self.repo
            .commit(WriteBatch::new().with(Mutation::InsertPost(post.clone())))
            .await?;
        info!(post_id = %post.id, slug = %post.slug, author_id = %post.author_id, "post created");
        Ok(post)
    }

    /// Detail read: bumps the view counter, then joins the comment threads.
    #[instrument(skip(self))]
    pub async fn get_post_detail(&self, id: Uuid) -> DomainResult<PostDetail> {
        let post = self
            .repo
            .increment_views(id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", id))?;
        let comments = build_threads(self.repo.comments_of_post(id).await?);
        Ok(PostDetail { post, comments })
    }

    /// List posts from raw request parameters.
    pub async fn list_posts<I, K, V>(&self, params: I) -> DomainResult<PostListing>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = self.queries.build(params)?;
        self.query_posts(&query).await
    }

    #[instrument(skip(self))]
    pub async fn query_posts(&self, query: &PostQuery) -> DomainResult<PostListing> {
        let page = self.repo.query_posts(query).await?;
        debug!(total = page.total, returned = page.items.len(), "posts listed");
        Ok(PostListing {
            pagination: Pagination::for_page(query.page, page.total),
            items: page.items,
            total: page.total,
            select: query.select.clone(),
        })
    }

    pub async fn featured_posts(&self) -> DomainResult<Vec<Post>> {
        let query = PostQuery::default()
            .filter(Predicate::eq(PostField::Featured, FilterValue::Flag(true)))
            .limit(FEATURED_LIMIT);
        Ok(self.repo.query_posts(&query).await?.items)
    }

    /// Newest posts sharing the category of `id`, excluding it.
    pub async fn related_posts(&self, id: Uuid) -> DomainResult<Vec<Post>> {
        let post = self.load_post(id).await?;
        let query = PostQuery::default()
            .filter(Predicate::eq(
                PostField::Category,
                FilterValue::Category(post.category),
            ))
            .filter(Predicate::new(PostField::Id, Op::Ne, FilterValue::Id(id)))
            .limit(RELATED_LIMIT);
        Ok(self.repo.query_posts(&query).await?.items)
    }

    pub async fn posts_by_category(
        &self,
        category: &str,
        page: PageRequest,
    ) -> DomainResult<PostListing> {
        let category: Category = category.parse()?;
        let mut query = PostQuery::default().filter(Predicate::eq(
            PostField::Category,
            FilterValue::Category(category),
        ));
        query.page = self.queries.bound(page);
        self.query_posts(&query).await
    }

    pub async fn posts_by_author(
        &self,
        author_id: Uuid,
        page: PageRequest,
    ) -> DomainResult<PostListing> {
        let mut query =
            PostQuery::default().filter(Predicate::eq(PostField::Author, FilterValue::Id(author_id)));
        query.page = self.queries.bound(page);
        self.query_posts(&query).await
    }

    #[instrument(skip(self, patch, actor))]
    pub async fn update_post(
        &self,
        id: Uuid,
        patch: PostPatch,
        actor: Option<&Actor>,
    ) -> DomainResult<Post> {
        let actor = require_actor(actor)?;
        let mut post = self.load_post(id).await?;
        if !actor.may_modify(post.author_id) {
            return Err(DomainError::Unauthorized(format!("update post {}", id)));
        }

        if post.apply_patch(patch)? {
            if let Some(other) = self.repo.find_post_by_slug(&post.slug).await? {
                if other.id != post.id {
                    return Err(DomainError::Conflict(format!(
                        "a post with slug '{}' already exists",
                        post.slug
                    )));
                }
            }
        }

        self.repo
            .commit(WriteBatch::new().with(Mutation::UpdatePost(post)))
            .await?;
        info!(post_id = %id, "post updated");
        self.load_post(id).await
    }

    /// Remove a post with all comments, replies and likes, atomically.
    #[instrument(skip(self, actor))]
    pub async fn delete_post(&self, id: Uuid, actor: Option<&Actor>) -> DomainResult<()> {
        let actor = require_actor(actor)?;
        let post = self.load_post(id).await?;
        if !actor.may_modify(post.author_id) {
            return Err(DomainError::Unauthorized(format!("delete post {}", id)));
        }

        let post = &post;
        let plan = self
            .commit_cascade(move || self.integrity.plan_post_removal(post), &[])
            .await?;
        info!(post_id = %id, comments = plan.comments, "post deleted with cascade");
        Ok(())
    }

    // ---- comments ----

    /// Comments of one post, or the most recent comments site-wide.
    pub async fn list_comments(&self, post_id: Option<Uuid>) -> DomainResult<Vec<Comment>> {
        match post_id {
            Some(post_id) => {
                self.load_post(post_id).await?;
                Ok(self.repo.comments_of_post(post_id).await?)
            }
            None => Ok(self.repo.recent_comments(MAX_PAGE_LIMIT).await?),
        }
    }

    pub async fn get_comment(&self, id: Uuid) -> DomainResult<Comment> {
        self.load_comment(id).await
    }

    #[instrument(skip(self, input, actor), fields(post_id = %input.post_id))]
    pub async fn create_comment(
        &self,
        input: NewComment,
        actor: Option<&Actor>,
    ) -> DomainResult<Comment> {
        let actor = require_actor(actor)?;
        self.ensure_user(actor.user_id).await?;

        let comment = Comment::new(actor.user_id, input)?;
        self.integrity.check_new_comment(&comment).await?;

        let counter = Counter::PostComments(comment.post_id);
        let batch = WriteBatch::new()
            .with(Mutation::InsertComment(comment.clone()))
            .with(CounterMaintenance::increment(counter));
        self.counters
            .commit_with_repair(batch, &[counter])
            .await
            .map_err(|e| match e {
                // The post or parent vanished between the check and the commit.
                RepoError::Constraint(_) => DomainError::not_found("post", comment.post_id),
                other => other.into(),
            })?;

        info!(comment_id = %comment.id, parent_id = ?comment.parent_id, "comment created");
        Ok(comment)
    }

    #[instrument(skip(self, patch, actor))]
    pub async fn update_comment(
        &self,
        id: Uuid,
        patch: CommentPatch,
        actor: Option<&Actor>,
    ) -> DomainResult<Comment> {
        let actor = require_actor(actor)?;
        let mut comment = self.load_comment(id).await?;
        if !actor.may_modify(comment.user_id) {
            return Err(DomainError::Unauthorized(format!("update comment {}", id)));
        }

        comment.apply_patch(patch)?;
        self.repo
            .commit(WriteBatch::new().with(Mutation::UpdateComment(comment)))
            .await?;
        self.load_comment(id).await
    }

    /// Remove a comment with its reply subtree and their likes, atomically.
    #[instrument(skip(self, actor))]
    pub async fn delete_comment(&self, id: Uuid, actor: Option<&Actor>) -> DomainResult<()> {
        let actor = require_actor(actor)?;
        let comment = self.load_comment(id).await?;
        if !actor.may_modify(comment.user_id) {
            return Err(DomainError::Unauthorized(format!("delete comment {}", id)));
        }

        let counter = Counter::PostComments(comment.post_id);
        let comment = &comment;
        let plan = self
            .commit_cascade(
                move || async move {
                    let mut plan = self.integrity.plan_comment_removal(comment).await?;
                    plan.batch.push(Mutation::AdjustCounter {
                        counter,
                        delta: -(plan.comments as i64),
                    });
                    Ok(plan)
                },
                &[counter],
            )
            .await?;
        info!(comment_id = %id, removed = plan.comments, "comment deleted with replies");
        Ok(())
    }

    /// Commit a cascade. A plan invalidated by a concurrent write (a reply
    /// added after planning) is rebuilt and committed once more.
    async fn commit_cascade<F, Fut>(&self, plan: F, counters: &[Counter]) -> DomainResult<CascadePlan>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = DomainResult<CascadePlan>>,
    {
        let first = plan().await?;
        match self
            .counters
            .commit_with_repair(first.batch.clone(), counters)
            .await
        {
            Ok(()) => Ok(first),
            Err(RepoError::Integrity(reason)) => {
                warn!(%reason, "cascade plan went stale; replanning");
                let second = plan().await?;
                self.counters
                    .commit_with_repair(second.batch.clone(), counters)
                    .await?;
                Ok(second)
            }
            Err(e) => Err(e.into()),
        }
    }
}
