//! Like toggling.
//!
//! Each (user, target) pair is either `NotLiked` or `Liked`; a toggle flips
//! it and moves the target's like counter by one in the same batch. Toggles
//! on the same pair are serialized in-process, and the store's uniqueness
//! rule on likes settles races between processes.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::{Actor, Like, LikeKey, LikeOutcome, LikeState, LikeTarget};
use crate::error::{DomainError, DomainResult, RepoError};
use crate::ports::{ContentRepository, Counter, Mutation, UserRepository, WriteBatch};
use crate::services::counters::CounterMaintenance;
use crate::services::locks::KeyedLocks;

#[derive(Clone)]
pub struct LikeToggle {
    repo: Arc<dyn ContentRepository>,
    users: Arc<dyn UserRepository>,
    counters: CounterMaintenance,
    locks: Arc<KeyedLocks<LikeKey>>,
}

impl LikeToggle {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        counters: CounterMaintenance,
    ) -> Self {
        Self {
            repo,
            users,
            counters,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub async fn toggle_post_like(
        &self,
        post_id: uuid::Uuid,
        actor: Option<&Actor>,
    ) -> DomainResult<LikeOutcome> {
        self.toggle(LikeTarget::Post(post_id), actor).await
    }

    pub async fn toggle_comment_like(
        &self,
        comment_id: uuid::Uuid,
        actor: Option<&Actor>,
    ) -> DomainResult<LikeOutcome> {
        self.toggle(LikeTarget::Comment(comment_id), actor).await
    }

    /// Current state of a pair, without changing it.
    pub async fn state(&self, key: LikeKey) -> DomainResult<LikeState> {
        Ok(match self.repo.find_like(key).await? {
            Some(_) => LikeState::Liked,
            None => LikeState::NotLiked,
        })
    }

    #[instrument(skip_all, fields(kind = target.kind(), target_id = %target.id()))]
    pub async fn toggle(
        &self,
        target: LikeTarget,
        actor: Option<&Actor>,
    ) -> DomainResult<LikeOutcome> {
        let actor = actor.ok_or(DomainError::Unauthenticated)?;
        if self.users.find_by_id(actor.user_id).await?.is_none() {
            return Err(DomainError::not_found("user", actor.user_id));
        }
        self.like_count(target).await?;

        let key = LikeKey {
            user_id: actor.user_id,
            target,
        };
        let _serialized = self.locks.lock(key).await;

        let intended = self.state(key).await?.flipped();
        let mut from = intended.flipped();
        let mut converged = false;

        for attempt in 0..2 {
            match self
                .counters
                .commit_with_repair(Self::transition(key, from), &[Counter::likes_of(target)])
                .await
            {
                Ok(()) => {
                    converged = true;
                    break;
                }
                // Another writer got to the row first.
                Err(RepoError::Constraint(_) | RepoError::NotFound) => {
                    warn!(attempt, user_id = %key.user_id, "like toggle raced; re-checking state");
                    self.like_count(target).await?;
                    let now = self.state(key).await?;
                    if now == intended {
                        converged = true;
                        break;
                    }
                    from = now;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !converged {
            return Err(DomainError::Conflict(format!(
                "like on {} kept changing concurrently",
                target
            )));
        }

        let total_likes = self.like_count(target).await?;
        let liked = intended == LikeState::Liked;
        info!(user_id = %key.user_id, liked, total_likes, "like toggled");
        Ok(LikeOutcome { liked, total_likes })
    }

    fn transition(key: LikeKey, from: LikeState) -> WriteBatch {
        let counter = Counter::likes_of(key.target);
        match from {
            LikeState::NotLiked => WriteBatch::new()
                .with(Mutation::InsertLike(Like::new(key)))
                .with(CounterMaintenance::increment(counter)),
            LikeState::Liked => WriteBatch::new()
                .with(Mutation::DeleteLike(key))
                .with(CounterMaintenance::decrement(counter)),
        }
    }

    /// Stored like counter of the target; `NotFound` if the target is gone.
    async fn like_count(&self, target: LikeTarget) -> DomainResult<u64> {
        match target {
            LikeTarget::Post(id) => self
                .repo
                .find_post(id)
                .await?
                .map(|p| p.like_count)
                .ok_or_else(|| DomainError::not_found("post", id)),
            LikeTarget::Comment(id) => self
                .repo
                .find_comment(id)
                .await?
                .map(|c| c.like_count)
                .ok_or_else(|| DomainError::not_found("comment", id)),
        }
    }
}
