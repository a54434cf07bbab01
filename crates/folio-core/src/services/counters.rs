//! Denormalized counter maintenance.
//!
//! Hot paths change counters by +1/-1 deltas inside the same batch as the
//! row they summarize. Recounting from source rows is only done on demand,
//! to repair drift.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Comment, Post};
use crate::error::{DomainResult, RepoError};
use crate::ports::{ContentRepository, Counter, Mutation, WriteBatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub posts: u64,
    pub comments: u64,
    /// Counters whose stored value differed from the recount.
    pub repaired: u64,
}

#[derive(Clone)]
pub struct CounterMaintenance {
    repo: Arc<dyn ContentRepository>,
}

impl CounterMaintenance {
    pub fn new(repo: Arc<dyn ContentRepository>) -> Self {
        Self { repo }
    }

    pub fn increment(counter: Counter) -> Mutation {
        Mutation::AdjustCounter { counter, delta: 1 }
    }

    pub fn decrement(counter: Counter) -> Mutation {
        Mutation::AdjustCounter { counter, delta: -1 }
    }

    /// Commit a batch whose deltas touch `counters`. If the store rejects it
    /// as an integrity violation, the counters are recounted from source
    /// rows and the batch is tried once more.
    pub async fn commit_with_repair(
        &self,
        batch: WriteBatch,
        counters: &[Counter],
    ) -> Result<(), RepoError> {
        match self.repo.commit(batch.clone()).await {
            Err(RepoError::Integrity(reason)) if !counters.is_empty() => {
                error!(%reason, ?counters, "integrity violation on commit; reconciling counters");
                for counter in counters {
                    self.recount(*counter).await?;
                }
                self.repo.commit(batch).await
            }
            other => other,
        }
    }

    /// Recount one counter. Returns `true` if the stored value was wrong.
    pub async fn recount(&self, counter: Counter) -> Result<bool, RepoError> {
        let before = self.stored(counter).await?;
        self.repo
            .commit(WriteBatch::new().with(Mutation::Recount(counter)))
            .await?;
        let after = self.stored(counter).await?;

        if before != after {
            warn!(?counter, before, after, "counter drift repaired");
        }
        Ok(before != after)
    }

    async fn stored(&self, counter: Counter) -> Result<u64, RepoError> {
        Ok(match counter {
            Counter::PostLikes(id) => self.post(id).await?.like_count,
            Counter::PostComments(id) => self.post(id).await?.comment_count,
            Counter::CommentLikes(id) => self.comment(id).await?.like_count,
        })
    }

    async fn post(&self, id: Uuid) -> Result<Post, RepoError> {
        self.repo.find_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn comment(&self, id: Uuid) -> Result<Comment, RepoError> {
        self.repo.find_comment(id).await?.ok_or(RepoError::NotFound)
    }

    /// Sweep every post and comment. Rows deleted during the sweep are skipped.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> DomainResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        'posts: for post_id in self.repo.post_ids().await? {
            for counter in [Counter::PostLikes(post_id), Counter::PostComments(post_id)] {
                match self.recount(counter).await {
                    Ok(repaired) => report.repaired += repaired as u64,
                    Err(RepoError::NotFound) => continue 'posts,
                    Err(e) => return Err(e.into()),
                }
            }
            report.posts += 1;
        }

        for comment_id in self.repo.comment_ids().await? {
            match self.recount(Counter::CommentLikes(comment_id)).await {
                Ok(repaired) => report.repaired += repaired as u64,
                Err(RepoError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
            report.comments += 1;
        }

        info!(
            posts = report.posts,
            comments = report.comments,
            repaired = report.repaired,
            "counter reconciliation finished"
        );
        Ok(report)
    }
}
