//! Dashboard activity feed and stats.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{ActivityEvent, Comment, DashboardStats, Post, User};
use crate::error::DomainResult;
use crate::ports::{ContentRepository, UserRepository};
use crate::query::PostQuery;

pub const DEFAULT_PER_SOURCE: u64 = 5;
pub const DEFAULT_FEED_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct ActivityConfig {
    /// Rows fetched from each source stream.
    pub per_source: u64,
    /// Events kept after merging.
    pub limit: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            per_source: DEFAULT_PER_SOURCE,
            limit: DEFAULT_FEED_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct ActivityAggregator {
    repo: Arc<dyn ContentRepository>,
    users: Arc<dyn UserRepository>,
    config: ActivityConfig,
}

impl ActivityAggregator {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        users: Arc<dyn UserRepository>,
        config: ActivityConfig,
    ) -> Self {
        Self {
            repo,
            users,
            config,
        }
    }

    /// Newest events across posts, comments and registrations.
    #[instrument(skip(self))]
    pub async fn recent_activity(&self) -> DomainResult<Vec<ActivityEvent>> {
        let per_source = self.config.per_source;
        let latest_posts = PostQuery::default().limit(per_source);
        let (posts, comments, users) = tokio::try_join!(
            self.repo.query_posts(&latest_posts),
            self.repo.recent_comments(per_source),
            self.users.recent(per_source),
        )?;

        let mut names = NameCache::new(self.users.as_ref());
        let mut post_events = Vec::with_capacity(posts.items.len());
        for post in &posts.items {
            let author = names.name_of(post.author_id).await?;
            post_events.push(post_created(post, &author));
        }

        let mut comment_events = Vec::with_capacity(comments.len());
        for comment in &comments {
            let author = names.name_of(comment.user_id).await?;
            let title = match self.repo.find_post(comment.post_id).await? {
                Some(post) => post.title,
                None => "a deleted post".to_string(),
            };
            comment_events.push(comment_created(comment, &title, &author));
        }

        let user_events: Vec<_> = users.iter().map(user_registered).collect();

        let events = merge_desc(
            vec![post_events, comment_events, user_events],
            self.config.limit,
            ActivityEvent::time,
        );
        debug!(events = events.len(), "activity feed assembled");
        Ok(events)
    }

    /// Totals, trailing seven-day counts and the activity feed.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> DomainResult<DashboardStats> {
        let week_ago = Some(Utc::now() - Duration::days(7));
        let (
            posts_count,
            users_count,
            comments_count,
            new_posts_this_week,
            new_users_this_week,
            new_comments_this_week,
        ) = tokio::try_join!(
            self.repo.count_posts(None),
            self.users.count(None),
            self.repo.count_comments(None),
            self.repo.count_posts(week_ago),
            self.users.count(week_ago),
            self.repo.count_comments(week_ago),
        )?;

        Ok(DashboardStats {
            posts_count,
            users_count,
            comments_count,
            new_posts_this_week,
            new_users_this_week,
            new_comments_this_week,
            recent_activity: self.recent_activity().await?,
        })
    }
}

fn post_created(post: &Post, author: &str) -> ActivityEvent {
    ActivityEvent::PostCreated {
        post_id: post.id,
        message: format!("New post \"{}\" by {}", post.title, author),
        time: post.created_at,
    }
}

fn comment_created(comment: &Comment, post_title: &str, author: &str) -> ActivityEvent {
    ActivityEvent::CommentCreated {
        comment_id: comment.id,
        post_id: comment.post_id,
        message: format!("New comment on \"{}\" by {}", post_title, author),
        time: comment.created_at,
    }
}

fn user_registered(user: &User) -> ActivityEvent {
    ActivityEvent::UserRegistered {
        user_id: user.id,
        message: format!("New user {} registered", user.name),
        time: user.created_at,
    }
}

struct NameCache<'a> {
    users: &'a dyn UserRepository,
    names: HashMap<Uuid, String>,
}

impl<'a> NameCache<'a> {
    fn new(users: &'a dyn UserRepository) -> Self {
        Self {
            users,
            names: HashMap::new(),
        }
    }

    async fn name_of(&mut self, id: Uuid) -> DomainResult<String> {
        if let Some(name) = self.names.get(&id) {
            return Ok(name.clone());
        }
        let name = match self.users.find_by_id(id).await? {
            Some(user) => user.name,
            None => "an unknown user".to_string(),
        };
        self.names.insert(id, name.clone());
        Ok(name)
    }
}

/// k-way merge of streams that are each sorted by `key` descending, keeping
/// the first `limit` items. Ties go to the earlier stream.
pub fn merge_desc<T, K, F>(streams: Vec<Vec<T>>, limit: usize, key: F) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut sources: Vec<_> = streams.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<T>> = Vec::with_capacity(sources.len());
    let mut heap = BinaryHeap::new();

    for (idx, source) in sources.iter_mut().enumerate() {
        let head = source.next();
        if let Some(item) = &head {
            heap.push((key(item), Reverse(idx)));
        }
        heads.push(head);
    }

    let mut merged = Vec::with_capacity(limit);
    while merged.len() < limit {
        let Some((_, Reverse(idx))) = heap.pop() else {
            break;
        };
        let Some(item) = heads[idx].take() else {
            break;
        };
        if let Some(next) = sources[idx].next() {
            debug_assert!(key(&next) <= key(&item), "stream {} is not sorted descending", idx);
            heap.push((key(&next), Reverse(idx)));
            heads[idx] = Some(next);
        }
        merged.push(item);
    }
    merged
}
