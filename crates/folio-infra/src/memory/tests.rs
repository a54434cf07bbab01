use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use uuid::Uuid;

use folio_core::domain::{
    ActivityEvent, Actor, Comment, CommentPatch, Like, LikeKey, LikeState, LikeTarget,
    MAX_REPLY_DEPTH, NewComment, NewPost, Post, PostPatch, Role, User,
};
use folio_core::error::{DomainError, RepoError};
use folio_core::ports::{ContentRepository, Counter, Mutation, UserRepository, WriteBatch};
use folio_core::query::{Page, PageRequest, PostQuery};
use folio_core::{ContentEngine, EngineConfig};

use super::{InMemoryContentRepository, InMemoryUserRepository};

struct Fixture<R = InMemoryContentRepository> {
    engine: ContentEngine,
    repo: Arc<R>,
    users: Arc<InMemoryUserRepository>,
}

impl Fixture {
    fn new() -> Self {
        Self::over(Arc::new(InMemoryContentRepository::new()))
    }
}

impl<R: ContentRepository + 'static> Fixture<R> {
    fn over(repo: Arc<R>) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let engine = ContentEngine::new(repo.clone(), users.clone(), EngineConfig::default());
        Self {
            engine,
            repo,
            users,
        }
    }

    async fn user(&self, name: &str) -> Actor {
        self.user_with_role(name, Role::User).await
    }

    async fn user_with_role(&self, name: &str, role: Role) -> Actor {
        let user = User::new(
            name.to_string(),
            format!("{}@folio.test", name.to_lowercase()),
            role,
        );
        let user = self.users.save(user).await.unwrap();
        Actor::new(user.id, role)
    }

    async fn post(&self, author: &Actor, title: &str, category: &str) -> Post {
        self.engine
            .store
            .create_post(
                NewPost {
                    title: title.to_string(),
                    excerpt: format!("{} excerpt", title),
                    content: format!("{} content", title),
                    category: category.to_string(),
                    ..Default::default()
                },
                Some(author),
            )
            .await
            .unwrap()
    }

    async fn comment(&self, author: &Actor, post_id: Uuid, parent_id: Option<Uuid>) -> Comment {
        self.engine
            .store
            .create_comment(
                NewComment {
                    post_id,
                    content: "nice".to_string(),
                    parent_id,
                },
                Some(author),
            )
            .await
            .unwrap()
    }

    async fn stored_post(&self, id: Uuid) -> Post {
        self.repo.find_post(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_create_post_derives_slug_and_defaults() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;

    let post = fx.post(&author, "Hello, World Tour", "travel").await;

    assert_eq!(post.slug, "hello-world-tour");
    assert_eq!(post.cover_image, "default-cover.jpg");
    assert_eq!((post.like_count, post.comment_count, post.view_count), (0, 0, 0));
    assert_eq!(post.author_id, author.user_id);
}

#[tokio::test]
async fn test_create_post_rejects_duplicate_slug_and_anonymous() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    fx.post(&author, "Same Title", "food").await;

    let dup = fx
        .engine
        .store
        .create_post(
            NewPost {
                title: "same title".to_string(),
                excerpt: "e".to_string(),
                content: "c".to_string(),
                category: "food".to_string(),
                ..Default::default()
            },
            Some(&author),
        )
        .await;
    assert!(matches!(dup, Err(DomainError::Conflict(_))));

    let anonymous = fx.engine.store.create_post(NewPost::default(), None).await;
    assert!(matches!(anonymous, Err(DomainError::Unauthenticated)));
}

#[tokio::test]
async fn test_create_post_rejects_unknown_category() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;

    let result = fx
        .engine
        .store
        .create_post(
            NewPost {
                title: "Gadgets".to_string(),
                excerpt: "e".to_string(),
                content: "c".to_string(),
                category: "gadgets".to_string(),
                ..Default::default()
            },
            Some(&author),
        )
        .await;
    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(fx.repo.count_posts(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_post_requires_owner_or_admin() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let stranger = fx.user("Bo").await;
    let admin = fx.user_with_role("Root", Role::Admin).await;
    let post = fx.post(&author, "Original", "news").await;

    let patch = PostPatch {
        title: Some("Renamed".to_string()),
        ..Default::default()
    };
    let denied = fx
        .engine
        .store
        .update_post(post.id, patch.clone(), Some(&stranger))
        .await;
    assert!(matches!(denied, Err(DomainError::Unauthorized(_))));

    let updated = fx
        .engine
        .store
        .update_post(post.id, patch, Some(&admin))
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.slug, "original");
}

#[tokio::test]
async fn test_update_post_keeps_counters() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Counted", "news").await;
    fx.engine.likes.toggle_post_like(post.id, Some(&author)).await.unwrap();
    fx.comment(&author, post.id, None).await;

    let updated = fx
        .engine
        .store
        .update_post(
            post.id,
            PostPatch {
                content: Some("fresh".to_string()),
                ..Default::default()
            },
            Some(&author),
        )
        .await
        .unwrap();

    assert_eq!(updated.like_count, 1);
    assert_eq!(updated.comment_count, 1);
}

#[tokio::test]
async fn test_toggle_twice_restores_state() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let reader = fx.user("Bo").await;
    let post = fx.post(&author, "Likeable", "food").await;

    let first = fx.engine.likes.toggle_post_like(post.id, Some(&reader)).await.unwrap();
    assert!(first.liked);
    assert_eq!(first.total_likes, 1);

    let second = fx.engine.likes.toggle_post_like(post.id, Some(&reader)).await.unwrap();
    assert!(!second.liked);
    assert_eq!(second.total_likes, 0);
    assert_eq!(fx.stored_post(post.id).await.like_count, 0);
}

#[tokio::test]
async fn test_toggle_requires_actor_and_target() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Likeable", "food").await;

    let anonymous = fx.engine.likes.toggle_post_like(post.id, None).await;
    assert!(matches!(anonymous, Err(DomainError::Unauthenticated)));

    let missing = fx
        .engine
        .likes
        .toggle_post_like(Uuid::new_v4(), Some(&author))
        .await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_keep_counter_exact() {
    let fx = Arc::new(Fixture::new());
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Popular", "technology").await;

    let mut readers = Vec::new();
    for i in 0..12 {
        readers.push(fx.user(&format!("Reader{}", i)).await);
    }

    // Each reader toggles i+1 times, all at once.
    let calls = readers.iter().enumerate().flat_map(|(i, reader)| {
        let fx = fx.clone();
        let reader = *reader;
        (0..=i).map(move |_| {
            let fx = fx.clone();
            async move { fx.engine.likes.toggle_post_like(post.id, Some(&reader)).await }
        })
    });
    let results = join_all(calls.map(tokio::spawn)).await;
    for result in results {
        result.unwrap().unwrap();
    }

    let expected_liked = (0..readers.len()).filter(|i| (i + 1) % 2 == 1).count() as u64;
    let rows = fx.repo.count_likes(LikeTarget::Post(post.id)).await.unwrap();
    assert_eq!(rows, expected_liked);
    assert_eq!(fx.stored_post(post.id).await.like_count, rows);
}

#[tokio::test]
async fn test_comment_likes_follow_same_rules() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Thread", "news").await;
    let comment = fx.comment(&author, post.id, None).await;

    let liked = fx
        .engine
        .likes
        .toggle_comment_like(comment.id, Some(&author))
        .await
        .unwrap();
    assert!(liked.liked);
    assert_eq!(fx.repo.find_comment(comment.id).await.unwrap().unwrap().like_count, 1);
    assert_eq!(fx.stored_post(post.id).await.like_count, 0);
}

#[tokio::test]
async fn test_reply_to_comment_on_other_post_is_rejected() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let first = fx.post(&author, "First", "news").await;
    let second = fx.post(&author, "Second", "news").await;
    let parent = fx.comment(&author, first.id, None).await;

    let result = fx
        .engine
        .store
        .create_comment(
            NewComment {
                post_id: second.id,
                content: "misplaced".to_string(),
                parent_id: Some(parent.id),
            },
            Some(&author),
        )
        .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert_eq!(fx.repo.count_comments(None).await.unwrap(), 1);
    assert_eq!(fx.stored_post(second.id).await.comment_count, 0);
}

#[tokio::test]
async fn test_comment_on_missing_post_is_not_found() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;

    let result = fx
        .engine
        .store
        .create_comment(
            NewComment {
                post_id: Uuid::new_v4(),
                content: "hello".to_string(),
                parent_id: None,
            },
            Some(&author),
        )
        .await;
    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_delete_comment_removes_reply_subtree() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Thread", "news").await;
    let root = fx.comment(&author, post.id, None).await;
    let reply = fx.comment(&author, post.id, Some(root.id)).await;
    let nested = fx.comment(&author, post.id, Some(reply.id)).await;
    let sibling = fx.comment(&author, post.id, None).await;
    fx.engine
        .likes
        .toggle_comment_like(nested.id, Some(&author))
        .await
        .unwrap();

    fx.engine
        .store
        .delete_comment(root.id, Some(&author))
        .await
        .unwrap();

    for id in [root.id, reply.id, nested.id] {
        assert!(fx.repo.find_comment(id).await.unwrap().is_none());
    }
    assert!(fx.repo.find_comment(sibling.id).await.unwrap().is_some());
    assert_eq!(
        fx.repo.count_likes(LikeTarget::Comment(nested.id)).await.unwrap(),
        0
    );
    assert_eq!(fx.stored_post(post.id).await.comment_count, 1);
}

#[tokio::test]
async fn test_delete_post_cascades_everything() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let reader = fx.user("Bo").await;
    let post = fx.post(&author, "Doomed", "news").await;
    let keep = fx.post(&author, "Survivor", "news").await;
    let root = fx.comment(&reader, post.id, None).await;
    let reply = fx.comment(&author, post.id, Some(root.id)).await;
    fx.engine.likes.toggle_post_like(post.id, Some(&reader)).await.unwrap();
    fx.engine.likes.toggle_comment_like(reply.id, Some(&reader)).await.unwrap();
    fx.comment(&reader, keep.id, None).await;

    let denied = fx.engine.store.delete_post(post.id, Some(&reader)).await;
    assert!(matches!(denied, Err(DomainError::Unauthorized(_))));

    fx.engine.store.delete_post(post.id, Some(&author)).await.unwrap();

    assert!(fx.repo.find_post(post.id).await.unwrap().is_none());
    assert!(fx.repo.comments_of_post(post.id).await.unwrap().is_empty());
    assert_eq!(fx.repo.count_likes(LikeTarget::Post(post.id)).await.unwrap(), 0);
    assert_eq!(fx.repo.count_likes(LikeTarget::Comment(reply.id)).await.unwrap(), 0);
    assert_eq!(fx.repo.count_comments(None).await.unwrap(), 1);

    let missing = fx.engine.store.get_post_detail(post.id).await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_pagination_slices_are_disjoint_and_contiguous() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    for i in 0..25 {
        fx.post(&author, &format!("Post {}", i), "facts").await;
    }

    let page = |n: &str, limit: &str| {
        fx.engine
            .store
            .list_posts([("page", n.to_string()), ("limit", limit.to_string())])
    };
    let all = page("1", "25").await.unwrap();
    let first = page("1", "10").await.unwrap();
    let second = page("2", "10").await.unwrap();
    let third = page("3", "10").await.unwrap();

    let ids = |items: &[Post]| items.iter().map(|p| p.id).collect::<Vec<_>>();
    let mut stitched = ids(&first.items);
    stitched.extend(ids(&second.items));
    stitched.extend(ids(&third.items));
    assert_eq!(stitched, ids(&all.items));

    assert_eq!(first.total, 25);
    assert!(first.pagination.prev.is_none());
    assert_eq!(first.pagination.next.map(|p| p.page), Some(2));
    assert_eq!(second.pagination.prev.map(|p| p.page), Some(1));
    assert!(third.pagination.next.is_none());
    assert_eq!(third.items.len(), 5);
}

#[tokio::test]
async fn test_filter_and_sort_by_category() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let a = fx.post(&author, "A", "travel").await;
    let b = fx.post(&author, "B", "food").await;
    assert!(b.created_at >= a.created_at);

    let travel = fx.engine.store.list_posts([("category", "travel")]).await.unwrap();
    assert_eq!(
        travel.items.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
        vec!["A"]
    );

    let sorted = fx.engine.store.list_posts([("sort", "-createdAt")]).await.unwrap();
    assert_eq!(
        sorted.items.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
        vec!["B", "A"]
    );

    let injected = fx.engine.store.list_posts([("content[gt]", "x")]).await;
    assert!(matches!(injected, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_detail_counts_views_but_listing_does_not() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Viewed", "health").await;
    let root = fx.comment(&author, post.id, None).await;
    fx.comment(&author, post.id, Some(root.id)).await;

    fx.engine.store.list_posts(Vec::<(&str, &str)>::new()).await.unwrap();
    assert_eq!(fx.stored_post(post.id).await.view_count, 0);

    fx.engine.store.get_post_detail(post.id).await.unwrap();
    let detail = fx.engine.store.get_post_detail(post.id).await.unwrap();
    assert_eq!(detail.post.view_count, 2);
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].replies.len(), 1);
}

#[tokio::test]
async fn test_featured_and_related_posts() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let base = fx.post(&author, "Base", "lifestyle").await;
    for i in 0..4 {
        fx.post(&author, &format!("Peer {}", i), "lifestyle").await;
    }
    fx.post(&author, "Elsewhere", "business").await;
    fx.engine
        .store
        .create_post(
            NewPost {
                title: "Spotlight".to_string(),
                excerpt: "e".to_string(),
                content: "c".to_string(),
                category: "business".to_string(),
                featured: true,
                ..Default::default()
            },
            Some(&author),
        )
        .await
        .unwrap();

    let related = fx.engine.store.related_posts(base.id).await.unwrap();
    assert_eq!(related.len(), 3);
    assert!(related.iter().all(|p| p.id != base.id && p.category == base.category));

    let featured = fx.engine.store.featured_posts().await.unwrap();
    assert_eq!(
        featured.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
        vec!["Spotlight"]
    );
}

#[tokio::test]
async fn test_activity_feed_merges_sources_in_time_order() {
    let fx = Fixture::new();
    let base = Utc::now() - Duration::hours(1);

    let mut batch = WriteBatch::new();
    for i in 0..3i64 {
        let mut user = User::new(format!("User {}", i), format!("u{}@folio.test", i), Role::User);
        user.created_at = base + Duration::seconds(i * 3);
        fx.users.save(user.clone()).await.unwrap();

        let mut post = NewPost {
            title: format!("Post {}", i),
            excerpt: "e".to_string(),
            content: "c".to_string(),
            category: "news".to_string(),
            ..Default::default()
        }
        .into_post(user.id)
        .unwrap();
        post.created_at = base + Duration::seconds(i * 3 + 1);

        let mut comment = Comment::new(
            user.id,
            NewComment {
                post_id: post.id,
                content: "first!".to_string(),
                parent_id: None,
            },
        )
        .unwrap();
        comment.created_at = base + Duration::seconds(i * 3 + 2);

        batch
            .push(Mutation::InsertPost(post.clone()))
            .push(Mutation::InsertComment(comment))
            .push(Mutation::AdjustCounter {
                counter: Counter::PostComments(post.id),
                delta: 1,
            });
    }
    fx.repo.commit(batch).await.unwrap();

    let feed = fx.engine.activity.recent_activity().await.unwrap();
    assert_eq!(feed.len(), 9);
    assert!(feed.windows(2).all(|w| w[0].time() > w[1].time()));

    let kinds: Vec<_> = feed.iter().map(ActivityEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "comment", "post", "user", "comment", "post", "user", "comment", "post", "user"
        ]
    );
    assert_eq!(feed[0].message(), "New comment on \"Post 2\" by User 2");
    assert_eq!(feed[1].message(), "New post \"Post 2\" by User 2");
    assert_eq!(feed[2].message(), "New user User 2 registered");
}

#[tokio::test]
async fn test_dashboard_stats_counts_recent_rows() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Fresh", "news").await;
    fx.comment(&author, post.id, None).await;

    let mut veteran = User::new("Old".to_string(), "old@folio.test".to_string(), Role::User);
    veteran.created_at = Utc::now() - Duration::days(30);
    fx.users.save(veteran).await.unwrap();

    let stats = fx.engine.activity.dashboard_stats().await.unwrap();
    assert_eq!(stats.posts_count, 1);
    assert_eq!(stats.comments_count, 1);
    assert_eq!(stats.users_count, 2);
    assert_eq!(stats.new_users_this_week, 1);
    assert_eq!(stats.new_posts_this_week, 1);
    assert_eq!(stats.recent_activity.len(), 4);
}

#[tokio::test]
async fn test_reconcile_repairs_drifted_counters() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Drifting", "news").await;
    fx.comment(&author, post.id, None).await;
    fx.engine.likes.toggle_post_like(post.id, Some(&author)).await.unwrap();

    fx.repo
        .commit(
            WriteBatch::new()
                .with(Mutation::AdjustCounter {
                    counter: Counter::PostLikes(post.id),
                    delta: 4,
                })
                .with(Mutation::AdjustCounter {
                    counter: Counter::PostComments(post.id),
                    delta: -1,
                }),
        )
        .await
        .unwrap();

    let report = fx.engine.counters.reconcile_all().await.unwrap();
    assert_eq!(report.posts, 1);
    assert_eq!(report.comments, 1);
    assert_eq!(report.repaired, 2);

    let repaired = fx.stored_post(post.id).await;
    assert_eq!(repaired.like_count, 1);
    assert_eq!(repaired.comment_count, 1);
}

#[tokio::test]
async fn test_unlike_repairs_counter_that_would_go_negative() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Skewed", "news").await;
    fx.engine.likes.toggle_post_like(post.id, Some(&author)).await.unwrap();

    // Counter lost its increment; the unlike's -1 is rejected, repaired, retried.
    fx.repo
        .commit(WriteBatch::new().with(Mutation::AdjustCounter {
            counter: Counter::PostLikes(post.id),
            delta: -1,
        }))
        .await
        .unwrap();

    let outcome = fx.engine.likes.toggle_post_like(post.id, Some(&author)).await.unwrap();
    assert!(!outcome.liked);
    assert_eq!(outcome.total_likes, 0);
}

#[tokio::test]
async fn test_failed_batch_leaves_no_partial_writes() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Atomic", "news").await;

    let orphan = Comment::new(
        author.user_id,
        NewComment {
            post_id: Uuid::new_v4(),
            content: "lost".to_string(),
            parent_id: None,
        },
    )
    .unwrap();
    let result = fx
        .repo
        .commit(
            WriteBatch::new()
                .with(Mutation::AdjustCounter {
                    counter: Counter::PostComments(post.id),
                    delta: 1,
                })
                .with(Mutation::InsertComment(orphan)),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(fx.stored_post(post.id).await.comment_count, 0);
}

#[tokio::test]
async fn test_failed_batch_restores_removed_rows() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Liked", "news").await;
    fx.engine.likes.toggle_post_like(post.id, Some(&author)).await.unwrap();

    let fresh = NewPost {
        title: "Never Stored".to_string(),
        excerpt: "e".to_string(),
        content: "c".to_string(),
        category: "news".to_string(),
        ..Default::default()
    }
    .into_post(author.user_id)
    .unwrap();
    let result = fx
        .repo
        .commit(
            WriteBatch::new()
                .with(Mutation::DeleteLikesOf(LikeTarget::Post(post.id)))
                .with(Mutation::AdjustCounter {
                    counter: Counter::PostLikes(post.id),
                    delta: -1,
                })
                .with(Mutation::InsertPost(fresh.clone()))
                .with(Mutation::DeleteComment(Uuid::new_v4())),
        )
        .await;

    assert!(matches!(result, Err(RepoError::NotFound)));
    assert_eq!(fx.repo.count_likes(LikeTarget::Post(post.id)).await.unwrap(), 1);
    assert_eq!(fx.stored_post(post.id).await.like_count, 1);
    assert!(fx.repo.find_post(fresh.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    fx.post(&author, "Only One", "news").await;

    let listing = fx
        .engine
        .store
        .list_posts([("page", "9223372036854775807"), ("limit", "100")])
        .await
        .unwrap();
    assert!(listing.items.is_empty());
    assert_eq!(listing.total, 1);
    assert!(listing.pagination.next.is_none());

    let by_category = fx
        .engine
        .store
        .posts_by_category("news", PageRequest::new(u64::MAX, 10))
        .await
        .unwrap();
    assert!(by_category.items.is_empty());
    assert_eq!(by_category.total, 1);
}

#[tokio::test]
async fn test_reply_depth_is_limited() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Deep", "news").await;

    let mut parent = fx.comment(&author, post.id, None).await;
    for _ in 0..MAX_REPLY_DEPTH {
        parent = fx.comment(&author, post.id, Some(parent.id)).await;
    }

    let too_deep = fx
        .engine
        .store
        .create_comment(
            NewComment {
                post_id: post.id,
                content: "one more".to_string(),
                parent_id: Some(parent.id),
            },
            Some(&author),
        )
        .await;
    assert!(matches!(too_deep, Err(DomainError::Validation(_))));
    assert_eq!(
        fx.stored_post(post.id).await.comment_count,
        MAX_REPLY_DEPTH as u64 + 1
    );

    let detail = fx.engine.store.get_post_detail(post.id).await.unwrap();
    let mut depth = 0;
    let mut level = &detail.comments;
    while let Some(thread) = level.first() {
        if thread.replies.is_empty() {
            break;
        }
        depth += 1;
        level = &thread.replies;
    }
    assert_eq!(depth, MAX_REPLY_DEPTH);
}

#[tokio::test]
async fn test_like_by_unknown_user_is_not_found() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Likeable", "food").await;
    let ghost = Actor::new(Uuid::new_v4(), Role::User);

    let result = fx.engine.likes.toggle_post_like(post.id, Some(&ghost)).await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound { entity_type: "user", id }) if id == ghost.user_id
    ));
    assert_eq!(fx.repo.count_likes(LikeTarget::Post(post.id)).await.unwrap(), 0);
    let key = LikeKey {
        user_id: ghost.user_id,
        target: LikeTarget::Post(post.id),
    };
    assert_eq!(fx.engine.likes.state(key).await.unwrap(), LikeState::NotLiked);
}

#[tokio::test]
async fn test_comment_changes_require_owner() {
    let fx = Fixture::new();
    let author = fx.user("Ana").await;
    let stranger = fx.user("Bo").await;
    let admin = fx.user_with_role("Root", Role::Admin).await;
    let post = fx.post(&author, "Thread", "news").await;
    let comment = fx.comment(&author, post.id, None).await;

    let patch = || CommentPatch {
        content: Some("edited".to_string()),
    };
    let update = fx
        .engine
        .store
        .update_comment(comment.id, patch(), Some(&stranger))
        .await;
    assert!(matches!(update, Err(DomainError::Unauthorized(_))));

    let delete = fx.engine.store.delete_comment(comment.id, Some(&stranger)).await;
    assert!(matches!(delete, Err(DomainError::Unauthorized(_))));

    let stored = fx.engine.store.get_comment(comment.id).await.unwrap();
    assert_eq!(stored.content, "nice");
    assert_eq!(fx.stored_post(post.id).await.comment_count, 1);

    let edited = fx
        .engine
        .store
        .update_comment(comment.id, patch(), Some(&admin))
        .await
        .unwrap();
    assert_eq!(edited.content, "edited");
}

#[tokio::test]
async fn test_get_missing_comment_is_not_found() {
    let fx = Fixture::new();
    let id = Uuid::new_v4();

    let result = fx.engine.store.get_comment(id).await;

    assert!(matches!(
        result,
        Err(DomainError::NotFound { entity_type: "comment", id: missing }) if missing == id
    ));
}

/// Commits one extra batch right before the first cascade delete, the way a
/// concurrent writer landing between planning and commit would.
struct InterleavedWriter {
    inner: InMemoryContentRepository,
    interleaved: Mutex<Option<WriteBatch>>,
}

impl InterleavedWriter {
    fn new() -> Self {
        Self {
            inner: InMemoryContentRepository::new(),
            interleaved: Mutex::new(None),
        }
    }

    fn interleave(&self, batch: WriteBatch) {
        *self.interleaved.lock().unwrap() = Some(batch);
    }
}

#[async_trait]
impl ContentRepository for InterleavedWriter {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        self.inner.find_post(id).await
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        self.inner.find_post_by_slug(slug).await
    }

    async fn query_posts(&self, query: &PostQuery) -> Result<Page<Post>, RepoError> {
        self.inner.query_posts(query).await
    }

    async fn post_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        self.inner.post_ids().await
    }

    async fn count_posts(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        self.inner.count_posts(since).await
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>, RepoError> {
        self.inner.find_comment(id).await
    }

    async fn comments_of_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        self.inner.comments_of_post(post_id).await
    }

    async fn replies_to(&self, comment_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        self.inner.replies_to(comment_id).await
    }

    async fn recent_comments(&self, limit: u64) -> Result<Vec<Comment>, RepoError> {
        self.inner.recent_comments(limit).await
    }

    async fn comment_ids(&self) -> Result<Vec<Uuid>, RepoError> {
        self.inner.comment_ids().await
    }

    async fn count_comments(&self, since: Option<DateTime<Utc>>) -> Result<u64, RepoError> {
        self.inner.count_comments(since).await
    }

    async fn find_like(&self, key: LikeKey) -> Result<Option<Like>, RepoError> {
        self.inner.find_like(key).await
    }

    async fn count_likes(&self, target: LikeTarget) -> Result<u64, RepoError> {
        self.inner.count_likes(target).await
    }

    async fn increment_views(&self, post_id: Uuid) -> Result<Option<Post>, RepoError> {
        self.inner.increment_views(post_id).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), RepoError> {
        let cascade = batch
            .steps()
            .iter()
            .any(|m| matches!(m, Mutation::DeleteComment(_) | Mutation::DeletePost(_)));
        let extra = if cascade {
            self.interleaved.lock().unwrap().take()
        } else {
            None
        };
        if let Some(extra) = extra {
            self.inner.commit(extra).await?;
        }
        self.inner.commit(batch).await
    }
}

fn late_comment(author: &Actor, post_id: Uuid, parent_id: Option<Uuid>) -> WriteBatch {
    let mut comment = Comment::new(
        author.user_id,
        NewComment {
            post_id,
            content: "just in time".to_string(),
            parent_id,
        },
    )
    .unwrap();
    comment.created_at = Utc::now() + Duration::seconds(1);
    WriteBatch::new()
        .with(Mutation::InsertComment(comment))
        .with(Mutation::AdjustCounter {
            counter: Counter::PostComments(post_id),
            delta: 1,
        })
}

#[tokio::test]
async fn test_comment_delete_replans_after_concurrent_reply() {
    let fx = Fixture::over(Arc::new(InterleavedWriter::new()));
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Busy Thread", "news").await;
    let root = fx.comment(&author, post.id, None).await;
    let kept = fx.comment(&author, post.id, None).await;

    fx.repo.interleave(late_comment(&author, post.id, Some(root.id)));
    fx.engine
        .store
        .delete_comment(root.id, Some(&author))
        .await
        .unwrap();

    let remaining = fx.repo.comments_of_post(post.id).await.unwrap();
    assert_eq!(remaining.iter().map(|c| c.id).collect::<Vec<_>>(), vec![kept.id]);
    assert_eq!(fx.stored_post(post.id).await.comment_count, 1);
}

#[tokio::test]
async fn test_post_delete_replans_after_concurrent_comment() {
    let fx = Fixture::over(Arc::new(InterleavedWriter::new()));
    let author = fx.user("Ana").await;
    let post = fx.post(&author, "Going Away", "news").await;

    fx.repo.interleave(late_comment(&author, post.id, None));
    fx.engine.store.delete_post(post.id, Some(&author)).await.unwrap();

    assert!(fx.repo.find_post(post.id).await.unwrap().is_none());
    assert_eq!(fx.repo.count_comments(None).await.unwrap(), 0);
}
