use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
use uuid::Uuid;

use folio_core::domain::{Category, LikeKey, LikeTarget};
use folio_core::error::RepoError;
use folio_core::ports::{ContentRepository, Counter, Mutation, WriteBatch};
use folio_core::query::QueryBuilder;

use crate::database::entity::post;
use crate::database::postgres_repo::PostgresContentRepository;

fn post_model(id: Uuid, category: &str) -> post::Model {
    let now = Utc::now();
    post::Model {
        id,
        title: "Test Post".to_owned(),
        slug: "test-post".to_owned(),
        excerpt: "Excerpt".to_owned(),
        content: "Content".to_owned(),
        cover_image: "default-cover.jpg".to_owned(),
        category: category.to_owned(),
        tags: serde_json::json!(["rust", "web"]),
        featured: false,
        author_id: Uuid::new_v4(),
        like_count: 2,
        comment_count: 1,
        view_count: 7,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

fn exec(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

#[tokio::test]
async fn test_find_post_by_id() {
    let post_id = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![post_model(post_id, "travel")]])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let post = repo.find_post(post_id).await.unwrap().unwrap();

    assert_eq!(post.id, post_id);
    assert_eq!(post.category, Category::Travel);
    assert!(post.tags.contains("rust"));
    assert_eq!((post.like_count, post.comment_count, post.view_count), (2, 1, 7));
}

#[tokio::test]
async fn test_find_post_with_unknown_category_fails() {
    let post_id = Uuid::new_v4();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![post_model(post_id, "gardening")]])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let result = repo.find_post(post_id).await;

    assert!(matches!(result, Err(RepoError::Query(_))));
}

#[tokio::test]
async fn test_query_posts_returns_total_and_page() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![BTreeMap::from([("num_items", Value::from(12i64))])]])
        .append_query_results([vec![
            post_model(Uuid::new_v4(), "food"),
            post_model(Uuid::new_v4(), "food"),
        ]])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let query = QueryBuilder::default()
        .build([("category", "food"), ("limit", "2"), ("tags", "rust")])
        .unwrap();
    let page = repo.query_posts(&query).await.unwrap();

    assert_eq!(page.total, 12);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn test_increment_views_on_missing_post() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([exec(0)])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    assert!(repo.increment_views(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_commit_delete_missing_like_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([exec(0)])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let key = LikeKey {
        user_id: Uuid::new_v4(),
        target: LikeTarget::Post(Uuid::new_v4()),
    };
    let result = repo
        .commit(WriteBatch::new().with(Mutation::DeleteLike(key)))
        .await;

    assert!(matches!(result, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn test_commit_rejects_counter_going_negative() {
    let post_id = Uuid::new_v4();
    // Guarded update matches nothing; the owner row still exists.
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([exec(0)])
        .append_query_results([vec![post_model(post_id, "news")]])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let result = repo
        .commit(WriteBatch::new().with(Mutation::AdjustCounter {
            counter: Counter::PostLikes(post_id),
            delta: -1,
        }))
        .await;

    assert!(matches!(result, Err(RepoError::Integrity(_))));
}

#[tokio::test]
async fn test_commit_adjusts_counter() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([exec(1)])
        .into_connection();

    let repo = PostgresContentRepository::new(db);
    let result = repo
        .commit(WriteBatch::new().with(Mutation::AdjustCounter {
            counter: Counter::PostComments(Uuid::new_v4()),
            delta: 1,
        }))
        .await;

    assert!(result.is_ok());
}
