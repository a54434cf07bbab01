//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Partial post update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    /// Re-derive the slug from the (new) title.
    #[serde(default)]
    pub regenerate_slug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(alias = "post")]
    pub post_id: Uuid,
    pub content: String,
    #[serde(default, alias = "parent")]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// Link to an adjacent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageLink>,
}

/// One page of posts, projected to the requested fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPostsResponse {
    pub count: usize,
    pub total: u64,
    pub pagination: PaginationInfo,
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub total_likes: u64,
}

/// Result of a manual counter reconciliation sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub posts: u64,
    pub comments: u64,
    pub repaired: u64,
}
