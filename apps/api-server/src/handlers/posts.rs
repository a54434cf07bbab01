//! Post endpoints.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use folio_core::domain::{NewPost, PostPatch};
use folio_core::query::{PageRequest, Pagination, PostListing};
use folio_shared::ApiResponse;
use folio_shared::dto::{
    CreatePostRequest, ListPostsResponse, PageLink, PaginationInfo, UpdatePostRequest,
};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageParams {
    fn request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }
}

fn pagination_info(pagination: Pagination) -> PaginationInfo {
    let link = |r: folio_core::query::PageRef| PageLink {
        page: r.page,
        limit: r.limit,
    };
    PaginationInfo {
        next: pagination.next.map(link),
        prev: pagination.prev.map(link),
    }
}

fn listing_response(listing: PostListing) -> ListPostsResponse {
    let data = listing.projected();
    ListPostsResponse {
        count: data.len(),
        total: listing.total,
        pagination: pagination_info(listing.pagination),
        data,
    }
}

/// GET /api/posts?category=travel&sort=-createdAt&viewCount[gte]=10&page=2
pub async fn list_posts(
    state: web::Data<AppState>,
    params: web::Query<Vec<(String, String)>>,
) -> AppResult<HttpResponse> {
    let listing = state.engine.store.list_posts(params.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing_response(listing))))
}

/// GET /api/posts/featured
pub async fn featured_posts(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let posts = state.engine.store.featured_posts().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(posts)))
}

/// GET /api/posts/category/{category}
pub async fn posts_by_category(
    state: web::Data<AppState>,
    path: web::Path<String>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let listing = state
        .engine
        .store
        .posts_by_category(&path, page.request())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing_response(listing))))
}

/// GET /api/posts/user/{user_id}
pub async fn posts_by_author(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    page: web::Query<PageParams>,
) -> AppResult<HttpResponse> {
    let listing = state
        .engine
        .store
        .posts_by_author(path.into_inner(), page.request())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(listing_response(listing))))
}

/// GET /api/posts/{id} - counts as a view.
pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let detail = state.engine.store.get_post_detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(detail)))
}

/// GET /api/posts/{id}/related
pub async fn related_posts(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let posts = state.engine.store.related_posts(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(posts)))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewPost {
        title: req.title,
        excerpt: req.excerpt,
        content: req.content,
        cover_image: req.cover_image,
        category: req.category,
        tags: req.tags,
        featured: req.featured,
    };

    let post = state.engine.store.create_post(input, identity.actor()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(post)))
}

/// PUT /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = PostPatch {
        title: req.title,
        excerpt: req.excerpt,
        content: req.content,
        cover_image: req.cover_image,
        category: req.category,
        tags: req.tags,
        featured: req.featured,
        regenerate_slug: req.regenerate_slug,
    };

    let post = state
        .engine
        .store
        .update_post(path.into_inner(), patch, identity.actor())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(post)))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .engine
        .store
        .delete_post(path.into_inner(), identity.actor())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Post deleted")))
}
