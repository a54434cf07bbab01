//! Comment endpoints.

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use folio_core::domain::{CommentPatch, NewComment};
use folio_shared::ApiResponse;
use folio_shared::dto::{CreateCommentRequest, UpdateCommentRequest};

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsQuery {
    #[serde(alias = "post")]
    pub post_id: Option<Uuid>,
}

/// GET /api/comments?postId={id} - without a post, the most recent comments.
pub async fn list_comments(
    state: web::Data<AppState>,
    query: web::Query<ListCommentsQuery>,
) -> AppResult<HttpResponse> {
    let comments = state.engine.store.list_comments(query.post_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(comments)))
}

/// GET /api/comments/{id}
pub async fn get_comment(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let comment = state.engine.store.get_comment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(comment)))
}

/// POST /api/comments
pub async fn create_comment(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    body: web::Json<CreateCommentRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let input = NewComment {
        post_id: req.post_id,
        content: req.content,
        parent_id: req.parent_id,
    };

    let comment = state
        .engine
        .store
        .create_comment(input, identity.actor())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(comment)))
}

/// PUT /api/comments/{id}
pub async fn update_comment(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCommentRequest>,
) -> AppResult<HttpResponse> {
    let patch = CommentPatch {
        content: Some(body.into_inner().content),
    };
    let comment = state
        .engine
        .store
        .update_comment(path.into_inner(), patch, identity.actor())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(comment)))
}

/// DELETE /api/comments/{id} - replies go with it.
pub async fn delete_comment(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    state
        .engine
        .store
        .delete_comment(path.into_inner(), identity.actor())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Comment deleted")))
}
