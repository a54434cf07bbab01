use actix_web::{HttpResponse, web};
use uuid::Uuid;

use folio_core::domain::LikeOutcome;
use folio_shared::ApiResponse;
use folio_shared::dto::ToggleLikeResponse;

use crate::middleware::auth::OptionalIdentity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn toggled(outcome: LikeOutcome) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(ToggleLikeResponse {
        liked: outcome.liked,
        total_likes: outcome.total_likes,
    }))
}

/// POST /api/posts/{id}/like
pub async fn toggle_post_like(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let outcome = state
        .engine
        .likes
        .toggle_post_like(path.into_inner(), identity.actor())
        .await?;
    Ok(toggled(outcome))
}

/// POST /api/comments/{id}/like
pub async fn toggle_comment_like(
    state: web::Data<AppState>,
    identity: OptionalIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let outcome = state
        .engine
        .likes
        .toggle_comment_like(path.into_inner(), identity.actor())
        .await?;
    Ok(toggled(outcome))
}
