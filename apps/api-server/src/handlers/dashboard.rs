//! Dashboard and maintenance endpoints. Admin only.

use actix_web::{HttpResponse, web};

use folio_core::DomainError;
use folio_shared::ApiResponse;
use folio_shared::dto::ReconcileResponse;

use crate::middleware::auth::Identity;
use crate::middleware::error::AppResult;
use crate::state::AppState;

fn require_admin(identity: &Identity, action: &str) -> AppResult<()> {
    if identity.0.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Unauthorized(action.to_string()).into())
    }
}

/// GET /api/dashboard/stats
pub async fn stats(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    require_admin(&identity, "view dashboard stats")?;
    let stats = state.engine.activity.dashboard_stats().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats)))
}

/// GET /api/dashboard/activity
pub async fn activity(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    require_admin(&identity, "view dashboard activity")?;
    let events = state.engine.activity.recent_activity().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(events)))
}

/// POST /api/admin/reconcile - recount every denormalized counter now.
pub async fn reconcile(
    state: web::Data<AppState>,
    identity: Identity,
) -> AppResult<HttpResponse> {
    require_admin(&identity, "reconcile counters")?;

    let report = state.engine.counters.reconcile_all().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(ReconcileResponse {
        posts: report.posts,
        comments: report.comments,
        repaired: report.repaired,
    })))
}
