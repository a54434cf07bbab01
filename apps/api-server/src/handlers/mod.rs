//! HTTP handlers and route configuration.

mod comments;
mod dashboard;
mod health;
mod likes;
mod posts;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    // Fixed segments before `/{id}`.
                    .route("/featured", web::get().to(posts::featured_posts))
                    .route("/category/{category}", web::get().to(posts::posts_by_category))
                    .route("/user/{user_id}", web::get().to(posts::posts_by_author))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}", web::put().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post))
                    .route("/{id}/related", web::get().to(posts::related_posts))
                    .route("/{id}/like", web::post().to(likes::toggle_post_like)),
            )
            .service(
                web::scope("/comments")
                    .route("", web::get().to(comments::list_comments))
                    .route("", web::post().to(comments::create_comment))
                    .route("/{id}", web::get().to(comments::get_comment))
                    .route("/{id}", web::put().to(comments::update_comment))
                    .route("/{id}", web::delete().to(comments::delete_comment))
                    .route("/{id}/like", web::post().to(likes::toggle_comment_like)),
            )
            .service(
                web::scope("/dashboard")
                    .route("/stats", web::get().to(dashboard::stats))
                    .route("/activity", web::get().to(dashboard::activity)),
            )
            .route("/admin/reconcile", web::post().to(dashboard::reconcile)),
    );
}
