//! # Folio API Server
//!
//! Actix-web front of the content engine.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Folio API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(config.database.as_ref(), config.engine).await;

    #[cfg(feature = "auth")]
    let token_service: Option<Arc<dyn folio_core::ports::TokenService>> = {
        let mut jwt = folio_infra::JwtConfig::default();
        if let Some(secret) = &config.auth.secret {
            jwt.secret = secret.clone();
        }
        if let Some(issuer) = &config.auth.issuer {
            jwt.issuer = issuer.clone();
        }
        Some(Arc::new(folio_infra::JwtTokenService::new(jwt)))
    };

    #[cfg(not(feature = "auth"))]
    let token_service: Option<Arc<dyn folio_core::ports::TokenService>> = {
        tracing::warn!("Built without auth feature - all requests are anonymous");
        None
    };

    #[cfg(feature = "scheduler")]
    let mut scheduler =
        match background::start_reconciliation(&config.reconcile, state.engine.counters.clone())
            .await
        {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                tracing::error!("Failed to start reconciliation scheduler: {}", e);
                None
            }
        };

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        let mut app = App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()));
        if let Some(tokens) = &token_service {
            app = app.app_data(web::Data::new(tokens.clone()));
        }
        app.configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!("Scheduler shutdown failed: {}", e);
        }
    }

    shutdown_database(state).await;
    result
}

async fn shutdown_database(state: AppState) {
    let Some(db) = state.db else {
        return;
    };
    // The engine's repositories hold their own pool handles; drop them first.
    drop(state.engine);

    #[cfg(feature = "postgres")]
    match Arc::try_unwrap(db) {
        Ok(connections) => {
            if let Err(e) = connections.close().await {
                tracing::warn!("Database close failed: {}", e);
            }
        }
        Err(_) => tracing::warn!("Database handle still shared at shutdown; dropping it"),
    };

    #[cfg(not(feature = "postgres"))]
    drop(db);
}
