//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use folio_core::EngineConfig;
use folio_core::services::ActivityConfig;
use folio_infra::DatabaseConfig;

const DEFAULT_RECONCILE_CRON: &str = "0 */15 * * * *";

/// Token validation settings.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub secret: Option<String>,
    pub issuer: Option<String>,
}

/// Counter reconciliation schedule.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub enabled: bool,
    pub cron: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: DEFAULT_RECONCILE_CRON.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs the engine over the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub auth: AuthSettings,
    pub reconcile: ReconcileSettings,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| {
            let mut config = DatabaseConfig::new(url);
            config.max_connections = parsed("DB_MAX_CONNECTIONS", 100);
            config.min_connections = parsed("DB_MIN_CONNECTIONS", 10);
            config
        });

        let mut engine = EngineConfig::default();
        engine.limits.max_limit = parsed("QUERY_MAX_LIMIT", engine.limits.max_limit);
        engine.activity = ActivityConfig {
            per_source: parsed("ACTIVITY_PER_SOURCE", engine.activity.per_source),
            limit: parsed("ACTIVITY_LIMIT", engine.activity.limit),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080),
            database,
            auth: AuthSettings {
                secret: env::var("JWT_SECRET").ok(),
                issuer: env::var("JWT_ISSUER").ok(),
            },
            reconcile: ReconcileSettings {
                enabled: flag("SCHEDULER_ENABLED", true),
                cron: env::var("RECONCILE_CRON")
                    .unwrap_or_else(|_| DEFAULT_RECONCILE_CRON.to_string()),
            },
            engine,
        }
    }
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}
