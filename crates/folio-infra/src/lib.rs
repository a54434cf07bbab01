//! # Folio Infrastructure
//!
//! Concrete implementations of the ports defined in `folio-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `postgres` - PostgreSQL storage via SeaORM
//! - `auth` - JWT validation

pub mod database;
pub mod memory;

#[cfg(feature = "auth")]
pub mod auth;

pub use database::{DatabaseConfig, DatabaseConnections};
pub use memory::{InMemoryContentRepository, InMemoryUserRepository};

#[cfg(feature = "auth")]
pub use auth::{JwtConfig, JwtTokenService};

#[cfg(feature = "postgres")]
pub use database::{PostgresContentRepository, PostgresUserRepository};
