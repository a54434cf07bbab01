//! # Folio Core
//!
//! The content graph of the Folio blogging platform: posts, threaded
//! comments, likes and users, with the rules that keep them consistent.
//! Storage is reached only through the traits in [`ports`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod query;
pub mod services;

pub use error::{DomainError, DomainResult, RepoError};
pub use services::{ContentEngine, EngineConfig};
