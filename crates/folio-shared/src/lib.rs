//! # Folio Shared
//!
//! Request and response shapes of the Folio HTTP API. Kept free of server
//! dependencies so clients can compile against it.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
