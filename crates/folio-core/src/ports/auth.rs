//! Identity ports. Credentials are issued elsewhere; content only validates them.

use uuid::Uuid;

use crate::domain::{Actor, Role};

/// Claims carried by a validated access token.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub exp: i64,
}

impl TokenClaims {
    pub fn actor(&self) -> Actor {
        let role = if self.roles.iter().any(|r| r == "admin") {
            Role::Admin
        } else {
            Role::User
        };
        Actor::new(self.user_id, role)
    }
}

/// Token validation service.
pub trait TokenService: Send + Sync {
    /// Validate and decode a token.
    fn validate_token(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuth,
}
