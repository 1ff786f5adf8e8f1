/// Request authentication
///
/// Turns an `Authorization: Bearer <token>` header into an [`AuthContext`]
/// holding the acting user. The user is loaded from the store on every
/// request, so deactivation, deletion and role changes apply immediately
/// instead of waiting for the token to expire.
///
/// The axum layer that calls [`authenticate`] lives in the API crate; it
/// inserts the context into request extensions and handlers read it back
/// with `Extension<AuthContext>`.

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::User;
use crate::store::{Database, StoreError, UserRepository};

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The acting user, as stored at the start of the request
    pub user: User,
}

impl AuthContext {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error(transparent)]
    InvalidToken(#[from] JwtError),

    /// Token is valid but its subject no longer exists
    #[error("User not found")]
    UnknownUser,

    #[error("Inactive user")]
    InactiveUser,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Extracts the token from a `Bearer` authorization header
///
/// The scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Invalid authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::InvalidFormat("Expected Bearer token".to_string())),
    }
}

/// Validates `token` and loads the active user it names
pub async fn authenticate(
    db: &dyn Database,
    token: &str,
    secret: &str,
) -> Result<AuthContext, AuthError> {
    let claims = validate_token(token, secret)?;

    // Read-only: the unit of work is dropped without commit
    let user = {
        let mut uow = db.begin().await?;
        uow.find_user(claims.sub).await?
    };

    let user = user.ok_or(AuthError::UnknownUser)?;
    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    Ok(AuthContext::new(user))
}
