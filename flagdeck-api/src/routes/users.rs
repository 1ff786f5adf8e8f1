/// User administration endpoints
///
/// Every handler here requires the admin role.
///
/// # Endpoints
///
/// - `GET /api/v1/users?skip&limit` - List users
/// - `GET /api/v1/users/:user_id` - Get a user
/// - `PUT /api/v1/users/:user_id` - Partially update a user
/// - `DELETE /api/v1/users/:user_id` - Delete a user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use flagdeck_shared::{
    auth::{middleware::AuthContext, password, policy},
    models::{
        user::{User, UserChanges, UserRole},
        Pagination,
    },
    store::UserRepository,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Update user request
///
/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Username must be 1-100 characters"))]
    pub username: Option<String>,

    pub role: Option<UserRole>,

    pub is_active: Option<bool>,

    /// New plaintext password, re-hashed before storage
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// List users
///
/// # Errors
///
/// - `403 Forbidden`: Actor is not an admin
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<User>>> {
    policy::require_admin_role(&auth.user)?;

    let mut uow = state.db.begin().await?;
    let users = uow.list_users(page).await?;

    Ok(Json(users))
}

/// Get user by ID
///
/// # Errors
///
/// - `403 Forbidden`: Actor is not an admin
/// - `404 Not Found`: User doesn't exist
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    policy::require_admin_role(&auth.user)?;

    let mut uow = state.db.begin().await?;
    let user = uow
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Update user
///
/// # Endpoint
///
/// ```text
/// PUT /api/v1/users/:user_id
/// Content-Type: application/json
///
/// { "role": "admin", "is_active": false }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Actor is not an admin
/// - `404 Not Found`: User doesn't exist
/// - `409 Conflict`: New email or username already taken
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    policy::require_admin_role(&auth.user)?;
    req.validate()?;

    let password_hash = match &req.password {
        Some(plain) => {
            password::validate_password_length(plain)
                .map_err(|msg| ApiError::validation("password", msg))?;
            Some(password::hash_password(plain)?)
        }
        None => None,
    };

    let changes = UserChanges {
        email: req.email,
        username: req.username,
        password_hash,
        role: req.role,
        is_active: req.is_active,
    };

    let mut uow = state.db.begin().await?;
    let user = uow
        .update_user(user_id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, actor_id = %auth.user_id(), "User updated");

    Ok(Json(user))
}

/// Delete user
///
/// Blocked while the user still owns projects or authored flags.
///
/// # Errors
///
/// - `403 Forbidden`: Actor is not an admin
/// - `404 Not Found`: User doesn't exist
/// - `409 Conflict`: User is still referenced
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    policy::require_admin_role(&auth.user)?;

    let mut uow = state.db.begin().await?;
    uow.delete_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    uow.commit().await?;

    tracing::info!(user_id = %user_id, actor_id = %auth.user_id(), "User deleted");

    Ok(Json(MessageResponse::new("User deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_is_partial() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"is_active": false}"#).unwrap();
        assert_eq!(req.is_active, Some(false));
        assert!(req.email.is_none());
        assert!(req.password.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_request_validation() {
        let req = UpdateUserRequest {
            email: Some("nope".to_string()),
            password: Some("short".to_string()),
            ..Default::default()
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
