/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/signup` - Register a new user
/// - `POST /api/v1/auth/token` - OAuth2 password flow, form encoded
/// - `POST /api/v1/auth/login` - Same as `/token` with a JSON body
/// - `GET /api/v1/auth/me` - The authenticated user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Form, Json};
use flagdeck_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{NewUser, User, UserRole},
    store::UserRepository,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Username must be 1-100 characters"))]
    pub username: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Defaults to `developer`
    pub role: Option<UserRole>,
}

/// Credentials for `/auth/token` (form) and `/auth/login` (JSON)
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    /// Always "bearer"
    pub token_type: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/signup
/// Content-Type: application/json
///
/// {
///   "email": "dev@example.com",
///   "username": "dev",
///   "password": "correct-horse",
///   "role": "developer"
/// }
/// ```
///
/// # Response
///
/// The created user, without its password hash.
///
/// # Errors
///
/// - `409 Conflict`: Email or username already taken
/// - `422 Unprocessable Entity`: Validation failed
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;
    password::validate_password_length(&req.password)
        .map_err(|msg| ApiError::validation("password", msg))?;

    let mut uow = state.db.begin().await?;

    if uow.find_user_by_email(&req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if uow.find_user_by_username(&req.username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;

    // The unique constraints still catch a concurrent signup that slips past
    // the checks above
    let user = uow
        .insert_user(NewUser {
            email: req.email,
            username: req.username,
            password_hash,
            role: req.role.unwrap_or_default(),
        })
        .await?;
    uow.commit().await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok(Json(user))
}

/// OAuth2 password flow token endpoint
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/token
/// Content-Type: application/x-www-form-urlencoded
///
/// username=dev&password=correct-horse
/// ```
///
/// # Response
///
/// ```json
/// { "access_token": "eyJ...", "token_type": "bearer" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Incorrect username or password
/// - `403 Forbidden`: Account is inactive
pub async fn token(
    State(state): State<AppState>,
    Form(req): Form<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    issue_token(&state, req).await.map(Json)
}

/// JSON variant of [`token`]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    issue_token(&state, req).await.map(Json)
}

/// Returns the authenticated user
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<User> {
    Json(auth.user)
}

async fn issue_token(state: &AppState, req: LoginRequest) -> ApiResult<TokenResponse> {
    let user = {
        let mut uow = state.db.begin().await?;
        uow.find_user_by_username(&req.username).await?
    };

    let invalid = || ApiError::Unauthorized("Incorrect username or password".to_string());

    let user = user.ok_or_else(invalid)?;
    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("Inactive user".to_string()));
    }

    let claims = jwt::Claims::new(
        user.id,
        &user.username,
        user.role,
        state.config.jwt.access_token_ttl(),
    );
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "Access token issued");

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    })
}
