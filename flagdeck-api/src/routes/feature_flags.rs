/// Feature flag endpoints
///
/// A flag is accessible to the owner of its project and to admins. Handlers
/// load the flag, then its parent project, then check access, so a missing
/// flag is 404 regardless of who asks.
///
/// # Endpoints
///
/// - `POST /api/v1/feature-flags` - Create a flag in a project
/// - `GET /api/v1/feature-flags?project_id&environment&skip&limit` - List flags
/// - `GET /api/v1/feature-flags/project/:project_id?environment&skip&limit` - List a project's flags
/// - `GET /api/v1/feature-flags/:flag_id` - Get a flag
/// - `PUT /api/v1/feature-flags/:flag_id` - Partially update a flag
/// - `DELETE /api/v1/feature-flags/:flag_id` - Delete a flag

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{
        projects::{load_accessible_project, project_not_found},
        MessageResponse,
    },
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use flagdeck_shared::{
    auth::{middleware::AuthContext, policy},
    models::{
        feature_flag::{
            Environment, FeatureFlag, FeatureFlagChanges, FeatureFlagFilter, NewFeatureFlag,
        },
        Pagination, DEFAULT_LIMIT,
    },
    store::{FeatureFlagRepository, ProjectRepository, UnitOfWork},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create flag request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeatureFlagRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,

    /// Defaults to disabled
    #[serde(default)]
    pub is_enabled: bool,

    pub environment: Environment,

    pub user_group_targeting: Option<String>,

    pub project_id: Uuid,
}

/// Query string for flag listings
///
/// `project_id` is ignored by the per-project listing, which takes it from
/// the path.
#[derive(Debug, Deserialize)]
pub struct FlagListQuery {
    pub project_id: Option<Uuid>,

    pub environment: Option<Environment>,

    #[serde(default)]
    pub skip: u32,

    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl FlagListQuery {
    pub fn page(&self) -> Pagination {
        Pagination::new(self.skip, self.limit)
    }
}

/// Create feature flag
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/feature-flags
/// Content-Type: application/json
///
/// {
///   "name": "new_ui_feature",
///   "description": "Redesigned dashboard",
///   "is_enabled": true,
///   "environment": "dev",
///   "user_group_targeting": "{\"groups\": [\"beta_users\"]}",
///   "project_id": "uuid"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner of the project nor admin
/// - `404 Not Found`: Project doesn't exist
/// - `409 Conflict`: A flag with this name already exists in the project
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_feature_flag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateFeatureFlagRequest>,
) -> ApiResult<Json<FeatureFlag>> {
    req.validate()?;

    let mut uow = state.db.begin().await?;
    let project = load_accessible_project(&mut *uow, &auth, req.project_id).await?;

    if uow.find_flag_by_name(project.id, &req.name).await?.is_some() {
        tracing::warn!(project_id = %project.id, name = %req.name, "Duplicate flag name");
        return Err(ApiError::Conflict(
            "Feature flag with this name already exists in this project".to_string(),
        ));
    }

    // A concurrent insert that passes the check above is rejected by the
    // (project_id, name) constraint and surfaces as the same conflict
    let flag = uow
        .insert_flag(NewFeatureFlag {
            name: req.name,
            description: req.description,
            is_enabled: req.is_enabled,
            environment: req.environment,
            project_id: project.id,
            created_by_id: auth.user_id(),
            user_group_targeting: req.user_group_targeting,
        })
        .await?;
    uow.commit().await?;

    tracing::info!(
        flag_id = %flag.id,
        project_id = %flag.project_id,
        environment = %flag.environment,
        "Feature flag created"
    );

    Ok(Json(flag))
}

/// List feature flags
///
/// With `project_id` the project must exist and be accessible. Without it,
/// admins see every flag and everyone else the flags of projects they own.
pub async fn list_feature_flags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<FlagListQuery>,
) -> ApiResult<Json<Vec<FeatureFlag>>> {
    let mut uow = state.db.begin().await?;

    let filter = match query.project_id {
        Some(project_id) => {
            load_accessible_project(&mut *uow, &auth, project_id).await?;
            FeatureFlagFilter {
                project_id: Some(project_id),
                environment: query.environment,
                owner_id: None,
            }
        }
        None => FeatureFlagFilter {
            project_id: None,
            environment: query.environment,
            owner_id: (!auth.is_admin()).then_some(auth.user_id()),
        },
    };

    let flags = uow.list_flags(filter, query.page()).await?;

    Ok(Json(flags))
}

/// List the flags of one project
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner of the project nor admin
/// - `404 Not Found`: Project doesn't exist
pub async fn list_project_feature_flags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<FlagListQuery>,
) -> ApiResult<Json<Vec<FeatureFlag>>> {
    let mut uow = state.db.begin().await?;
    load_accessible_project(&mut *uow, &auth, project_id).await?;

    let filter = FeatureFlagFilter {
        project_id: Some(project_id),
        environment: query.environment,
        owner_id: None,
    };
    let flags = uow.list_flags(filter, query.page()).await?;

    Ok(Json(flags))
}

/// Get feature flag by ID
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner of the project nor admin
/// - `404 Not Found`: Flag doesn't exist
pub async fn get_feature_flag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<Json<FeatureFlag>> {
    let mut uow = state.db.begin().await?;
    let flag = load_accessible_flag(&mut *uow, &auth, flag_id).await?;

    Ok(Json(flag))
}

/// Update feature flag
///
/// # Endpoint
///
/// ```text
/// PUT /api/v1/feature-flags/:flag_id
/// Content-Type: application/json
///
/// { "is_enabled": false }
/// ```
///
/// Absent fields are kept; `null` clears `description` or
/// `user_group_targeting`. The project and author cannot be changed.
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner of the project nor admin
/// - `404 Not Found`: Flag doesn't exist
/// - `409 Conflict`: Renamed to a name already used in the project
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_feature_flag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(flag_id): Path<Uuid>,
    Json(changes): Json<FeatureFlagChanges>,
) -> ApiResult<Json<FeatureFlag>> {
    changes.validate()?;

    let mut uow = state.db.begin().await?;
    load_accessible_flag(&mut *uow, &auth, flag_id).await?;

    let flag = uow
        .update_flag(flag_id, &changes)
        .await?
        .ok_or_else(flag_not_found)?;
    uow.commit().await?;

    tracing::info!(
        flag_id = %flag.id,
        is_enabled = flag.is_enabled,
        actor_id = %auth.user_id(),
        "Feature flag updated"
    );

    Ok(Json(flag))
}

/// Delete feature flag
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner of the project nor admin
/// - `404 Not Found`: Flag doesn't exist
pub async fn delete_feature_flag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let mut uow = state.db.begin().await?;
    load_accessible_flag(&mut *uow, &auth, flag_id).await?;

    uow.delete_flag(flag_id).await?.ok_or_else(flag_not_found)?;
    uow.commit().await?;

    tracing::info!(flag_id = %flag_id, actor_id = %auth.user_id(), "Feature flag deleted");

    Ok(Json(MessageResponse::new("Feature flag deleted successfully")))
}

async fn load_accessible_flag(
    uow: &mut dyn UnitOfWork,
    auth: &AuthContext,
    flag_id: Uuid,
) -> ApiResult<FeatureFlag> {
    let flag = uow.find_flag(flag_id).await?.ok_or_else(flag_not_found)?;

    // The foreign key keeps the parent present; a miss means the row went
    // away mid-request
    let project = uow
        .find_project(flag.project_id)
        .await?
        .ok_or_else(project_not_found)?;

    policy::require_flag_access(&auth.user, &flag, &project)?;

    Ok(flag)
}

fn flag_not_found() -> ApiError {
    ApiError::NotFound("Feature flag not found".to_string())
}
