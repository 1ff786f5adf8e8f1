/// Project endpoints
///
/// Projects are visible to their owner and to admins. Existence is checked
/// before ownership, so a missing project is 404 for everyone.
///
/// # Endpoints
///
/// - `POST /api/v1/projects` - Create a project owned by the actor
/// - `GET /api/v1/projects?skip&limit` - List projects
/// - `GET /api/v1/projects/:project_id` - Get a project
/// - `PUT /api/v1/projects/:project_id` - Partially update a project
/// - `DELETE /api/v1/projects/:project_id` - Delete a project and its flags

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
    auth::{middleware::AuthContext, policy},
    models::{
        project::{NewProject, Project, ProjectChanges, ProjectFilter},
        Pagination,
    },
    store::{ProjectRepository, UnitOfWork},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    pub description: Option<String>,
}

/// Create project
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/projects
/// Content-Type: application/json
///
/// { "name": "Checkout", "description": "Checkout service flags" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<Project>> {
    req.validate()?;

    let mut uow = state.db.begin().await?;
    let project = uow
        .insert_project(NewProject {
            name: req.name,
            description: req.description,
            owner_id: auth.user_id(),
        })
        .await?;
    uow.commit().await?;

    tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");

    Ok(Json(project))
}

/// List projects
///
/// Admins see every project, everyone else only their own.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Project>>> {
    let filter = if auth.is_admin() {
        ProjectFilter::default()
    } else {
        ProjectFilter::owned_by(auth.user_id())
    };

    let mut uow = state.db.begin().await?;
    let projects = uow.list_projects(filter, page).await?;

    Ok(Json(projects))
}

/// Get project by ID
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner nor admin
/// - `404 Not Found`: Project doesn't exist
pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    let mut uow = state.db.begin().await?;
    let project = load_accessible_project(&mut *uow, &auth, project_id).await?;

    Ok(Json(project))
}

/// Update project
///
/// `description: null` clears the description; absent fields are kept.
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner nor admin
/// - `404 Not Found`: Project doesn't exist
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(changes): Json<ProjectChanges>,
) -> ApiResult<Json<Project>> {
    changes.validate()?;

    let mut uow = state.db.begin().await?;
    load_accessible_project(&mut *uow, &auth, project_id).await?;

    let project = uow
        .update_project(project_id, &changes)
        .await?
        .ok_or_else(project_not_found)?;
    uow.commit().await?;

    tracing::info!(project_id = %project.id, actor_id = %auth.user_id(), "Project updated");

    Ok(Json(project))
}

/// Delete project
///
/// The project's flags are deleted with it.
///
/// # Errors
///
/// - `403 Forbidden`: Actor is neither owner nor admin
/// - `404 Not Found`: Project doesn't exist
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let mut uow = state.db.begin().await?;
    load_accessible_project(&mut *uow, &auth, project_id).await?;

    uow.delete_project(project_id)
        .await?
        .ok_or_else(project_not_found)?;
    uow.commit().await?;

    tracing::info!(project_id = %project_id, actor_id = %auth.user_id(), "Project deleted");

    Ok(Json(MessageResponse::new("Project deleted successfully")))
}

/// Loads a project and checks the actor may act on it
///
/// NotFound takes precedence over Forbidden.
pub(crate) async fn load_accessible_project(
    uow: &mut dyn UnitOfWork,
    auth: &AuthContext,
    project_id: Uuid,
) -> ApiResult<Project> {
    let project = uow
        .find_project(project_id)
        .await?
        .ok_or_else(project_not_found)?;

    policy::require_project_access(&auth.user, &project)?;

    Ok(project)
}

pub(crate) fn project_not_found() -> ApiError {
    ApiError::NotFound("Project not found".to_string())
}
