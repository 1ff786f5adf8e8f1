/// Entity repository and unit of work
///
/// Handlers never touch a connection or pool directly. They call
/// [`Database::begin`] once per request and run every repository call through
/// the returned [`UnitOfWork`], which is a database transaction on Postgres
/// and a locked working copy in memory. Dropping a unit of work without
/// calling [`UnitOfWork::commit`] discards its changes.
///
/// # Backends
///
/// - [`postgres::PgDatabase`]: production backend over a sqlx pool
/// - [`memory::MemoryDatabase`]: process-local backend that enforces the
///   same unique, foreign key and cascade rules as the SQL schema
///
/// # Example
///
/// ```
/// use flagdeck_shared::models::{user::{NewUser, UserRole}, Pagination};
/// use flagdeck_shared::store::{memory::MemoryDatabase, Database, UnitOfWork, UserRepository};
///
/// # async fn example() -> Result<(), flagdeck_shared::store::StoreError> {
/// let db = MemoryDatabase::new();
///
/// let mut uow = db.begin().await?;
/// uow.insert_user(NewUser {
///     email: "admin@example.com".to_string(),
///     username: "admin".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::Admin,
/// })
/// .await?;
/// uow.commit().await?;
///
/// let mut uow = db.begin().await?;
/// assert_eq!(uow.list_users(Pagination::default()).await?.len(), 1);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    feature_flag::{FeatureFlag, FeatureFlagChanges, FeatureFlagFilter, NewFeatureFlag},
    project::{NewProject, Project, ProjectChanges, ProjectFilter},
    user::{NewUser, User, UserChanges},
    Pagination,
};

pub mod memory;
pub mod postgres;

/// Names of the schema constraints the store reports violations for
///
/// Both backends use these names, so callers can match on them regardless
/// of which one is active.
pub mod constraints {
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const FLAGS_PROJECT_NAME: &str = "feature_flags_project_id_name_key";
    pub const PROJECTS_OWNER: &str = "projects_owner_id_fkey";
    pub const FLAGS_PROJECT: &str = "feature_flags_project_id_fkey";
    pub const FLAGS_CREATED_BY: &str = "feature_flags_created_by_id_fkey";
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A foreign key constraint rejected the write or delete
    #[error("Foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn unique(constraint: &str) -> Self {
        StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    pub fn foreign_key(constraint: &str) -> Self {
        StoreError::ForeignKeyViolation {
            constraint: constraint.to_string(),
        }
    }

    /// Human readable reason for a constraint violation, `None` otherwise
    pub fn conflict_reason(&self) -> Option<&'static str> {
        let constraint = match self {
            StoreError::UniqueViolation { constraint } => constraint.as_str(),
            StoreError::ForeignKeyViolation { constraint } => constraint.as_str(),
            StoreError::Database(_) => return None,
        };

        Some(match constraint {
            constraints::USERS_EMAIL => "Email already registered",
            constraints::USERS_USERNAME => "Username already taken",
            constraints::FLAGS_PROJECT_NAME => {
                "Feature flag with this name already exists in this project"
            }
            constraints::PROJECTS_OWNER => "User still owns projects",
            constraints::FLAGS_CREATED_BY => "User still has authored feature flags",
            constraints::FLAGS_PROJECT => "Project does not exist",
            _ => "Constraint violated",
        })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    return StoreError::UniqueViolation { constraint }
                }
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    return StoreError::ForeignKeyViolation { constraint }
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

/// Opens units of work against a backend
#[async_trait]
pub trait Database: Send + Sync {
    /// Starts a new unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;
}

/// One request's worth of repository calls
///
/// Changes become visible to other units of work only after `commit`.
#[async_trait]
pub trait UnitOfWork: UserRepository + ProjectRepository + FeatureFlagRepository + Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepository: Send {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&mut self, username: &str)
        -> Result<Option<User>, StoreError>;

    /// Users ordered by creation time
    async fn list_users(&mut self, page: Pagination) -> Result<Vec<User>, StoreError>;

    async fn insert_user(&mut self, new: NewUser) -> Result<User, StoreError>;

    async fn update_user(
        &mut self,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError>;

    /// Fails with a foreign key violation while the user owns projects or
    /// authored flags
    async fn delete_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait ProjectRepository: Send {
    async fn find_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError>;

    async fn list_projects(
        &mut self,
        filter: ProjectFilter,
        page: Pagination,
    ) -> Result<Vec<Project>, StoreError>;

    async fn insert_project(&mut self, new: NewProject) -> Result<Project, StoreError>;

    async fn update_project(
        &mut self,
        id: Uuid,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError>;

    /// Deletes the project together with its flags
    async fn delete_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError>;
}

#[async_trait]
pub trait FeatureFlagRepository: Send {
    async fn find_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError>;

    async fn find_flag_by_name(
        &mut self,
        project_id: Uuid,
        name: &str,
    ) -> Result<Option<FeatureFlag>, StoreError>;

    async fn list_flags(
        &mut self,
        filter: FeatureFlagFilter,
        page: Pagination,
    ) -> Result<Vec<FeatureFlag>, StoreError>;

    async fn insert_flag(&mut self, new: NewFeatureFlag) -> Result<FeatureFlag, StoreError>;

    async fn update_flag(
        &mut self,
        id: Uuid,
        changes: &FeatureFlagChanges,
    ) -> Result<Option<FeatureFlag>, StoreError>;

    async fn delete_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError>;
}
