/// Postgres store backend
///
/// Every unit of work is one `sqlx::Transaction`. sqlx rolls a transaction
/// back when it is dropped uncommitted, so an early `?` return in a handler
/// never leaves partial writes behind.
///
/// Partial updates are built with `QueryBuilder`: only the columns present
/// in the change set appear in the `SET` clause, plus `updated_at`.
///
/// # Example
///
/// ```no_run
/// use flagdeck_shared::db::pool::{create_pool, DatabaseConfig};
/// use flagdeck_shared::store::{postgres::PgDatabase, Database};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let db = PgDatabase::new(pool);
/// db.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{
    Database, FeatureFlagRepository, ProjectRepository, StoreError, UnitOfWork, UserRepository,
};
use crate::db::pool;
use crate::models::{
    feature_flag::{FeatureFlag, FeatureFlagChanges, FeatureFlagFilter, NewFeatureFlag},
    project::{NewProject, Project, ProjectChanges, ProjectFilter},
    user::{NewUser, User, UserChanges},
    Pagination,
};

const USER_COLUMNS: &str =
    "id, email, username, password_hash, role, is_active, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, name, description, owner_id, created_at, updated_at";

const FLAG_COLUMNS: &str = "id, name, description, is_enabled, environment, project_id, \
     created_by_id, user_group_targeting, created_at, updated_at";

/// Database backed by a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        pool::health_check(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Unit of work over one open transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Pagination) {
    qb.push(" OFFSET ")
        .push_bind(i64::from(page.skip))
        .push(" LIMIT ")
        .push_bind(i64::from(page.limit));
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgUnitOfWork {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn list_users(&mut self, page: Pagination) -> Result<Vec<User>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM users ORDER BY created_at, id",
            USER_COLUMNS
        ));
        push_page(&mut qb, page);

        let users = qb
            .build_query_as::<User>()
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(users)
    }

    async fn insert_user(&mut self, new: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, username, password_hash, role, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, TRUE, $6)
             RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.role)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(user_id = %user.id, "Inserted user row");
        Ok(user)
    }

    async fn update_user(
        &mut self,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        if changes.is_empty() {
            return self.find_user(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(email) = &changes.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(username) = &changes.username {
            qb.push(", username = ").push_bind(username.clone());
        }
        if let Some(password_hash) = &changes.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash.clone());
        }
        if let Some(role) = changes.role {
            qb.push(", role = ").push_bind(role);
        }
        if let Some(is_active) = changes.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(USER_COLUMNS);

        let user = qb
            .build_query_as::<User>()
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(user)
    }

    async fn delete_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl ProjectRepository for PgUnitOfWork {
    async fn find_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(project)
    }

    async fn list_projects(
        &mut self,
        filter: ProjectFilter,
        page: Pagination,
    ) -> Result<Vec<Project>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM projects",
            PROJECT_COLUMNS
        ));
        if let Some(owner_id) = filter.owner_id {
            qb.push(" WHERE owner_id = ").push_bind(owner_id);
        }
        qb.push(" ORDER BY created_at, id");
        push_page(&mut qb, page);

        let projects = qb
            .build_query_as::<Project>()
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(projects)
    }

    async fn insert_project(&mut self, new: NewProject) -> Result<Project, StoreError> {
        let project = sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects (id, name, description, owner_id, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.owner_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(project_id = %project.id, "Inserted project row");
        Ok(project)
    }

    async fn update_project(
        &mut self,
        id: Uuid,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError> {
        if changes.is_empty() {
            return self.find_project(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(PROJECT_COLUMNS);

        let project = qb
            .build_query_as::<Project>()
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(project)
    }

    async fn delete_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError> {
        // Flags go with it through ON DELETE CASCADE
        let project = sqlx::query_as::<_, Project>(&format!(
            "DELETE FROM projects WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(project)
    }
}

#[async_trait]
impl FeatureFlagRepository for PgUnitOfWork {
    async fn find_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        let flag = sqlx::query_as::<_, FeatureFlag>(&format!(
            "SELECT {} FROM feature_flags WHERE id = $1",
            FLAG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(flag)
    }

    async fn find_flag_by_name(
        &mut self,
        project_id: Uuid,
        name: &str,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        let flag = sqlx::query_as::<_, FeatureFlag>(&format!(
            "SELECT {} FROM feature_flags WHERE project_id = $1 AND name = $2",
            FLAG_COLUMNS
        ))
        .bind(project_id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(flag)
    }

    async fn list_flags(
        &mut self,
        filter: FeatureFlagFilter,
        page: Pagination,
    ) -> Result<Vec<FeatureFlag>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM feature_flags WHERE TRUE",
            FLAG_COLUMNS
        ));
        if let Some(project_id) = filter.project_id {
            qb.push(" AND project_id = ").push_bind(project_id);
        }
        if let Some(environment) = filter.environment {
            qb.push(" AND environment = ").push_bind(environment);
        }
        if let Some(owner_id) = filter.owner_id {
            qb.push(" AND project_id IN (SELECT id FROM projects WHERE owner_id = ")
                .push_bind(owner_id)
                .push(")");
        }
        qb.push(" ORDER BY created_at, id");
        push_page(&mut qb, page);

        let flags = qb
            .build_query_as::<FeatureFlag>()
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(flags)
    }

    async fn insert_flag(&mut self, new: NewFeatureFlag) -> Result<FeatureFlag, StoreError> {
        let flag = sqlx::query_as::<_, FeatureFlag>(&format!(
            "INSERT INTO feature_flags
                 (id, name, description, is_enabled, environment, project_id,
                  created_by_id, user_group_targeting, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            FLAG_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.is_enabled)
        .bind(new.environment)
        .bind(new.project_id)
        .bind(new.created_by_id)
        .bind(&new.user_group_targeting)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        debug!(flag_id = %flag.id, project_id = %flag.project_id, "Inserted feature flag row");
        Ok(flag)
    }

    async fn update_flag(
        &mut self,
        id: Uuid,
        changes: &FeatureFlagChanges,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        if changes.is_empty() {
            return self.find_flag(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE feature_flags SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(is_enabled) = changes.is_enabled {
            qb.push(", is_enabled = ").push_bind(is_enabled);
        }
        if let Some(environment) = changes.environment {
            qb.push(", environment = ").push_bind(environment);
        }
        if let Some(targeting) = &changes.user_group_targeting {
            qb.push(", user_group_targeting = ").push_bind(targeting.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(FLAG_COLUMNS);

        let flag = qb
            .build_query_as::<FeatureFlag>()
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(flag)
    }

    async fn delete_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        let flag = sqlx::query_as::<_, FeatureFlag>(&format!(
            "DELETE FROM feature_flags WHERE id = $1 RETURNING {}",
            FLAG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(flag)
    }
}
