/// In-memory store backend
///
/// Keeps all three tables in one `Vec`-backed snapshot behind a
/// `tokio::sync::Mutex`. A unit of work holds the lock for its whole lifetime
/// and edits a private copy of the tables; `commit` writes the copy back and
/// dropping the unit of work throws it away. Units of work are therefore
/// fully serialized, which is stricter than Postgres but never weaker.
///
/// The unique constraints, foreign keys and the project-to-flag cascade of
/// the SQL schema are enforced here by hand and report the same constraint
/// names, so handlers behave identically on both backends.
///
/// Do not call [`Database::begin`] again while a unit of work from the same
/// database is alive on the current task; the second call waits forever.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    constraints, Database, FeatureFlagRepository, ProjectRepository, StoreError, UnitOfWork,
    UserRepository,
};
use crate::models::{
    feature_flag::{FeatureFlag, FeatureFlagChanges, FeatureFlagFilter, NewFeatureFlag},
    project::{NewProject, Project, ProjectChanges, ProjectFilter},
    user::{NewUser, User, UserChanges},
    Pagination,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    flags: Vec<FeatureFlag>,
}

/// Process-local database
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Unit of work over a locked copy of the tables
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemoryUnitOfWork {
    fn project_ids_owned_by(&self, owner_id: Uuid) -> Vec<Uuid> {
        self.working
            .projects
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .map(|p| p.id)
            .collect()
    }

    fn check_user_unique(
        &self,
        email: Option<&str>,
        username: Option<&str>,
        except: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let others = self
            .working
            .users
            .iter()
            .filter(|u| Some(u.id) != except);

        for user in others {
            if email == Some(user.email.as_str()) {
                return Err(StoreError::unique(constraints::USERS_EMAIL));
            }
            if username == Some(user.username.as_str()) {
                return Err(StoreError::unique(constraints::USERS_USERNAME));
            }
        }
        Ok(())
    }

    fn check_flag_name_unique(
        &self,
        project_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<(), StoreError> {
        let taken = self
            .working
            .flags
            .iter()
            .any(|f| f.project_id == project_id && f.name == name && Some(f.id) != except);

        if taken {
            return Err(StoreError::unique(constraints::FLAGS_PROJECT_NAME));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUnitOfWork {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&mut self, page: Pagination) -> Result<Vec<User>, StoreError> {
        Ok(page.apply(self.working.users.iter().cloned()))
    }

    async fn insert_user(&mut self, new: NewUser) -> Result<User, StoreError> {
        self.check_user_unique(Some(&new.email), Some(&new.username), None)?;

        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(
        &mut self,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        self.check_user_unique(changes.email.as_deref(), changes.username.as_deref(), Some(id))?;

        let Some(user) = self.working.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if !changes.is_empty() {
            changes.apply_to(user, Utc::now());
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        if self.working.projects.iter().any(|p| p.owner_id == id) {
            return Err(StoreError::foreign_key(constraints::PROJECTS_OWNER));
        }
        if self.working.flags.iter().any(|f| f.created_by_id == id) {
            return Err(StoreError::foreign_key(constraints::FLAGS_CREATED_BY));
        }

        let Some(index) = self.working.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        Ok(Some(self.working.users.remove(index)))
    }
}

#[async_trait]
impl ProjectRepository for MemoryUnitOfWork {
    async fn find_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.working.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_projects(
        &mut self,
        filter: ProjectFilter,
        page: Pagination,
    ) -> Result<Vec<Project>, StoreError> {
        Ok(page.apply(
            self.working
                .projects
                .iter()
                .filter(|p| filter.matches(p))
                .cloned(),
        ))
    }

    async fn insert_project(&mut self, new: NewProject) -> Result<Project, StoreError> {
        if !self.working.users.iter().any(|u| u.id == new.owner_id) {
            return Err(StoreError::foreign_key(constraints::PROJECTS_OWNER));
        }

        let project = Project {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            owner_id: new.owner_id,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.projects.push(project.clone());
        Ok(project)
    }

    async fn update_project(
        &mut self,
        id: Uuid,
        changes: &ProjectChanges,
    ) -> Result<Option<Project>, StoreError> {
        let Some(project) = self.working.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if !changes.is_empty() {
            changes.apply_to(project, Utc::now());
        }
        Ok(Some(project.clone()))
    }

    async fn delete_project(&mut self, id: Uuid) -> Result<Option<Project>, StoreError> {
        let Some(index) = self.working.projects.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        self.working.flags.retain(|f| f.project_id != id);
        Ok(Some(self.working.projects.remove(index)))
    }
}

#[async_trait]
impl FeatureFlagRepository for MemoryUnitOfWork {
    async fn find_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        Ok(self.working.flags.iter().find(|f| f.id == id).cloned())
    }

    async fn find_flag_by_name(
        &mut self,
        project_id: Uuid,
        name: &str,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        Ok(self
            .working
            .flags
            .iter()
            .find(|f| f.project_id == project_id && f.name == name)
            .cloned())
    }

    async fn list_flags(
        &mut self,
        filter: FeatureFlagFilter,
        page: Pagination,
    ) -> Result<Vec<FeatureFlag>, StoreError> {
        let owned = filter.owner_id.map(|owner| self.project_ids_owned_by(owner));

        let matching = self.working.flags.iter().filter(|f| {
            filter.project_id.map_or(true, |id| f.project_id == id)
                && filter.environment.map_or(true, |env| f.environment == env)
                && owned.as_ref().map_or(true, |ids| ids.contains(&f.project_id))
        });

        Ok(page.apply(matching.cloned()))
    }

    async fn insert_flag(&mut self, new: NewFeatureFlag) -> Result<FeatureFlag, StoreError> {
        if !self.working.projects.iter().any(|p| p.id == new.project_id) {
            return Err(StoreError::foreign_key(constraints::FLAGS_PROJECT));
        }
        if !self.working.users.iter().any(|u| u.id == new.created_by_id) {
            return Err(StoreError::foreign_key(constraints::FLAGS_CREATED_BY));
        }
        self.check_flag_name_unique(new.project_id, &new.name, None)?;

        let flag = FeatureFlag {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            is_enabled: new.is_enabled,
            environment: new.environment,
            project_id: new.project_id,
            created_by_id: new.created_by_id,
            user_group_targeting: new.user_group_targeting,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.flags.push(flag.clone());
        Ok(flag)
    }

    async fn update_flag(
        &mut self,
        id: Uuid,
        changes: &FeatureFlagChanges,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        let Some(project_id) = self
            .working
            .flags
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.project_id)
        else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            self.check_flag_name_unique(project_id, name, Some(id))?;
        }

        let Some(flag) = self.working.flags.iter_mut().find(|f| f.id == id) else {
            return Ok(None);
        };
        if !changes.is_empty() {
            changes.apply_to(flag, Utc::now());
        }
        Ok(Some(flag.clone()))
    }

    async fn delete_flag(&mut self, id: Uuid) -> Result<Option<FeatureFlag>, StoreError> {
        let Some(index) = self.working.flags.iter().position(|f| f.id == id) else {
            return Ok(None);
        };
        Ok(Some(self.working.flags.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{feature_flag::Environment, user::UserRole};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{}@example.com", name),
            username: name.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role: UserRole::Developer,
        }
    }

    fn new_flag(project_id: Uuid, created_by_id: Uuid, name: &str, env: Environment) -> NewFeatureFlag {
        NewFeatureFlag {
            name: name.to_string(),
            description: None,
            is_enabled: false,
            environment: env,
            project_id,
            created_by_id,
            user_group_targeting: None,
        }
    }

    async fn seed(db: &MemoryDatabase) -> (User, Project) {
        let mut uow = db.begin().await.unwrap();
        let owner = uow.insert_user(new_user("owner")).await.unwrap();
        let project = uow
            .insert_project(NewProject {
                name: "Web App".to_string(),
                description: None,
                owner_id: owner.id,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        (owner, project)
    }

    #[tokio::test]
    async fn test_commit_makes_changes_visible() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;

        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.find_user(owner.id).await.unwrap(), Some(owner));
        assert_eq!(uow.find_project(project.id).await.unwrap(), Some(project));
    }

    #[tokio::test]
    async fn test_drop_discards_changes() {
        let db = MemoryDatabase::new();

        {
            let mut uow = db.begin().await.unwrap();
            uow.insert_user(new_user("ghost")).await.unwrap();
        }

        let mut uow = db.begin().await.unwrap();
        assert!(uow.find_user_by_username("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();
        uow.insert_user(new_user("alice")).await.unwrap();

        let err = uow.insert_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == constraints::USERS_EMAIL));

        let mut other = new_user("alice");
        other.email = "other@example.com".to_string();
        let err = uow.insert_user(other).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == constraints::USERS_USERNAME));
    }

    #[tokio::test]
    async fn test_update_user_rejects_taken_email() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();
        let alice = uow.insert_user(new_user("alice")).await.unwrap();
        uow.insert_user(new_user("bob")).await.unwrap();

        let changes = UserChanges {
            email: Some("bob@example.com".to_string()),
            ..Default::default()
        };
        assert!(uow.update_user(alice.id, &changes).await.is_err());

        // Re-submitting one's own email is not a conflict
        let changes = UserChanges {
            email: Some("alice@example.com".to_string()),
            ..Default::default()
        };
        let updated = uow.update_user(alice.id, &changes).await.unwrap().unwrap();
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();

        let changes = ProjectChanges {
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert!(uow.update_project(Uuid::new_v4(), &changes).await.unwrap().is_none());
        assert!(uow.delete_flag(Uuid::new_v4()).await.unwrap().is_none());
        assert!(uow.delete_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flag_name_unique_per_project_across_environments() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        uow.insert_flag(new_flag(project.id, owner.id, "checkout_v2", Environment::Dev))
            .await
            .unwrap();

        let err = uow
            .insert_flag(new_flag(project.id, owner.id, "checkout_v2", Environment::Prod))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { ref constraint } if constraint == constraints::FLAGS_PROJECT_NAME));

        // Same name in a different project is fine
        let other = uow
            .insert_project(NewProject {
                name: "Mobile".to_string(),
                description: None,
                owner_id: owner.id,
            })
            .await
            .unwrap();
        uow.insert_flag(new_flag(other.id, owner.id, "checkout_v2", Environment::Dev))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rename_flag_onto_existing_name() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        uow.insert_flag(new_flag(project.id, owner.id, "a", Environment::Dev))
            .await
            .unwrap();
        let b = uow
            .insert_flag(new_flag(project.id, owner.id, "b", Environment::Dev))
            .await
            .unwrap();

        let changes = FeatureFlagChanges {
            name: Some("a".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            uow.update_flag(b.id, &changes).await,
            Err(StoreError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_user_blocked_by_owned_project() {
        let db = MemoryDatabase::new();
        let (owner, _) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        let err = uow.delete_user(owner.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { ref constraint } if constraint == constraints::PROJECTS_OWNER));
        assert!(uow.find_user(owner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_user_blocked_by_authored_flag() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        let mut admin = new_user("admin");
        admin.role = UserRole::Admin;
        let admin = uow.insert_user(admin).await.unwrap();
        uow.insert_flag(new_flag(project.id, admin.id, "by_admin", Environment::Staging))
            .await
            .unwrap();

        let err = uow.delete_user(admin.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { ref constraint } if constraint == constraints::FLAGS_CREATED_BY));
        assert!(uow.find_user(owner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_project_requires_owner() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();

        let err = uow
            .insert_project(NewProject {
                name: "Orphan".to_string(),
                description: None,
                owner_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_delete_project_cascades_to_flags() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        let flag = uow
            .insert_flag(new_flag(project.id, owner.id, "f", Environment::Dev))
            .await
            .unwrap();

        let deleted = uow.delete_project(project.id).await.unwrap();
        assert_eq!(deleted.map(|p| p.id), Some(project.id));
        assert!(uow.find_flag(flag.id).await.unwrap().is_none());

        // With its project gone the owner can be deleted too
        assert!(uow.delete_user(owner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_flags_filters_and_paginates() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();

        for i in 0..150 {
            let env = if i % 3 == 0 { Environment::Prod } else { Environment::Dev };
            uow.insert_flag(new_flag(project.id, owner.id, &format!("flag_{}", i), env))
                .await
                .unwrap();
        }

        let filter = FeatureFlagFilter {
            project_id: Some(project.id),
            ..Default::default()
        };
        let first = uow.list_flags(filter, Pagination::new(0, 100)).await.unwrap();
        let second = uow.list_flags(filter, Pagination::new(100, 100)).await.unwrap();
        assert_eq!(first.len(), 100);
        assert_eq!(second.len(), 50);
        assert_eq!(first[0].name, "flag_0");
        assert_eq!(second[0].name, "flag_100");

        let prod = FeatureFlagFilter {
            environment: Some(Environment::Prod),
            ..filter
        };
        assert_eq!(uow.list_flags(prod, Pagination::default()).await.unwrap().len(), 50);

        let stranger = FeatureFlagFilter {
            owner_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(uow.list_flags(stranger, Pagination::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_projects_by_owner() {
        let db = MemoryDatabase::new();
        let (owner, project) = seed(&db).await;
        let mut uow = db.begin().await.unwrap();
        let other = uow.insert_user(new_user("other")).await.unwrap();
        uow.insert_project(NewProject {
            name: "Theirs".to_string(),
            description: None,
            owner_id: other.id,
        })
        .await
        .unwrap();

        let all = uow
            .list_projects(ProjectFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let mine = uow
            .list_projects(ProjectFilter::owned_by(owner.id), Pagination::default())
            .await
            .unwrap();
        assert_eq!(mine, vec![project]);
    }
}
