/// Access policy
///
/// Pure ownership and role decisions. Nothing here touches the store: the
/// caller loads the actor, the target and its parent project first, and
/// existence is always checked before permission so a missing record is a
/// 404 for everyone.
///
/// # Rules
///
/// - A project is accessible to its owner and to admins.
/// - A flag is accessible exactly when its parent project is; flags carry
///   no ownership of their own (`created_by_id` is informational).
/// - User administration requires the admin role, with no ownership
///   fallback.
///
/// # Example
///
/// ```
/// use flagdeck_shared::auth::policy::{require_project_access, AuthzError};
/// # use flagdeck_shared::models::{project::Project, user::{User, UserRole}};
/// # use chrono::Utc;
/// # use uuid::Uuid;
/// # let user = |role| User {
/// #     id: Uuid::new_v4(), email: String::new(), username: String::new(),
/// #     password_hash: String::new(), role, is_active: true,
/// #     created_at: Utc::now(), updated_at: None,
/// # };
/// let owner = user(UserRole::Developer);
/// let stranger = user(UserRole::Developer);
/// let project = Project {
///     id: Uuid::new_v4(),
///     name: "Web App".to_string(),
///     description: None,
///     owner_id: owner.id,
///     created_at: Utc::now(),
///     updated_at: None,
/// };
///
/// assert!(require_project_access(&owner, &project).is_ok());
/// assert!(matches!(
///     require_project_access(&stranger, &project),
///     Err(AuthzError::NotProjectOwner { .. })
/// ));
/// ```

use uuid::Uuid;

use crate::models::{feature_flag::FeatureFlag, project::Project, user::User};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Actor neither owns the project nor is an admin
    #[error("Not enough permissions for project {project_id}")]
    NotProjectOwner { project_id: Uuid },

    /// Admin role required
    #[error("Admin role required")]
    NotAdmin,
}

pub fn can_access_project(actor: &User, project: &Project) -> bool {
    actor.is_admin() || actor.id == project.owner_id
}

/// `project` must be the flag's parent; any other project denies access
pub fn can_access_flag(actor: &User, flag: &FeatureFlag, project: &Project) -> bool {
    flag.project_id == project.id && can_access_project(actor, project)
}

pub fn require_admin(actor: &User) -> bool {
    actor.is_admin()
}

pub fn require_project_access(actor: &User, project: &Project) -> Result<(), AuthzError> {
    if can_access_project(actor, project) {
        Ok(())
    } else {
        Err(AuthzError::NotProjectOwner {
            project_id: project.id,
        })
    }
}

pub fn require_flag_access(
    actor: &User,
    flag: &FeatureFlag,
    project: &Project,
) -> Result<(), AuthzError> {
    if can_access_flag(actor, flag, project) {
        Ok(())
    } else {
        Err(AuthzError::NotProjectOwner {
            project_id: flag.project_id,
        })
    }
}

pub fn require_admin_role(actor: &User) -> Result<(), AuthzError> {
    if require_admin(actor) {
        Ok(())
    } else {
        Err(AuthzError::NotAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{feature_flag::Environment, user::UserRole};
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            username: Uuid::new_v4().to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn project_owned_by(owner: &User) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Web App".to_string(),
            description: None,
            owner_id: owner.id,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn flag_in(project: &Project, author: &User) -> FeatureFlag {
        FeatureFlag {
            id: Uuid::new_v4(),
            name: "new_ui_feature".to_string(),
            description: None,
            is_enabled: false,
            environment: Environment::Dev,
            project_id: project.id,
            created_by_id: author.id,
            user_group_targeting: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_owner_and_admin_access_project() {
        let owner = user(UserRole::Developer);
        let admin = user(UserRole::Admin);
        let stranger = user(UserRole::Developer);
        let project = project_owned_by(&owner);

        assert!(can_access_project(&owner, &project));
        assert!(can_access_project(&admin, &project));
        assert!(!can_access_project(&stranger, &project));
    }

    #[test]
    fn test_flag_access_follows_project() {
        let owner = user(UserRole::Developer);
        let admin = user(UserRole::Admin);
        let project = project_owned_by(&owner);

        // Authored by the admin, still accessible to the project owner
        let flag = flag_in(&project, &admin);
        assert!(can_access_flag(&owner, &flag, &project));
        assert!(can_access_flag(&admin, &flag, &project));

        // The author alone grants nothing
        let author = user(UserRole::Developer);
        let flag = flag_in(&project, &author);
        assert!(!can_access_flag(&author, &flag, &project));
    }

    #[test]
    fn test_flag_with_wrong_parent_is_denied() {
        let owner = user(UserRole::Developer);
        let project = project_owned_by(&owner);
        let other = project_owned_by(&owner);
        let flag = flag_in(&other, &owner);

        assert!(!can_access_flag(&owner, &flag, &project));
        assert_eq!(
            require_flag_access(&owner, &flag, &project),
            Err(AuthzError::NotProjectOwner {
                project_id: other.id
            })
        );
    }

    #[test]
    fn test_require_admin_has_no_ownership_fallback() {
        let developer = user(UserRole::Developer);
        let admin = user(UserRole::Admin);

        assert!(require_admin(&admin));
        assert!(!require_admin(&developer));
        assert_eq!(require_admin_role(&developer), Err(AuthzError::NotAdmin));
        assert!(require_admin_role(&admin).is_ok());
    }

    #[test]
    fn test_role_change_takes_effect() {
        let mut actor = user(UserRole::Developer);
        let project = project_owned_by(&user(UserRole::Developer));
        assert!(require_project_access(&actor, &project).is_err());

        actor.role = UserRole::Admin;
        assert!(require_project_access(&actor, &project).is_ok());
    }
}
