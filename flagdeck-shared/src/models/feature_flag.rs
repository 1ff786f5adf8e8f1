/// Feature flag model
///
/// A flag is a named boolean toggle scoped to one project and one
/// environment. The name is unique within its project independent of the
/// environment, so `checkout_v2` can exist only once per project.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE flag_environment AS ENUM ('dev', 'staging', 'prod');
///
/// CREATE TABLE feature_flags (
///     id UUID PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     is_enabled BOOLEAN NOT NULL DEFAULT FALSE,
///     environment flag_environment NOT NULL,
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_by_id UUID NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
///     user_group_targeting TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ,
///     CONSTRAINT feature_flags_project_id_name_key UNIQUE (project_id, name)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::double_option;

/// Deployment stage a flag applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "flag_environment", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FeatureFlag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_enabled: bool,
    pub environment: Environment,
    pub project_id: Uuid,

    /// Author of the flag, fixed at creation
    pub created_by_id: Uuid,

    /// Opaque targeting payload, typically a serialized group list
    pub user_group_targeting: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for inserting a flag
#[derive(Debug, Clone)]
pub struct NewFeatureFlag {
    pub name: String,
    pub description: Option<String>,
    pub is_enabled: bool,
    pub environment: Environment,
    pub project_id: Uuid,
    pub created_by_id: Uuid,
    pub user_group_targeting: Option<String>,
}

/// Partial update for a flag
///
/// `project_id` and `created_by_id` cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct FeatureFlagChanges {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub is_enabled: Option<bool>,

    pub environment: Option<Environment>,

    #[serde(default, deserialize_with = "double_option")]
    pub user_group_targeting: Option<Option<String>>,
}

impl FeatureFlagChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.is_enabled.is_none()
            && self.environment.is_none()
            && self.user_group_targeting.is_none()
    }

    pub fn apply_to(&self, flag: &mut FeatureFlag, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            flag.name = name.clone();
        }
        if let Some(description) = &self.description {
            flag.description = description.clone();
        }
        if let Some(is_enabled) = self.is_enabled {
            flag.is_enabled = is_enabled;
        }
        if let Some(environment) = self.environment {
            flag.environment = environment;
        }
        if let Some(targeting) = &self.user_group_targeting {
            flag.user_group_targeting = targeting.clone();
        }
        flag.updated_at = Some(now);
    }
}

/// Listing filter for flags
///
/// `owner_id` restricts results to flags whose project is owned by that
/// user; it is how non-admin listings stay inside the actor's projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlagFilter {
    pub project_id: Option<Uuid>,
    pub environment: Option<Environment>,
    pub owner_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flag() -> FeatureFlag {
        FeatureFlag {
            id: Uuid::new_v4(),
            name: "new_ui_feature".to_string(),
            description: Some("x".to_string()),
            is_enabled: true,
            environment: Environment::Dev,
            project_id: Uuid::new_v4(),
            created_by_id: Uuid::new_v4(),
            user_group_targeting: Some(r#"{"groups": ["beta_users"]}"#.to_string()),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_environment_serialization() {
        assert_eq!(serde_json::to_string(&Environment::Staging).unwrap(), "\"staging\"");
        let env: Environment = serde_json::from_str("\"prod\"").unwrap();
        assert_eq!(env, Environment::Prod);
        assert!(serde_json::from_str::<Environment>("\"qa\"").is_err());
    }

    #[test]
    fn test_toggle_preserves_other_fields() {
        let mut flag = sample_flag();
        let changes: FeatureFlagChanges = serde_json::from_str(r#"{"is_enabled": false}"#).unwrap();

        changes.apply_to(&mut flag, Utc::now());

        assert!(!flag.is_enabled);
        assert_eq!(flag.description.as_deref(), Some("x"));
        assert_eq!(flag.name, "new_ui_feature");
        assert_eq!(flag.environment, Environment::Dev);
        assert!(flag.user_group_targeting.is_some());
        assert!(flag.updated_at.is_some());
    }

    #[test]
    fn test_explicit_null_clears_targeting() {
        let mut flag = sample_flag();
        let changes: FeatureFlagChanges =
            serde_json::from_str(r#"{"user_group_targeting": null}"#).unwrap();

        changes.apply_to(&mut flag, Utc::now());

        assert!(flag.user_group_targeting.is_none());
        assert_eq!(flag.description.as_deref(), Some("x"));
    }

    #[test]
    fn test_changes_is_empty() {
        assert!(FeatureFlagChanges::default().is_empty());
        let changes: FeatureFlagChanges = serde_json::from_str(r#"{"environment": "prod"}"#).unwrap();
        assert!(!changes.is_empty());
        assert_eq!(changes.environment, Some(Environment::Prod));
    }
}
