/// Domain models for Flagdeck
///
/// This module contains the three persisted entity kinds and the input types
/// used to create and partially update them.
///
/// # Models
///
/// - `user`: User accounts with a closed role set (admin, developer)
/// - `project`: Named workspaces owned by exactly one user
/// - `feature_flag`: Per-environment boolean toggles scoped to a project
///
/// Entities reference each other by id only. A project stores `owner_id`,
/// a flag stores `project_id` and `created_by_id`; nothing embeds the
/// referenced record.
///
/// # Partial updates
///
/// Every `*Changes` type follows exclude-unset semantics: a `None` field is
/// left untouched. Nullable columns use `Option<Option<T>>` so that an
/// explicit `null` (clear the value) is distinguishable from an absent field.
///
/// ```
/// use flagdeck_shared::models::feature_flag::FeatureFlagChanges;
///
/// let changes: FeatureFlagChanges = serde_json::from_str(r#"{"description": null}"#).unwrap();
/// assert_eq!(changes.description, Some(None));
/// assert!(changes.is_enabled.is_none());
/// ```

use serde::{Deserialize, Deserializer};

pub mod feature_flag;
pub mod project;
pub mod user;

/// Default page size for list operations
pub const DEFAULT_LIMIT: u32 = 100;

/// Offset pagination shared by every list operation
///
/// Defaults to `skip=0, limit=100`. There is no upper bound on `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// Number of records to skip
    pub skip: u32,

    /// Maximum number of records to return
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(skip: u32, limit: u32) -> Self {
        Self { skip, limit }
    }

    /// Applies the window to an already ordered sequence
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Deserializes a field that may be absent, `null`, or a value
///
/// Use together with `#[serde(default)]`: an absent field stays `None`,
/// `null` becomes `Some(None)` and a value becomes `Some(Some(v))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
