/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Service banner and health check
/// - `auth`: Signup, token issuance, current user
/// - `users`: Admin user management
/// - `projects`: Project CRUD
/// - `feature_flags`: Feature flag CRUD and listings

use serde::{Deserialize, Serialize};

pub mod auth;
pub mod feature_flags;
pub mod health;
pub mod projects;
pub mod users;

/// Plain confirmation body, used by the delete endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
