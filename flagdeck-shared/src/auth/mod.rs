/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the minimum length rule
/// - [`jwt`]: HS256 access token issuance and validation
/// - [`middleware`]: bearer token extraction and actor resolution
/// - [`policy`]: ownership and role decisions on projects and flags
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use flagdeck_shared::auth::jwt::{create_token, validate_token, Claims};
/// use flagdeck_shared::auth::password::{hash_password, verify_password};
/// use flagdeck_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("password123")?;
/// assert!(verify_password("password123", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "admin", UserRole::Admin, Duration::minutes(30));
/// let token = create_token(&claims, "a-signing-secret-of-at-least-32-bytes")?;
/// assert_eq!(validate_token(&token, "a-signing-secret-of-at-least-32-bytes")?, claims);
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
