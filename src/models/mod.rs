pub mod identifier;
pub mod photo;
pub mod record;
pub mod session;
pub mod user;

use validator::ValidationError;

/// Shared rule for required free-text fields: present and not whitespace-only.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}
