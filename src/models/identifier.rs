use crate::error::app_error::AppError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External student identifier as scanned from a badge QR code or typed at
/// the front desk. The payload format belongs to whoever prints the badges;
/// the server only requires a non-empty value after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn normalize(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidIdentifier);
        }
        Ok(StudentId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
