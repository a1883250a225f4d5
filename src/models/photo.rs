use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

/// Whether an image shows the student or their device; stored photos are
/// namespaced by kind.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Student,
    Device,
}

impl PhotoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotoKind::Student => "student",
            PhotoKind::Device => "device",
        }
    }
}

impl std::fmt::Display for PhotoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PhotoUploadRequest {
    /// Captured frame as a `data:image/...;base64,` URI.
    #[validate(custom(function = "crate::models::validate_not_blank"))]
    pub data: String,
    #[serde(rename = "type")]
    pub kind: PhotoKind,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PhotoUploadResponse {
    pub url: String,
}
