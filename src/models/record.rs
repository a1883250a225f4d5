use chrono::{DateTime, Utc};
use rocket::FromFormField;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, JsonSchema, FromFormField, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "record_status", rename_all = "kebab-case")]
pub enum RecordStatus {
    #[field(value = "checked-in")]
    CheckedIn,
    #[field(value = "checked-out")]
    CheckedOut,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::CheckedIn => write!(f, "checked-in"),
            RecordStatus::CheckedOut => write!(f, "checked-out"),
        }
    }
}

/// One student's check-in/check-out session. Created only by a successful
/// check-in; the only mutation ever applied is the terminal checkout.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Record {
    pub id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub device_description: String,
    pub student_photo: String,
    /// Insertion order is significant: the first photo is the canonical
    /// thumbnail shown in lists.
    pub device_photos: Vec<String>,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub status: RecordStatus,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub student_id: String,
    #[validate(custom(function = "crate::models::validate_not_blank"))]
    pub student_name: String,
    #[validate(custom(function = "crate::models::validate_not_blank"))]
    pub class_name: String,
    #[validate(custom(function = "crate::models::validate_not_blank"))]
    pub device_description: String,
    #[validate(custom(function = "crate::models::validate_not_blank"))]
    pub student_photo: String,
    #[validate(length(min = 1, message = "at least one device photo is required"))]
    pub device_photos: Vec<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub record_id: Uuid,
    pub student_id: String,
    pub student_name: String,
    pub class_name: String,
    pub device_description: String,
    pub student_photo: String,
    pub device_photos: Vec<String>,
    pub check_in_time: DateTime<Utc>,
    pub check_out_time: Option<DateTime<Utc>>,
    pub status: RecordStatus,
}

impl From<&Record> for RecordResponse {
    fn from(record: &Record) -> Self {
        RecordResponse {
            record_id: record.id,
            student_id: record.student_id.clone(),
            student_name: record.student_name.clone(),
            class_name: record.class_name.clone(),
            device_description: record.device_description.clone(),
            student_photo: record.student_photo.clone(),
            device_photos: record.device_photos.clone(),
            check_in_time: record.check_in_time,
            check_out_time: record.check_out_time,
            status: record.status,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct RecordListResponse {
    pub results: Vec<RecordResponse>,
    pub count: i64,
}

/// Listing filter for the admin dashboard. Both criteria are ANDed when
/// present; no criteria returns every record in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub search: Option<String>,
    pub status: Option<RecordStatus>,
}
