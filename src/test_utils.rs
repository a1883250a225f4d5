use crate::database::record::RecordRepository;
use crate::error::app_error::AppError;
use crate::models::identifier::StudentId;
use crate::models::photo::PhotoKind;
use crate::models::record::{CheckInRequest, Record, RecordFilter, RecordStatus};
use crate::service::storage::PhotoStorage;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory record store with the same serialization guarantees as the
/// Postgres adapter: all mutations run under one async mutex, so two
/// stations racing on the same student cannot both succeed.
#[derive(Default)]
pub struct MemoryRecordRepository {
    records: Mutex<Vec<Record>>,
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    pub async fn open_records_for(&self, student_id: &str) -> Vec<Record> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.student_id == student_id && r.status == RecordStatus::CheckedIn)
            .cloned()
            .collect()
    }
}

fn matches_filter(record: &Record, filter: &RecordFilter) -> bool {
    if let Some(status) = filter.status
        && record.status != status
    {
        return false;
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let hit = record.student_name.to_lowercase().contains(&needle)
            || record.student_id.to_lowercase().contains(&needle)
            || record.class_name.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl RecordRepository for MemoryRecordRepository {
    async fn insert(&self, record: &Record) -> Result<Record, AppError> {
        let mut records = self.records.lock().await;
        if records
            .iter()
            .any(|r| r.student_id == record.student_id && r.status == RecordStatus::CheckedIn)
        {
            return Err(AppError::DuplicateStudentId(record.student_id.clone()));
        }
        if records.iter().any(|r| r.id == record.id) {
            return Err(AppError::DuplicateRecordId);
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn find_by_student_id(&self, student_id: &StudentId) -> Result<Option<Record>, AppError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.student_id == student_id.as_str())
            .max_by_key(|r| r.check_in_time)
            .cloned())
    }

    async fn find_by_record_id(&self, id: &Uuid) -> Result<Option<Record>, AppError> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|r| r.id == *id).cloned())
    }

    async fn list(&self, filter: &RecordFilter) -> Result<(Vec<Record>, i64), AppError> {
        let records = self.records.lock().await;
        let matching: Vec<Record> = records.iter().filter(|r| matches_filter(r, filter)).cloned().collect();
        let count = matching.len() as i64;
        Ok((matching, count))
    }

    async fn check_out(&self, student_id: &StudentId, at: DateTime<Utc>) -> Result<Record, AppError> {
        let mut records = self.records.lock().await;
        let open = records
            .iter_mut()
            .filter(|r| r.student_id == student_id.as_str() && r.status == RecordStatus::CheckedIn)
            .max_by_key(|r| r.check_in_time);

        if let Some(record) = open {
            record.status = RecordStatus::CheckedOut;
            record.check_out_time = Some(at);
            return Ok(record.clone());
        }

        if records.iter().any(|r| r.student_id == student_id.as_str()) {
            Err(AppError::AlreadyCheckedOut(student_id.to_string()))
        } else {
            Err(AppError::NotFound(format!("No record for student {student_id}")))
        }
    }
}

/// Photo storage double that records uploads and hands back stable fake URLs.
#[derive(Default)]
pub struct MemoryPhotoStorage {
    uploads: AtomicUsize,
}

impl MemoryPhotoStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PhotoStorage for MemoryPhotoStorage {
    async fn store(&self, _bytes: Vec<u8>, content_type: &str, kind: PhotoKind) -> Result<String, AppError> {
        let sequence = self.uploads.fetch_add(1, Ordering::SeqCst);
        let ext = if content_type == "image/png" { "png" } else { "jpg" };
        Ok(format!("mem://{kind}/{sequence}.{ext}"))
    }
}

/// Photo storage double whose uploads always fail.
pub struct FailingPhotoStorage;

#[async_trait::async_trait]
impl PhotoStorage for FailingPhotoStorage {
    async fn store(&self, _bytes: Vec<u8>, _content_type: &str, _kind: PhotoKind) -> Result<String, AppError> {
        Err(AppError::UploadFailed("storage unavailable".to_string()))
    }
}

/// Photo storage double that never completes, for exercising the upload
/// deadline.
pub struct HangingPhotoStorage;

#[async_trait::async_trait]
impl PhotoStorage for HangingPhotoStorage {
    async fn store(&self, _bytes: Vec<u8>, _content_type: &str, _kind: PhotoKind) -> Result<String, AppError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Err(AppError::UploadFailed("unreachable".to_string()))
    }
}

pub fn data_uri(content_type: &str, payload: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(payload))
}

pub fn sample_check_in_request(student_id: &str) -> CheckInRequest {
    CheckInRequest {
        student_id: student_id.to_string(),
        student_name: "Alex Johnson".to_string(),
        class_name: "Robotics 101".to_string(),
        device_description: "Silver laptop, stickers on lid".to_string(),
        student_photo: data_uri("image/jpeg", b"student frame"),
        device_photos: vec![data_uri("image/jpeg", b"device front"), data_uri("image/jpeg", b"device back")],
    }
}
