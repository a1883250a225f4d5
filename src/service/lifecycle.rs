use crate::database::record::RecordRepository;
use crate::error::app_error::AppError;
use crate::models::identifier::StudentId;
use crate::models::photo::PhotoKind;
use crate::models::record::{CheckInRequest, Record, RecordStatus};
use crate::service::storage::{self, PhotoStorage};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on simultaneous uploads within one check-in, matching the
/// capture workflow's photo limit.
const UPLOAD_CONCURRENCY: usize = 6;

/// Orchestrates the record state machine: `checked-in` → `checked-out`,
/// nothing else. Check-in turns captured frames into durable URLs before the
/// record exists; checkout is the single terminal transition.
pub struct LifecycleService<'a> {
    store: &'a dyn RecordRepository,
    photos: Arc<dyn PhotoStorage>,
    upload_timeout: Duration,
}

impl<'a> LifecycleService<'a> {
    pub fn new(store: &'a dyn RecordRepository, photos: Arc<dyn PhotoStorage>, upload_timeout: Duration) -> Self {
        LifecycleService {
            store,
            photos,
            upload_timeout,
        }
    }

    pub async fn check_in(&self, request: &CheckInRequest) -> Result<Record, AppError> {
        request.validate()?;
        let student_id = StudentId::normalize(&request.student_id)?;

        let student_photo = self.resolve_photo(&request.student_photo, PhotoKind::Student).await?;
        let device_photos = self.resolve_device_photos(&request.device_photos).await?;

        let record = Record {
            id: Uuid::new_v4(),
            student_id: student_id.as_str().to_string(),
            student_name: request.student_name.trim().to_string(),
            class_name: request.class_name.trim().to_string(),
            device_description: request.device_description.trim().to_string(),
            student_photo,
            device_photos,
            check_in_time: Utc::now(),
            check_out_time: None,
            status: RecordStatus::CheckedIn,
        };

        let stored = self.store.insert(&record).await?;
        info!(record_id = %stored.id, student_id = %stored.student_id, "student checked in");
        Ok(stored)
    }

    pub async fn check_out(&self, raw_student_id: &str) -> Result<Record, AppError> {
        let student_id = StudentId::normalize(raw_student_id)?;
        let record = self.store.check_out(&student_id, Utc::now()).await?;
        info!(record_id = %record.id, student_id = %record.student_id, "student checked out");
        Ok(record)
    }

    /// Pass a durable URL through untouched; upload a captured data URI and
    /// return the durable URL it was stored under.
    async fn resolve_photo(&self, reference: &str, kind: PhotoKind) -> Result<String, AppError> {
        if !storage::is_data_uri(reference) {
            return Ok(reference.to_string());
        }

        let storage::CapturedPhoto { bytes, content_type } = storage::decode_data_uri(reference)?;
        tokio::time::timeout(self.upload_timeout, self.photos.store(bytes, &content_type, kind))
            .await
            .map_err(|_| AppError::UploadFailed(format!("{kind} photo upload timed out")))?
    }

    /// Upload every captured device photo concurrently; the record is only
    /// written after all of them have durable URLs, and any failure aborts
    /// the whole check-in. Order must survive the fan-out since the first
    /// photo is the canonical thumbnail.
    async fn resolve_device_photos(&self, references: &[String]) -> Result<Vec<String>, AppError> {
        let mut resolved: Vec<Option<String>> = vec![None; references.len()];
        let mut tasks: JoinSet<Result<(usize, String), AppError>> = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(UPLOAD_CONCURRENCY));

        for (index, reference) in references.iter().enumerate() {
            if !storage::is_data_uri(reference) {
                resolved[index] = Some(reference.clone());
                continue;
            }

            let storage::CapturedPhoto { bytes, content_type } = storage::decode_data_uri(reference)?;
            let photos = Arc::clone(&self.photos);
            let semaphore = Arc::clone(&semaphore);
            let upload_timeout = self.upload_timeout;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::UploadFailed("upload slot unavailable".to_string()))?;
                let url = tokio::time::timeout(upload_timeout, photos.store(bytes, &content_type, PhotoKind::Device))
                    .await
                    .map_err(|_| AppError::UploadFailed("device photo upload timed out".to_string()))??;
                Ok((index, url))
            });
        }

        // Returning early on the first failure drops the JoinSet, which
        // aborts the remaining uploads.
        while let Some(joined) = tasks.join_next().await {
            let (index, url) = joined.map_err(|e| AppError::UploadFailed(format!("upload task failed: {e}")))??;
            resolved[index] = Some(url);
        }

        Ok(resolved.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::RecordFilter;
    use crate::test_utils::{
        FailingPhotoStorage, HangingPhotoStorage, MemoryPhotoStorage, MemoryRecordRepository, data_uri, sample_check_in_request,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn check_in_creates_an_open_record() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let before = Utc::now();
        let record = service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        let after = Utc::now();

        assert_eq!(record.status, RecordStatus::CheckedIn);
        assert_eq!(record.check_out_time, None);
        assert!(record.check_in_time >= before && record.check_in_time <= after);
        assert_eq!(record.student_id, "STU001");
        assert_eq!(record.device_photos.len(), 2);
    }

    #[tokio::test]
    async fn check_in_uploads_captured_photos_and_keeps_order() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let mut request = sample_check_in_request("STU001");
        // Mix a durable URL with a fresh capture; the durable one must pass
        // through untouched and keep its position.
        request.device_photos = vec![
            "https://cdn.example.com/device/existing.jpg".to_string(),
            data_uri("image/png", b"fresh capture"),
        ];

        let record = service.check_in(&request).await.unwrap();

        assert_eq!(record.device_photos[0], "https://cdn.example.com/device/existing.jpg");
        assert!(record.device_photos[1].starts_with("mem://device/"));
        assert!(record.student_photo.starts_with("mem://student/"));
        // One student photo plus one captured device photo.
        assert_eq!(photos.upload_count(), 2);
    }

    #[tokio::test]
    async fn second_open_check_in_is_refused() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        let second = service.check_in(&sample_check_in_request("STU001")).await;

        assert!(matches!(second, Err(AppError::DuplicateStudentId(id)) if id == "STU001"));
        assert_eq!(store.open_records_for("STU001").await.len(), 1);
    }

    #[tokio::test]
    async fn re_check_in_is_allowed_after_checkout() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let first = service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        service.check_out("STU001").await.unwrap();
        let second = service.check_in(&sample_check_in_request("STU001")).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.open_records_for("STU001").await.len(), 1);
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn check_in_without_device_photos_is_rejected() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let mut request = sample_check_in_request("STU001");
        request.device_photos.clear();

        let result = service.check_in(&request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.snapshot().await.is_empty());
        assert_eq!(photos.upload_count(), 0);
    }

    #[tokio::test]
    async fn check_in_with_blank_fields_is_rejected() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let mut request = sample_check_in_request("STU001");
        request.student_name = "   ".to_string();

        assert!(matches!(service.check_in(&request).await, Err(AppError::Validation(_))));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn check_in_with_blank_identifier_is_rejected() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let request = sample_check_in_request("   ");

        assert!(matches!(service.check_in(&request).await, Err(AppError::InvalidIdentifier)));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn identifier_is_trimmed_before_storage() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let record = service.check_in(&sample_check_in_request("  STU001  ")).await.unwrap();
        assert_eq!(record.student_id, "STU001");

        // The scanned identifier at the gate carries the same whitespace noise.
        let checked_out = service.check_out(" STU001 ").await.unwrap();
        assert_eq!(checked_out.id, record.id);
    }

    #[tokio::test]
    async fn failed_upload_aborts_the_whole_check_in() {
        let store = MemoryRecordRepository::new();
        let service = LifecycleService::new(&store, Arc::new(FailingPhotoStorage), TIMEOUT);

        let result = service.check_in(&sample_check_in_request("STU001")).await;
        assert!(matches!(result, Err(AppError::UploadFailed(_))));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn hung_upload_times_out_instead_of_stalling() {
        let store = MemoryRecordRepository::new();
        let service = LifecycleService::new(&store, Arc::new(HangingPhotoStorage), Duration::from_millis(50));

        let result = service.check_in(&sample_check_in_request("STU001")).await;
        assert!(matches!(result, Err(AppError::UploadFailed(message)) if message.contains("timed out")));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn check_out_closes_the_record_once() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let checked_in = service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        let checked_out = service.check_out("STU001").await.unwrap();

        assert_eq!(checked_out.id, checked_in.id);
        assert_eq!(checked_out.status, RecordStatus::CheckedOut);
        assert!(checked_out.check_out_time.unwrap() >= checked_in.check_in_time);

        // Repeating the checkout reports the condition and changes nothing.
        let before = store.snapshot().await;
        let repeat = service.check_out("STU001").await;
        assert!(matches!(repeat, Err(AppError::AlreadyCheckedOut(id)) if id == "STU001"));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn check_out_of_unknown_student_leaves_store_untouched() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        let before = store.snapshot().await;

        let result = service.check_out("STU999").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn full_desk_scenario() {
        let store = MemoryRecordRepository::new();
        let photos = MemoryPhotoStorage::new();
        let service = LifecycleService::new(&store, photos.clone(), TIMEOUT);

        let record = service.check_in(&sample_check_in_request("STU001")).await.unwrap();
        assert_eq!(record.status, RecordStatus::CheckedIn);
        assert_eq!(record.student_name, "Alex Johnson");
        assert_eq!(record.class_name, "Robotics 101");
        assert_eq!(record.device_photos.len(), 2);

        let checked_out = service.check_out("STU001").await.unwrap();
        assert_eq!(checked_out.status, RecordStatus::CheckedOut);
        assert!(checked_out.check_out_time.is_some());

        assert!(matches!(service.check_out("STU001").await, Err(AppError::AlreadyCheckedOut(_))));

        let (open, count) = store
            .list(&RecordFilter {
                status: Some(RecordStatus::CheckedIn),
                search: None,
            })
            .await
            .unwrap();
        assert!(open.is_empty());
        assert_eq!(count, 0);
    }
}
