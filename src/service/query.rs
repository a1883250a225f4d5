use crate::database::record::RecordRepository;
use crate::error::app_error::AppError;
use crate::models::identifier::StudentId;
use crate::models::record::{Record, RecordFilter, RecordListResponse, RecordResponse};
use uuid::Uuid;

/// Read façade over the record store, backing the checkout scan, the
/// record-detail view and the admin dashboard. Never mutates; safe to retry.
pub struct QueryService<'a> {
    store: &'a dyn RecordRepository,
}

impl<'a> QueryService<'a> {
    pub fn new(store: &'a dyn RecordRepository) -> Self {
        QueryService { store }
    }

    pub async fn record_by_id(&self, id: &Uuid) -> Result<Record, AppError> {
        self.store
            .find_by_record_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No record {id}")))
    }

    pub async fn record_for_student(&self, raw_student_id: &str) -> Result<Record, AppError> {
        let student_id = StudentId::normalize(raw_student_id)?;
        self.store
            .find_by_student_id(&student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No record for student {student_id}")))
    }

    pub async fn list(&self, filter: &RecordFilter) -> Result<RecordListResponse, AppError> {
        let (records, count) = self.store.list(filter).await?;
        Ok(RecordListResponse {
            results: records.iter().map(RecordResponse::from).collect(),
            count,
        })
    }
}
