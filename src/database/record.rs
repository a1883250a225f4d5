use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::identifier::StudentId;
use crate::models::record::{Record, RecordFilter};
use chrono::{DateTime, Utc};
use uuid::Uuid;

const RECORD_COLUMNS: &str = r#"
    id,
    student_id,
    student_name,
    class_name,
    device_description,
    student_photo,
    device_photos,
    check_in_time,
    check_out_time,
    status
"#;

/// Single source of truth for check-in records. The adapter behind it (a
/// Postgres pool in production, an in-memory double in tests) is chosen at
/// composition time.
#[async_trait::async_trait]
pub trait RecordRepository: Send + Sync {
    /// Persist a fully-constructed record. Refuses a second open record for
    /// the same student.
    async fn insert(&self, record: &Record) -> Result<Record, AppError>;

    /// Most recent record for a student, open or not ("most recent wins"
    /// when a student has re-checked-in over time).
    async fn find_by_student_id(&self, student_id: &StudentId) -> Result<Option<Record>, AppError>;

    async fn find_by_record_id(&self, id: &Uuid) -> Result<Option<Record>, AppError>;

    /// Filtered listing in insertion order (oldest first) plus the total
    /// matching count.
    async fn list(&self, filter: &RecordFilter) -> Result<(Vec<Record>, i64), AppError>;

    /// Terminal transition of the student's latest open record.
    async fn check_out(&self, student_id: &StudentId, at: DateTime<Utc>) -> Result<Record, AppError>;
}

#[async_trait::async_trait]
impl RecordRepository for PostgresRepository {
    async fn insert(&self, record: &Record) -> Result<Record, AppError> {
        let query = format!(
            r#"
            INSERT INTO record (id, student_id, student_name, class_name, device_description,
                                student_photo, device_photos, check_in_time, check_out_time, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let stored = sqlx::query_as::<_, Record>(&query)
            .bind(record.id)
            .bind(&record.student_id)
            .bind(&record.student_name)
            .bind(&record.class_name)
            .bind(&record.device_description)
            .bind(&record.student_photo)
            .bind(&record.device_photos)
            .bind(record.check_in_time)
            .bind(record.check_out_time)
            .bind(record.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.constraint() == Some("record_open_student_idx") => {
                    AppError::DuplicateStudentId(record.student_id.clone())
                }
                sqlx::Error::Database(db) if db.constraint() == Some("record_pkey") => AppError::DuplicateRecordId,
                _ => AppError::db("Failed to insert record", e),
            })?;

        Ok(stored)
    }

    async fn find_by_student_id(&self, student_id: &StudentId) -> Result<Option<Record>, AppError> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM record
            WHERE student_id = $1
            ORDER BY check_in_time DESC
            LIMIT 1
            "#
        );

        let record = sqlx::query_as::<_, Record>(&query)
            .bind(student_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_record_id(&self, id: &Uuid) -> Result<Option<Record>, AppError> {
        let query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM record
            WHERE id = $1
            "#
        );

        let record = sqlx::query_as::<_, Record>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(record)
    }

    async fn list(&self, filter: &RecordFilter) -> Result<(Vec<Record>, i64), AppError> {
        let predicate = r#"
            ($1::record_status IS NULL OR status = $1)
            AND ($2::text IS NULL
                 OR student_name ILIKE '%' || $2 || '%'
                 OR student_id ILIKE '%' || $2 || '%'
                 OR class_name ILIKE '%' || $2 || '%')
        "#;

        let count_query = format!("SELECT COUNT(*) FROM record WHERE {predicate}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(filter.status)
            .bind(filter.search.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::db("Failed to count records", e))?;

        let list_query = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM record
            WHERE {predicate}
            ORDER BY check_in_time ASC
            "#
        );

        let records = sqlx::query_as::<_, Record>(&list_query)
            .bind(filter.status)
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::db("Failed to list records", e))?;

        Ok((records, total))
    }

    async fn check_out(&self, student_id: &StudentId, at: DateTime<Utc>) -> Result<Record, AppError> {
        // The UPDATE only targets open rows; a racing second checkout finds
        // nothing to update and reports the business condition instead.
        let query = format!(
            r#"
            UPDATE record
            SET status = 'checked-out', check_out_time = $2
            WHERE id = (
                SELECT id FROM record
                WHERE student_id = $1 AND status = 'checked-in'
                ORDER BY check_in_time DESC
                LIMIT 1
            )
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Record>(&query)
            .bind(student_id.as_str())
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::db("Failed to check out record", e))?;

        match updated {
            Some(record) => Ok(record),
            None => match self.find_by_student_id(student_id).await? {
                Some(_) => Err(AppError::AlreadyCheckedOut(student_id.to_string())),
                None => Err(AppError::NotFound(format!("No record for student {student_id}"))),
            },
        }
    }
}
