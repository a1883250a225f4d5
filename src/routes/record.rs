use crate::Config;
use crate::auth::{CurrentUser, Operation};
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::record::{CheckInRequest, RecordFilter, RecordListResponse, RecordResponse, RecordStatus};
use crate::service::lifecycle::LifecycleService;
use crate::service::query::QueryService;
use crate::service::storage::PhotoStorage;
use rocket::http::Status;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Check a student and their device in, creating a new open record
#[openapi(tag = "Records")]
#[post("/checkin", data = "<payload>")]
pub async fn check_in(
    pool: &State<PgPool>,
    storage: &State<Arc<dyn PhotoStorage>>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<CheckInRequest>,
) -> Result<Created<Json<RecordResponse>>, AppError> {
    current_user.authorize(Operation::CheckIn)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = LifecycleService::new(&repo, Arc::clone(storage.inner()), config.upload_timeout());
    let record = service.check_in(&payload).await?;
    let location = format!("/records/{}", record.id);
    Ok(Created::new(location).body(Json(RecordResponse::from(&record))))
}

/// Check the student's open record out; the transition is terminal
#[openapi(tag = "Records")]
#[post("/<student_id>/checkout")]
pub async fn check_out(
    pool: &State<PgPool>,
    storage: &State<Arc<dyn PhotoStorage>>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    student_id: &str,
) -> Result<Json<RecordResponse>, AppError> {
    current_user.authorize(Operation::CheckOut)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = LifecycleService::new(&repo, Arc::clone(storage.inner()), config.upload_timeout());
    let record = service.check_out(student_id).await?;
    Ok(Json(RecordResponse::from(&record)))
}

/// List records for the admin dashboard, optionally filtered
#[openapi(tag = "Records")]
#[get("/?<search>&<status>")]
pub async fn list_records(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    search: Option<String>,
    status: Option<RecordStatus>,
) -> Result<Json<RecordListResponse>, AppError> {
    current_user.authorize(Operation::ListRecords)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let filter = RecordFilter { search, status };
    Ok(Json(QueryService::new(&repo).list(&filter).await?))
}

/// Fetch one record by its record id (detail view)
#[openapi(tag = "Records")]
#[get("/<record_id>")]
pub async fn get_record(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    record_id: &str,
) -> Result<Json<RecordResponse>, AppError> {
    current_user.authorize(Operation::LookupRecord)?;

    let id = Uuid::parse_str(record_id).map_err(|e| AppError::uuid("Invalid record id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let record = QueryService::new(&repo).record_by_id(&id).await?;
    Ok(Json(RecordResponse::from(&record)))
}

/// Resolve a scanned or typed student identifier to its latest record
#[openapi(tag = "Records")]
#[get("/by-student-id/<student_id>")]
pub async fn get_by_student_id(
    pool: &State<PgPool>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    student_id: &str,
) -> Result<Json<RecordResponse>, AppError> {
    current_user.authorize(Operation::LookupRecord)?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let record = QueryService::new(&repo).record_for_student(student_id).await?;
    Ok(Json(RecordResponse::from(&record)))
}

/// PDF export of a record. Not wired up yet; the endpoint reserves the URL.
#[openapi(tag = "Records")]
#[get("/<record_id>/export")]
pub async fn export_record(
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    record_id: &str,
) -> Result<Status, AppError> {
    current_user.authorize(Operation::ExportRecord)?;

    Uuid::parse_str(record_id).map_err(|e| AppError::uuid("Invalid record id", e))?;
    Ok(Status::NotImplemented)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![check_in, check_out, list_records, get_record, get_by_student_id, export_record]
}
