use crate::Config;
use crate::auth::{CurrentUser, Operation};
use crate::error::app_error::AppError;
use crate::middleware::rate_limit::RateLimit;
use crate::models::photo::{PhotoUploadRequest, PhotoUploadResponse};
use crate::service::storage::{self, PhotoStorage};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;
use std::sync::Arc;
use validator::Validate;

/// Store one captured frame and return its durable URL
#[openapi(tag = "Photos")]
#[post("/", data = "<payload>")]
pub async fn upload_photo(
    storage: &State<Arc<dyn PhotoStorage>>,
    config: &State<Config>,
    _rate_limit: RateLimit,
    current_user: CurrentUser,
    payload: Json<PhotoUploadRequest>,
) -> Result<Created<Json<PhotoUploadResponse>>, AppError> {
    current_user.authorize(Operation::UploadPhoto)?;
    payload.validate()?;

    let storage::CapturedPhoto { bytes, content_type } = storage::decode_data_uri(&payload.data)?;
    let url = tokio::time::timeout(config.upload_timeout(), storage.store(bytes, &content_type, payload.kind))
        .await
        .map_err(|_| AppError::UploadFailed(format!("{} photo upload timed out", payload.kind)))??;

    Ok(Created::new(url.clone()).body(Json(PhotoUploadResponse { url })))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![upload_photo]
}
