use crate::error::app_error::AppError;
use crate::models::photo::PhotoKind;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::PathBuf;
use uuid::Uuid;

/// Decoded payload of a `data:image/...;base64,` URI produced by the camera
/// capture widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

pub fn is_data_uri(reference: &str) -> bool {
    reference.starts_with("data:")
}

pub fn decode_data_uri(uri: &str) -> Result<CapturedPhoto, AppError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AppError::InvalidPhoto("expected a data URI".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::InvalidPhoto("data URI has no payload".to_string()))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::InvalidPhoto("data URI must be base64-encoded".to_string()))?;
    let content_type = if content_type.is_empty() { "image/jpeg" } else { content_type };

    let bytes = BASE64
        .decode(payload)
        .map_err(|e| AppError::InvalidPhoto(format!("invalid base64 payload: {e}")))?;

    Ok(CapturedPhoto {
        bytes,
        content_type: content_type.to_string(),
    })
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// External photo-storage collaborator: turns a captured frame into a durable
/// public URL. The lifecycle manager only ever persists durable references.
#[async_trait::async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, content_type: &str, kind: PhotoKind) -> Result<String, AppError>;
}

/// Filesystem-backed storage: writes `<media_root>/<kind>/<uuid>.<ext>` and
/// returns the URL under the configured public prefix.
pub struct FsPhotoStorage {
    media_root: PathBuf,
    public_base_url: String,
}

impl FsPhotoStorage {
    pub fn new(media_root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            media_root: media_root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PhotoStorage for FsPhotoStorage {
    async fn store(&self, bytes: Vec<u8>, content_type: &str, kind: PhotoKind) -> Result<String, AppError> {
        let filename = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        let dir = self.media_root.join(kind.as_str());

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::UploadFailed(format!("could not create media directory: {e}")))?;
        tokio::fs::write(dir.join(&filename), &bytes)
            .await
            .map_err(|e| AppError::UploadFailed(format!("could not write photo: {e}")))?;

        Ok(format!("{}/{}/{}", self.public_base_url.trim_end_matches('/'), kind.as_str(), filename))
    }
}
