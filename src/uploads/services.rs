use anyhow::Context;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

pub struct StoredUpload {
    pub key: String,
    pub url: String,
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

pub async fn store_upload(state: &AppState, user_id: Uuid, item: UploadItem) -> AppResult<StoredUpload> {
    let content_type = item.content_type.to_ascii_lowercase();
    let ext = ext_from_mime(&content_type).ok_or_else(|| {
        AppError::bad_request(format!("unsupported content type {content_type}"))
    })?;
    if item.body.is_empty() {
        return Err(AppError::bad_request("file is empty"));
    }
    if item.body.len() > state.config.uploads.max_bytes {
        return Err(AppError::PayloadTooLarge);
    }

    let key = format!("uploads/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    let size = item.body.len();
    state
        .storage
        .put_object(&key, item.body, &content_type)
        .await
        .with_context(|| format!("store upload {key}"))?;
    let url = state
        .storage
        .presign_get(&key, state.config.uploads.presign_ttl_secs)
        .await?;

    info!(%user_id, %key, size, "upload stored");
    Ok(StoredUpload { key, url })
}
