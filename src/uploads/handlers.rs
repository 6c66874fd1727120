use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::services::{store_upload, UploadItem};
use crate::{
    auth::AdminUser,
    error::{AppError, AppResult},
    state::AppState,
};

// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload))
        .layer(DefaultBodyLimit::max(max_bytes + MULTIPART_OVERHEAD))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::bad_request(e.body_text())
    }
}

/// POST /uploads (multipart, field `file`)
#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut file = None;
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        let body = field.bytes().await.map_err(multipart_error)?;
        file = Some(UploadItem { body, content_type });
        break;
    }
    let item = file.ok_or_else(|| AppError::bad_request("file field is required"))?;

    let stored = store_upload(&state, admin.id, item).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            key: stored.key,
            url: stored.url,
        }),
    ))
}
