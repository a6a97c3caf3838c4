use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;

use huddle_types::api::Claims;

use crate::auth::AppState;
use crate::convert::file_url;
use crate::error::{ApiError, ApiResult, join_error};

/// 50 MB upload limit for attachments
const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Upload tokens expire after 10 minutes.
const UPLOAD_TOKEN_TTL_MINS: i64 = 10;

#[derive(Serialize)]
pub struct CreateUploadResponse {
    pub upload_url: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub size: u64,
    pub url: String,
}

/// POST /uploads: reserve a short-lived upload slot and hand back the
/// endpoint to PUT the raw bytes to.
pub async fn create_upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let file_id = Uuid::new_v4();
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let expires_at = huddle_db::format_rfc3339(
        chrono::Utc::now() + chrono::Duration::minutes(UPLOAD_TOKEN_TTL_MINS),
    );

    state.db.create_upload(
        &file_id.to_string(),
        &claims.sub.to_string(),
        &token,
        &expires_at,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUploadResponse {
            upload_url: format!("/uploads/{token}"),
            token,
        }),
    ))
}

/// PUT /uploads/{token}: accepts raw bytes (application/octet-stream),
/// redeems the token, saves to the upload directory, returns the storage
/// identity to attach to a message.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::Validation("upload body must not be empty".into()));
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let size = bytes.len() as i64;

    let db_state = state.clone();
    let claim_token = token.clone();
    let upload = tokio::task::spawn_blocking(move || db_state.db.claim_upload(&claim_token, size))
        .await
        .map_err(join_error)??
        .ok_or(ApiError::NotFound("upload"))?;

    // Write the blob to disk only after the token was redeemed.
    tokio::fs::create_dir_all(&state.upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory: {}", e);
        ApiError::Internal(e.into())
    })?;

    let file_path = state.upload_dir.join(&upload.id);
    let mut file = tokio::fs::File::create(&file_path).await.map_err(|e| {
        error!("Failed to create file {}: {}", file_path.display(), e);
        ApiError::Internal(e.into())
    })?;
    file.write_all(&bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", file_path.display(), e);
        ApiError::Internal(e.into())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            file_id: crate::convert::parse_id(&upload.id),
            size: size as u64,
            url: file_url(&upload.id),
        }),
    ))
}

/// GET /files/{file_id}: streams back a stored attachment. The uuid path
/// parse doubles as path-traversal protection.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let upload = state
        .db
        .get_upload(&file_id.to_string())?
        .ok_or(ApiError::NotFound("file"))?;

    let file_path = state.upload_dir.join(&upload.id);
    let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
        error!("Failed to read file {}: {}", file_path.display(), e);
        ApiError::NotFound("file")
    })?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}
