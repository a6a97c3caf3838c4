use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::{ChannelResponse, Claims, CreateChannelRequest, RenameChannelRequest};

use crate::auth::AppState;
use crate::convert::channel_response;
use crate::error::ApiResult;

pub async fn list_channels(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ChannelResponse>>> {
    let rows = state
        .db
        .list_channels(&workspace_id.to_string(), &claims.sub.to_string())?;

    Ok(Json(rows.into_iter().map(channel_response).collect()))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<impl IntoResponse> {
    let channel_id = Uuid::new_v4();

    let channel = state.db.create_channel(
        &channel_id.to_string(),
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &req.name,
    )?;

    Ok((StatusCode::CREATED, Json(channel_response(channel))))
}

pub async fn rename_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RenameChannelRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    let channel = state.db.rename_channel(
        &channel_id.to_string(),
        &claims.sub.to_string(),
        &req.name,
    )?;

    Ok(Json(channel_response(channel)))
}

pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .delete_channel(&channel_id.to_string(), &claims.sub.to_string())?;

    Ok(StatusCode::NO_CONTENT)
}
