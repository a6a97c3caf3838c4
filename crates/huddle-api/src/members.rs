use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::{Claims, MemberResponse, UpdateRoleRequest};

use crate::auth::AppState;
use crate::convert::member_response;
use crate::error::{ApiError, ApiResult};

pub async fn list_members(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<MemberResponse>>> {
    let rows = state
        .db
        .list_members(&workspace_id.to_string(), &claims.sub.to_string())?;

    Ok(Json(rows.into_iter().map(member_response).collect()))
}

/// The caller's own membership in a workspace; the client keys
/// author-vs-viewer decisions off this.
pub async fn current_member(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MemberResponse>> {
    let member = state
        .db
        .current_member(&workspace_id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::Unauthorized)?;

    let member = state.db.get_member(&member.id, &claims.sub.to_string())?;
    Ok(Json(member_response(member)))
}

pub async fn get_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MemberResponse>> {
    let member = state
        .db
        .get_member(&member_id.to_string(), &claims.sub.to_string())?;

    Ok(Json(member_response(member)))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    state.db.update_member_role(
        &member_id.to_string(),
        &claims.sub.to_string(),
        req.role,
    )?;

    let member = state
        .db
        .get_member(&member_id.to_string(), &claims.sub.to_string())?;

    Ok(Json(member_response(member)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .remove_member(&member_id.to_string(), &claims.sub.to_string())?;

    Ok(StatusCode::NO_CONTENT)
}
