use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum::Extension;
use rand::Rng;
use rand::distr::Alphanumeric;
use uuid::Uuid;

use huddle_types::api::{
    Claims, CreateWorkspaceRequest, JoinCodeResponse, JoinWorkspaceRequest, MemberResponse,
    RenameWorkspaceRequest, WorkspaceResponse,
};

use crate::auth::AppState;
use crate::convert::{member_response, workspace_response};
use crate::error::ApiResult;

/// 6 lowercase alphanumerics, enough for invite links that are rotated on
/// demand.
pub(crate) fn generate_join_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<impl IntoResponse> {
    let workspace_id = Uuid::new_v4();

    let workspace = state.db.create_workspace(
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &req.name,
        &generate_join_code(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(workspace_response(workspace, true)),
    ))
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<WorkspaceResponse>>> {
    let rows = state.db.workspaces_for_user(&claims.sub.to_string())?;

    let workspaces = rows
        .into_iter()
        .map(|(workspace, member)| workspace_response(workspace, member.is_admin()))
        .collect();

    Ok(Json(workspaces))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let (workspace, member) = state
        .db
        .get_workspace(&workspace_id.to_string(), &claims.sub.to_string())?;

    // The join code is invite material; only admins see it.
    Ok(Json(workspace_response(workspace, member.is_admin())))
}

pub async fn rename_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RenameWorkspaceRequest>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let workspace = state.db.rename_workspace(
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &req.name,
    )?;

    Ok(Json(workspace_response(workspace, true)))
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .delete_workspace(&workspace_id.to_string(), &claims.sub.to_string())?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn rotate_join_code(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<JoinCodeResponse>> {
    let join_code = state.db.rotate_join_code(
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &generate_join_code(),
    )?;

    Ok(Json(JoinCodeResponse { join_code }))
}

pub async fn join_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinWorkspaceRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let member = state.db.join_workspace(
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &req.code,
    )?;

    let member = state
        .db
        .get_member(&member.id, &claims.sub.to_string())?;

    Ok(Json(member_response(member)))
}
