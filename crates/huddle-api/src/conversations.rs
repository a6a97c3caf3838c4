use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use huddle_types::api::{Claims, ConversationResponse, CreateConversationRequest};

use crate::auth::AppState;
use crate::convert::parse_id;
use crate::error::ApiResult;

/// Find-or-create the direct-message stream between the caller and another
/// member. Idempotent: the same pair always maps to the same conversation.
pub async fn create_or_get_conversation(
    State(state): State<AppState>,
    Path(workspace_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = state.db.create_or_get_conversation(
        &Uuid::new_v4().to_string(),
        &workspace_id.to_string(),
        &claims.sub.to_string(),
        &req.member_id.to_string(),
    )?;

    Ok(Json(ConversationResponse {
        id: parse_id(&conversation.id),
        workspace_id: parse_id(&conversation.workspace_id),
        member_one_id: parse_id(&conversation.member_one_id),
        member_two_id: parse_id(&conversation.member_two_id),
    }))
}
