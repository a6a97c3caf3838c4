use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use huddle_db::models::ReactionToggle;
use huddle_types::api::{Claims, ToggleReactionRequest, ToggleReactionResponse};
use huddle_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::convert::parse_id;
use crate::error::ApiResult;
use crate::messages::{publish, stream_scope};

/// POST /messages/{id}/reactions: toggle. The store removes the exact
/// (message, member, value) row if present, inserts one otherwise, and the
/// response says which happened.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<Json<ToggleReactionResponse>> {
    let user_id = claims.sub.to_string();

    let toggle = state.db.toggle_reaction(
        &Uuid::new_v4().to_string(),
        &user_id,
        &message_id.to_string(),
        &req.value,
    )?;

    // The guard already passed, so these lookups are for event fan-out.
    let row = state.db.get_message(&message_id.to_string(), &user_id)?;
    let member = state
        .db
        .current_member(&row.workspace_id, &user_id)?
        .map(|m| parse_id(&m.id))
        .unwrap_or_default();

    let response = match toggle {
        ReactionToggle::Added(id) => {
            let reaction_id = parse_id(&id);
            if let Some(stream) = stream_scope(&row) {
                publish(
                    &state,
                    stream,
                    GatewayEvent::ReactionAdd {
                        scope: stream,
                        message_id,
                        member_id: member,
                        value: req.value,
                    },
                )
                .await;
            }
            ToggleReactionResponse::Added { reaction_id }
        }
        ReactionToggle::Removed(id) => {
            let reaction_id = parse_id(&id);
            if let Some(stream) = stream_scope(&row) {
                publish(
                    &state,
                    stream,
                    GatewayEvent::ReactionRemove {
                        scope: stream,
                        message_id,
                        member_id: member,
                        value: req.value,
                    },
                )
                .await;
            }
            ToggleReactionResponse::Removed { reaction_id }
        }
    };

    Ok(Json(response))
}
