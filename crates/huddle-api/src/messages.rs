use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::FixedOffset;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use huddle_db::StoreError;
use huddle_db::models::{MessageRow, ReactionRow, ThreadSummaryRow};
use huddle_feed::{DaySection, FeedAssembler};
use huddle_types::api::{
    Claims, EditMessageRequest, MessagePage, MessageResponse, ReactionGroup, SendMessageRequest,
};
use huddle_types::events::GatewayEvent;
use huddle_types::models::{MessageScope, StreamScope};

use crate::auth::AppState;
use crate::convert::{message_response, parse_id};
use crate::error::{ApiError, ApiResult, join_error};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Opaque cursor for older pages; pass back the `next_cursor` of the
    /// previous page unchanged.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

/// Cursors are `created_at|id` of the oldest message on the previous page.
/// Both halves matter: a burst can land several messages on one
/// millisecond tick, and the id breaks the tie the same way the store
/// orders rows.
fn parse_cursor(raw: &str) -> ApiResult<(String, String)> {
    raw.split_once('|')
        .map(|(ts, id)| (ts.to_string(), id.to_string()))
        .ok_or_else(|| ApiError::Validation("malformed cursor".into()))
}

fn encode_cursor(row: &MessageRow) -> String {
    format!("{}|{}", row.created_at, row.id)
}

fn page_limit(requested: u32) -> u32 {
    requested.clamp(1, 200)
}

/// The viewer's UTC offset arrives as minutes east; anything that does not
/// name a real offset is a caller error, not a wrap-around.
fn viewer_offset(tz_offset: i32) -> ApiResult<FixedOffset> {
    tz_offset
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ApiError::Validation("tz_offset out of range".into()))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub before: Option<String>,
    /// Viewer's UTC offset in minutes (east positive); date buckets are
    /// keyed in the viewer's local calendar.
    #[serde(default)]
    pub tz_offset: i32,
}

/// A message stream is scoped by exactly one of channel, conversation, or
/// thread root.
fn scope_from(
    channel_id: Option<Uuid>,
    conversation_id: Option<Uuid>,
    parent_message_id: Option<Uuid>,
) -> ApiResult<MessageScope> {
    match (channel_id, conversation_id, parent_message_id) {
        (Some(id), None, None) => Ok(MessageScope::Channel(id)),
        (None, Some(id), None) => Ok(MessageScope::Conversation(id)),
        (None, None, Some(id)) => Ok(MessageScope::Thread(id)),
        _ => Err(ApiError::Validation(
            "exactly one of channel_id, conversation_id, parent_message_id is required".into(),
        )),
    }
}

pub(crate) fn stream_scope(row: &MessageRow) -> Option<StreamScope> {
    if let Some(channel_id) = &row.channel_id {
        Some(StreamScope::Channel(parse_id(channel_id)))
    } else {
        row.conversation_id
            .as_deref()
            .map(|id| StreamScope::Conversation(parse_id(id)))
    }
}

/// Fan an event out to its stream. Channel events are broadcast (each
/// connection filters on its subscription set); conversation events go
/// only to the two participants.
pub(crate) async fn publish(state: &AppState, scope: StreamScope, event: GatewayEvent) {
    match scope {
        StreamScope::Channel(_) => state.dispatcher.broadcast(event),
        StreamScope::Conversation(conversation_id) => {
            match state.db.conversation_user_ids(&conversation_id.to_string()) {
                Ok((one, two)) => {
                    state
                        .dispatcher
                        .send_to_user(parse_id(&one), event.clone())
                        .await;
                    if two != one {
                        state.dispatcher.send_to_user(parse_id(&two), event).await;
                    }
                }
                Err(e) => warn!("conversation fan-out failed: {}", e),
            }
        }
    }
}

struct LoadedPage {
    rows: Vec<MessageRow>,
    has_more: bool,
    reactions: Vec<ReactionRow>,
    threads: Vec<ThreadSummaryRow>,
}

/// Run the page fetch plus its batch annotations off the async runtime.
async fn load_page(
    state: AppState,
    user_id: String,
    scope: MessageScope,
    before: Option<(String, String)>,
    limit: u32,
) -> ApiResult<LoadedPage> {
    let page = tokio::task::spawn_blocking(move || -> Result<LoadedPage, StoreError> {
        let before = before.as_ref().map(|(ts, id)| (ts.as_str(), id.as_str()));
        let (rows, has_more) = state.db.list_messages(&user_id, &scope, before, limit)?;

        let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reactions = state.db.reactions_for_messages(&message_ids)?;
        let threads = state.db.thread_summaries(&message_ids)?;

        Ok(LoadedPage {
            rows,
            has_more,
            reactions,
            threads,
        })
    })
    .await
    .map_err(join_error)??;

    Ok(page)
}

/// Group reactions per message per value, carrying the reacting member ids
/// so the client can mark the viewer's own reactions.
fn group_reactions(reactions: &[ReactionRow]) -> HashMap<String, Vec<ReactionGroup>> {
    let mut grouped: HashMap<String, Vec<ReactionGroup>> = HashMap::new();
    for reaction in reactions {
        let groups = grouped.entry(reaction.message_id.clone()).or_default();
        match groups.iter_mut().find(|g| g.value == reaction.value) {
            Some(group) => {
                group.count += 1;
                group.member_ids.push(parse_id(&reaction.member_id));
            }
            None => groups.push(ReactionGroup {
                value: reaction.value.clone(),
                count: 1,
                member_ids: vec![parse_id(&reaction.member_id)],
            }),
        }
    }
    grouped
}

fn build_page(page: LoadedPage) -> MessagePage {
    let next_cursor = if page.has_more {
        page.rows.last().map(encode_cursor)
    } else {
        None
    };
    let has_more = page.has_more;

    let mut grouped = group_reactions(&page.reactions);
    let messages = page
        .rows
        .into_iter()
        .map(|row| {
            let reactions = grouped.remove(&row.id).unwrap_or_default();
            let thread = page.threads.iter().find(|t| t.parent_message_id == row.id);
            message_response(row, reactions, thread)
        })
        .collect();

    MessagePage {
        messages,
        next_cursor,
        has_more,
    }
}

/// GET /messages: one newest-first page of a channel, conversation, or
/// thread stream, annotated for rendering.
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessagePage>> {
    let scope = scope_from(query.channel_id, query.conversation_id, query.parent_message_id)?;
    let before = query.before.as_deref().map(parse_cursor).transpose()?;
    let limit = page_limit(query.limit);

    let page = load_page(state, claims.sub.to_string(), scope, before, limit).await?;

    Ok(Json(build_page(page)))
}

/// GET /messages/feed: the same page run through the feed assembler:
/// day sections newest-day-first, each oldest-first with compact flags and
/// a shared date label.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<DaySection<MessageResponse>>>> {
    let scope = scope_from(query.channel_id, query.conversation_id, query.parent_message_id)?;
    let before = query.before.as_deref().map(parse_cursor).transpose()?;
    let limit = page_limit(query.limit);
    let offset = viewer_offset(query.tz_offset)?;

    let page = load_page(state, claims.sub.to_string(), scope, before, limit).await?;

    let today = chrono::Utc::now().with_timezone(&offset).date_naive();

    let mut feed = FeedAssembler::new(offset);
    feed.push_page(build_page(page).messages);

    Ok(Json(feed.into_sections(today)))
}

/// GET /messages/{id}: a single message (e.g. a thread root).
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessageResponse>> {
    let row = state
        .db
        .get_message(&message_id.to_string(), &claims.sub.to_string())?;

    let ids = vec![row.id.clone()];
    let reactions = state.db.reactions_for_messages(&ids)?;
    let threads = state.db.thread_summaries(&ids)?;

    let mut grouped = group_reactions(&reactions);
    let reactions = grouped.remove(&row.id).unwrap_or_default();
    Ok(Json(message_response(row, reactions, threads.first())))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let scope = scope_from(req.channel_id, req.conversation_id, req.parent_message_id)?;

    // An attached image must be a claimed upload.
    if let Some(image_id) = req.image_id {
        state
            .db
            .get_upload(&image_id.to_string())?
            .ok_or(ApiError::NotFound("file"))?;
    }

    let message_id = Uuid::new_v4();
    let user_id = claims.sub.to_string();

    let db_state = state.clone();
    let body = req.body.clone();
    let image_id = req.image_id.map(|id| id.to_string());
    let row = tokio::task::spawn_blocking(move || {
        db_state.db.create_message(
            &message_id.to_string(),
            &user_id,
            &scope,
            &body,
            image_id.as_deref(),
        )
    })
    .await
    .map_err(join_error)??;

    let response = message_response(row.clone(), vec![], None);

    if let Some(stream) = stream_scope(&row) {
        publish(
            &state,
            stream,
            GatewayEvent::MessageCreate {
                scope: stream,
                message: response.clone(),
            },
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let row = state.db.edit_message(
        &message_id.to_string(),
        &claims.sub.to_string(),
        &req.body,
    )?;

    let response = message_response(row.clone(), vec![], None);

    if let Some(stream) = stream_scope(&row) {
        publish(
            &state,
            stream,
            GatewayEvent::MessageUpdate {
                scope: stream,
                message: response.clone(),
            },
        )
        .await;
    }

    Ok(Json(response))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let row = state
        .db
        .delete_message(&message_id.to_string(), &claims.sub.to_string())?;

    if let Some(stream) = stream_scope(&row) {
        publish(
            &state,
            stream,
            GatewayEvent::MessageDelete {
                scope: stream,
                message_id,
            },
        )
        .await;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_splits_on_the_first_pipe() {
        let (ts, id) = parse_cursor("2024-06-01T10:00:00.000Z|abc-123").unwrap();
        assert_eq!(ts, "2024-06-01T10:00:00.000Z");
        assert_eq!(id, "abc-123");

        assert!(matches!(
            parse_cursor("2024-06-01T10:00:00.000Z"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn limit_is_clamped_at_both_ends() {
        // limit=0 would hand back an empty page with has_more=true and no
        // cursor, stalling a cursor-following client.
        assert_eq!(page_limit(0), 1);
        assert_eq!(page_limit(50), 50);
        assert_eq!(page_limit(5000), 200);
    }

    #[test]
    fn viewer_offset_rejects_nonsense_without_panicking() {
        assert_eq!(
            viewer_offset(120).unwrap(),
            FixedOffset::east_opt(7200).unwrap()
        );
        assert_eq!(
            viewer_offset(-300).unwrap(),
            FixedOffset::east_opt(-18000).unwrap()
        );

        // More minutes than a day holds.
        assert!(matches!(
            viewer_offset(100_000),
            Err(ApiError::Validation(_))
        ));
        // Would overflow the seconds multiply.
        assert!(matches!(
            viewer_offset(i32::MAX),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            viewer_offset(i32::MIN),
            Err(ApiError::Validation(_))
        ));
    }
}
