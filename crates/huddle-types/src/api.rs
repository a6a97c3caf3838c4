use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

// -- JWT Claims --

/// JWT claims shared across huddle-api (REST middleware) and huddle-gateway
/// (WebSocket Identify). Canonical definition lives here in huddle-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Workspaces --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameWorkspaceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinWorkspaceRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub id: Uuid,
    pub name: String,
    /// Only present for admin members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JoinCodeResponse {
    pub join_code: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameChannelRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// -- Members --

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub image: Option<String>,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    /// The other member of the pair. Passing the caller's own member id
    /// yields a self-conversation (notes to self).
    pub member_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub member_one_id: Uuid,
    pub member_two_id: Uuid,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub image_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub body: String,
}

/// Summary of the reply thread hanging off a message, shown inline under
/// the thread root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub count: u64,
    pub last_reply_at: DateTime<Utc>,
    pub last_reply_author_name: String,
    pub last_reply_author_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub value: String,
    pub count: usize,
    pub member_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub member_id: Uuid,
    pub author_name: String,
    pub author_image: Option<String>,
    pub body: String,
    pub image_url: Option<String>,
    pub channel_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub parent_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub reactions: Vec<ReactionGroup>,
    pub thread: Option<ThreadSummary>,
}

/// One page of a reverse-chronological message stream.
#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageResponse>,
    /// Pass back as `before` to fetch the next older page.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub value: String,
}

/// Tagged toggle outcome so callers never have to infer add-vs-remove from
/// presence or absence of a row.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ToggleReactionResponse {
    Added { reaction_id: Uuid },
    Removed { reaction_id: Uuid },
}
