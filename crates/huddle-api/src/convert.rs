use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use huddle_db::models::{ChannelRow, MemberWithUserRow, MessageRow, ThreadSummaryRow, WorkspaceRow};
use huddle_types::api::{
    ChannelResponse, MemberResponse, MessageResponse, ReactionGroup, ThreadSummary,
    WorkspaceResponse,
};
use huddle_types::models::Role;

/// Stored ids are uuid TEXT; a row that fails to parse means on-disk
/// corruption, which we log and surface as a nil id rather than failing
/// the whole page.
pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}': {}", raw, e);
        DateTime::default()
    })
}

pub(crate) fn workspace_response(row: WorkspaceRow, include_join_code: bool) -> WorkspaceResponse {
    WorkspaceResponse {
        id: parse_id(&row.id),
        name: row.name,
        join_code: include_join_code.then_some(row.join_code),
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn channel_response(row: ChannelRow) -> ChannelResponse {
    ChannelResponse {
        id: parse_id(&row.id),
        workspace_id: parse_id(&row.workspace_id),
        name: row.name,
        created_at: parse_ts(&row.created_at),
    }
}

pub(crate) fn member_response(row: MemberWithUserRow) -> MemberResponse {
    MemberResponse {
        id: parse_id(&row.member.id),
        workspace_id: parse_id(&row.member.workspace_id),
        user_id: parse_id(&row.member.user_id),
        username: row.username,
        image: row.image,
        role: Role::parse(&row.member.role).unwrap_or(Role::Member),
    }
}

/// Assemble the full annotated message the feed renders from: author
/// record, resolved attachment URL, grouped reactions, thread summary.
pub(crate) fn message_response(
    row: MessageRow,
    reactions: Vec<ReactionGroup>,
    thread: Option<&ThreadSummaryRow>,
) -> MessageResponse {
    MessageResponse {
        id: parse_id(&row.id),
        workspace_id: parse_id(&row.workspace_id),
        member_id: parse_id(&row.member_id),
        author_name: row.author_name,
        author_image: row.author_image,
        body: row.body,
        image_url: row.image_id.as_deref().map(file_url),
        channel_id: row.channel_id.as_deref().map(parse_id),
        conversation_id: row.conversation_id.as_deref().map(parse_id),
        parent_message_id: row.parent_message_id.as_deref().map(parse_id),
        created_at: parse_ts(&row.created_at),
        updated_at: row.updated_at.as_deref().map(parse_ts),
        reactions,
        thread: thread.map(|summary| ThreadSummary {
            count: summary.count,
            last_reply_at: parse_ts(&summary.last_reply_at),
            last_reply_author_name: summary.last_reply_author_name.clone(),
            last_reply_author_image: summary.last_reply_author_image.clone(),
        }),
    }
}

/// Stored attachments are served from the files route.
pub(crate) fn file_url(file_id: &str) -> String {
    format!("/files/{file_id}")
}
