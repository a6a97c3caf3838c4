use rusqlite::{Connection, OptionalExtension};

use crate::models::ConversationRow;
use crate::queries::require_member;
use crate::{Database, StoreError, StoreResult, now_rfc3339};

fn map_conversation(row: &rusqlite::Row) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        member_one_id: row.get(2)?,
        member_two_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn conversation_by_id(conn: &Connection, id: &str) -> StoreResult<Option<ConversationRow>> {
    let row = conn
        .query_row(
            "SELECT id, workspace_id, member_one_id, member_two_id, created_at
             FROM conversations WHERE id = ?1",
            [id],
            map_conversation,
        )
        .optional()?;

    Ok(row)
}

impl Database {
    /// Find or create the conversation between the caller and another
    /// member of the same workspace. The pair is unordered, so an existing
    /// conversation is matched in either direction. Using the caller's own
    /// member id yields a self-conversation.
    pub fn create_or_get_conversation(
        &self,
        id: &str,
        workspace_id: &str,
        user_id: &str,
        other_member_id: &str,
    ) -> StoreResult<ConversationRow> {
        self.with_conn_mut(|conn| {
            let caller = require_member(conn, workspace_id, user_id)?;

            let other: Option<String> = conn
                .query_row(
                    "SELECT id FROM members WHERE id = ?1 AND workspace_id = ?2",
                    [other_member_id, workspace_id],
                    |row| row.get(0),
                )
                .optional()?;
            let other = other.ok_or(StoreError::NotFound("member"))?;

            let existing = conn
                .query_row(
                    "SELECT id, workspace_id, member_one_id, member_two_id, created_at
                     FROM conversations
                     WHERE workspace_id = ?1
                       AND ((member_one_id = ?2 AND member_two_id = ?3)
                         OR (member_one_id = ?3 AND member_two_id = ?2))",
                    [workspace_id, caller.id.as_str(), other.as_str()],
                    map_conversation,
                )
                .optional()?;

            if let Some(conversation) = existing {
                return Ok(conversation);
            }

            let conversation = ConversationRow {
                id: id.to_string(),
                workspace_id: workspace_id.to_string(),
                member_one_id: caller.id,
                member_two_id: other,
                created_at: now_rfc3339(),
            };

            conn.execute(
                "INSERT INTO conversations (id, workspace_id, member_one_id, member_two_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    &conversation.id,
                    &conversation.workspace_id,
                    &conversation.member_one_id,
                    &conversation.member_two_id,
                    &conversation.created_at,
                ),
            )?;

            Ok(conversation)
        })
    }

    /// User ids of a conversation's two participants, for targeted gateway
    /// delivery.
    pub fn conversation_user_ids(&self, conversation_id: &str) -> StoreResult<(String, String)> {
        self.with_conn(|conn| {
            let conversation = conversation_by_id(conn, conversation_id)?
                .ok_or(StoreError::NotFound("conversation"))?;

            let user_for = |member_id: &str| -> StoreResult<String> {
                Ok(conn.query_row(
                    "SELECT user_id FROM members WHERE id = ?1",
                    [member_id],
                    |row| row.get(0),
                )?)
            };

            Ok((
                user_for(&conversation.member_one_id)?,
                user_for(&conversation.member_two_id)?,
            ))
        })
    }
}
