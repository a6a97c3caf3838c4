use rusqlite::{Connection, OptionalExtension};

use huddle_types::models::MessageScope;

use crate::models::{ConversationRow, MemberRow, MessageRow, ThreadSummaryRow};
use crate::queries::channels::channel_by_id;
use crate::queries::conversations::conversation_by_id;
use crate::queries::require_member;
use crate::{Database, StoreError, StoreResult, now_rfc3339};

const MESSAGE_COLUMNS: &str = "m.id, m.workspace_id, m.member_id, m.channel_id, m.conversation_id,
        m.parent_message_id, m.body, m.image_id, m.created_at, m.updated_at,
        u.username, u.image";

const MESSAGE_JOINS: &str = "FROM messages m
        JOIN members mb ON m.member_id = mb.id
        JOIN users u ON mb.user_id = u.id";

fn map_message(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        member_id: row.get(2)?,
        channel_id: row.get(3)?,
        conversation_id: row.get(4)?,
        parent_message_id: row.get(5)?,
        body: row.get(6)?,
        image_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        author_name: row.get(10)?,
        author_image: row.get(11)?,
    })
}

pub(crate) fn message_by_id(conn: &Connection, id: &str) -> StoreResult<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} {MESSAGE_JOINS} WHERE m.id = ?1");
    let row = conn.query_row(&sql, [id], map_message).optional()?;
    Ok(row)
}

/// Conversations are private to their two participants; workspace
/// membership alone is not enough.
fn require_participant(member: &MemberRow, conversation: &ConversationRow) -> StoreResult<()> {
    if conversation.member_one_id == member.id || conversation.member_two_id == member.id {
        Ok(())
    } else {
        Err(StoreError::Unauthorized)
    }
}

/// Resolved target of a message operation: the caller's membership plus the
/// scope columns a stored row will carry.
struct ResolvedScope {
    member: MemberRow,
    workspace_id: String,
    channel_id: Option<String>,
    conversation_id: Option<String>,
    parent_message_id: Option<String>,
}

fn resolve_scope(conn: &Connection, user_id: &str, scope: &MessageScope) -> StoreResult<ResolvedScope> {
    match scope {
        MessageScope::Channel(channel_id) => {
            let channel = channel_by_id(conn, &channel_id.to_string())?
                .ok_or(StoreError::NotFound("channel"))?;
            let member = require_member(conn, &channel.workspace_id, user_id)?;
            Ok(ResolvedScope {
                member,
                workspace_id: channel.workspace_id,
                channel_id: Some(channel.id),
                conversation_id: None,
                parent_message_id: None,
            })
        }
        MessageScope::Conversation(conversation_id) => {
            let conversation = conversation_by_id(conn, &conversation_id.to_string())?
                .ok_or(StoreError::NotFound("conversation"))?;
            let member = require_member(conn, &conversation.workspace_id, user_id)?;
            require_participant(&member, &conversation)?;
            Ok(ResolvedScope {
                member,
                workspace_id: conversation.workspace_id,
                channel_id: None,
                conversation_id: Some(conversation.id),
                parent_message_id: None,
            })
        }
        MessageScope::Thread(parent_id) => {
            // Replies inherit the parent's scope columns.
            let parent = message_by_id(conn, &parent_id.to_string())?
                .ok_or(StoreError::NotFound("message"))?;
            let member = require_member(conn, &parent.workspace_id, user_id)?;
            if let Some(conversation_id) = &parent.conversation_id {
                let conversation = conversation_by_id(conn, conversation_id)?
                    .ok_or(StoreError::NotFound("conversation"))?;
                require_participant(&member, &conversation)?;
            }
            Ok(ResolvedScope {
                member,
                workspace_id: parent.workspace_id,
                channel_id: parent.channel_id,
                conversation_id: parent.conversation_id,
                parent_message_id: Some(parent.id),
            })
        }
    }
}

impl Database {
    /// Guarded message create. The caller must be a member of the scope's
    /// workspace (and a participant, for conversations).
    pub fn create_message(
        &self,
        id: &str,
        user_id: &str,
        scope: &MessageScope,
        body: &str,
        image_id: Option<&str>,
    ) -> StoreResult<MessageRow> {
        if body.trim().is_empty() && image_id.is_none() {
            return Err(StoreError::validation("message body must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let resolved = resolve_scope(conn, user_id, scope)?;
            let now = now_rfc3339();

            conn.execute(
                "INSERT INTO messages (id, workspace_id, member_id, channel_id, conversation_id,
                                       parent_message_id, body, image_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                (
                    id,
                    &resolved.workspace_id,
                    &resolved.member.id,
                    &resolved.channel_id,
                    &resolved.conversation_id,
                    &resolved.parent_message_id,
                    body,
                    image_id,
                    &now,
                ),
            )?;

            message_by_id(conn, id)?.ok_or(StoreError::NotFound("message"))
        })
    }

    /// One page of a scope's stream, newest-first. `before` is the
    /// (created_at, id) of the oldest message from the previous page. The
    /// cursor compares both columns because created_at has millisecond
    /// precision and a burst can land several messages on one tick;
    /// filtering on the timestamp alone would skip the tick's remainder.
    /// Returns the page plus a flag for whether older messages remain.
    pub fn list_messages(
        &self,
        user_id: &str,
        scope: &MessageScope,
        before: Option<(&str, &str)>,
        limit: u32,
    ) -> StoreResult<(Vec<MessageRow>, bool)> {
        self.with_conn(|conn| {
            let resolved = resolve_scope(conn, user_id, scope)?;

            let filter = match scope {
                MessageScope::Channel(_) => "m.channel_id = ?1 AND m.parent_message_id IS NULL",
                MessageScope::Conversation(_) => {
                    "m.conversation_id = ?1 AND m.parent_message_id IS NULL"
                }
                MessageScope::Thread(_) => "m.parent_message_id = ?1",
            };
            let scope_key = resolved
                .parent_message_id
                .or(resolved.channel_id)
                .or(resolved.conversation_id)
                .ok_or(StoreError::NotFound("message"))?;

            let cursor_clause = if before.is_some() {
                "AND (m.created_at < ?2 OR (m.created_at = ?2 AND m.id < ?3))"
            } else {
                ""
            };

            // Fetch one extra row to learn whether the stream is exhausted.
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} {MESSAGE_JOINS}
                 WHERE {filter} {cursor_clause}
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT {}",
                limit as usize + 1
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = match before {
                Some((ts, id)) => stmt
                    .query_map([scope_key.as_str(), ts, id], map_message)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map([scope_key.as_str()], map_message)?
                    .collect::<Result<Vec<_>, _>>()?,
            };

            let has_more = rows.len() > limit as usize;
            rows.truncate(limit as usize);

            Ok((rows, has_more))
        })
    }

    /// One message (e.g. a thread root), guarded.
    pub fn get_message(&self, message_id: &str, user_id: &str) -> StoreResult<MessageRow> {
        self.with_conn(|conn| {
            let message =
                message_by_id(conn, message_id)?.ok_or(StoreError::NotFound("message"))?;
            let member = require_member(conn, &message.workspace_id, user_id)?;
            if let Some(conversation_id) = &message.conversation_id {
                let conversation = conversation_by_id(conn, conversation_id)?
                    .ok_or(StoreError::NotFound("conversation"))?;
                require_participant(&member, &conversation)?;
            }
            Ok(message)
        })
    }

    /// Author-only edit. Sets updated_at.
    pub fn edit_message(&self, message_id: &str, user_id: &str, body: &str) -> StoreResult<MessageRow> {
        if body.trim().is_empty() {
            return Err(StoreError::validation("message body must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let message =
                message_by_id(conn, message_id)?.ok_or(StoreError::NotFound("message"))?;
            let member = require_member(conn, &message.workspace_id, user_id)?;
            if member.id != message.member_id {
                return Err(StoreError::Unauthorized);
            }

            conn.execute(
                "UPDATE messages SET body = ?1, updated_at = ?2 WHERE id = ?3",
                [body, &now_rfc3339(), message_id],
            )?;

            message_by_id(conn, message_id)?.ok_or(StoreError::NotFound("message"))
        })
    }

    /// Author-only delete. Removes the message's replies and all reactions
    /// hanging off either. Returns the deleted row for event fan-out.
    pub fn delete_message(&self, message_id: &str, user_id: &str) -> StoreResult<MessageRow> {
        self.with_conn_mut(|conn| {
            let message =
                message_by_id(conn, message_id)?.ok_or(StoreError::NotFound("message"))?;
            let member = require_member(conn, &message.workspace_id, user_id)?;
            if member.id != message.member_id {
                return Err(StoreError::Unauthorized);
            }

            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (
                     SELECT id FROM messages WHERE parent_message_id = ?1)",
                [message_id],
            )?;
            tx.execute(
                "DELETE FROM messages WHERE parent_message_id = ?1",
                [message_id],
            )?;
            tx.execute("DELETE FROM reactions WHERE message_id = ?1", [message_id])?;
            tx.execute("DELETE FROM messages WHERE id = ?1", [message_id])?;
            tx.commit()?;

            Ok(message)
        })
    }

    /// Batch thread summaries for one page of thread roots: reply count,
    /// last reply time, and the last reply's author. Folded in memory from
    /// one query to avoid an N+1 per root.
    pub fn thread_summaries(&self, message_ids: &[String]) -> StoreResult<Vec<ThreadSummaryRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT m.parent_message_id, m.created_at, u.username, u.image
                 {MESSAGE_JOINS}
                 WHERE m.parent_message_id IN ({})
                 ORDER BY m.created_at ASC, m.id ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let mut summaries: Vec<ThreadSummaryRow> = Vec::new();
            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;

            // Rows arrive oldest-first, so the last row seen per parent is
            // the latest reply.
            for row in rows {
                let (parent_id, created_at, author_name, author_image) = row?;
                match summaries.iter_mut().find(|s| s.parent_message_id == parent_id) {
                    Some(summary) => {
                        summary.count += 1;
                        summary.last_reply_at = created_at;
                        summary.last_reply_author_name = author_name;
                        summary.last_reply_author_image = author_image;
                    }
                    None => summaries.push(ThreadSummaryRow {
                        parent_message_id: parent_id,
                        count: 1,
                        last_reply_at: created_at,
                        last_reply_author_name: author_name,
                        last_reply_author_image: author_image,
                    }),
                }
            }

            Ok(summaries)
        })
    }
}
