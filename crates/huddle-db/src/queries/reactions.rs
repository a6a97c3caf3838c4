use rusqlite::OptionalExtension;

use crate::models::{ReactionRow, ReactionToggle};
use crate::queries::messages::message_by_id;
use crate::queries::require_member;
use crate::{Database, StoreError, StoreResult, now_rfc3339};

impl Database {
    /// Toggle a reaction: removes the row if the exact (message, member,
    /// value) triple exists, inserts one otherwise. Applying the same
    /// toggle twice restores the prior state. The membership guard runs in
    /// the same closure as the write, so a rejected toggle changes nothing.
    pub fn toggle_reaction(
        &self,
        id: &str,
        user_id: &str,
        message_id: &str,
        value: &str,
    ) -> StoreResult<ReactionToggle> {
        self.with_conn_mut(|conn| {
            let message =
                message_by_id(conn, message_id)?.ok_or(StoreError::NotFound("message"))?;
            let member = require_member(conn, &message.workspace_id, user_id)?;

            // Scan for the exact triple rather than relying on a unique
            // key: a member can hold several distinct values on one
            // message, one row each.
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM reactions
                     WHERE message_id = ?1 AND member_id = ?2 AND value = ?3",
                    [message_id, member.id.as_str(), value],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute("DELETE FROM reactions WHERE id = ?1", [&existing_id])?;
                Ok(ReactionToggle::Removed(existing_id))
            } else {
                conn.execute(
                    "INSERT INTO reactions (id, workspace_id, message_id, member_id, value, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (
                        id,
                        &message.workspace_id,
                        message_id,
                        &member.id,
                        value,
                        now_rfc3339(),
                    ),
                )?;
                Ok(ReactionToggle::Added(id.to_string()))
            }
        })
    }

    /// Batch-fetch reactions for a page of message ids.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> StoreResult<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, workspace_id, message_id, member_id, value, created_at
                 FROM reactions WHERE message_id IN ({})
                 ORDER BY created_at ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(ReactionRow {
                        id: row.get(0)?,
                        workspace_id: row.get(1)?,
                        message_id: row.get(2)?,
                        member_id: row.get(3)?,
                        value: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
