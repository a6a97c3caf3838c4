use rusqlite::{Connection, OptionalExtension};

use crate::models::ChannelRow;
use crate::queries::{require_admin, require_member};
use crate::{Database, StoreError, StoreResult, now_rfc3339};

/// Channel names are stored normalized: lowercased, spaces collapsed to
/// dashes.
fn normalize_name(raw: &str) -> StoreResult<String> {
    let name: String = raw
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    if name.is_empty() {
        return Err(StoreError::validation("channel name must not be empty"));
    }
    Ok(name)
}

fn map_channel(row: &rusqlite::Row) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn channel_by_id(conn: &Connection, id: &str) -> StoreResult<Option<ChannelRow>> {
    let row = conn
        .query_row(
            "SELECT id, workspace_id, name, created_at FROM channels WHERE id = ?1",
            [id],
            map_channel,
        )
        .optional()?;

    Ok(row)
}

impl Database {
    pub fn list_channels(&self, workspace_id: &str, user_id: &str) -> StoreResult<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            require_member(conn, workspace_id, user_id)?;

            let mut stmt = conn.prepare(
                "SELECT id, workspace_id, name, created_at
                 FROM channels
                 WHERE workspace_id = ?1
                 ORDER BY created_at ASC",
            )?;

            let rows = stmt
                .query_map([workspace_id], map_channel)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_channel(&self, channel_id: &str, user_id: &str) -> StoreResult<ChannelRow> {
        self.with_conn(|conn| {
            let channel =
                channel_by_id(conn, channel_id)?.ok_or(StoreError::NotFound("channel"))?;
            require_member(conn, &channel.workspace_id, user_id)?;
            Ok(channel)
        })
    }

    /// Create a channel. Admin only.
    pub fn create_channel(
        &self,
        id: &str,
        workspace_id: &str,
        user_id: &str,
        name: &str,
    ) -> StoreResult<ChannelRow> {
        let name = normalize_name(name)?;

        self.with_conn_mut(|conn| {
            let member = require_member(conn, workspace_id, user_id)?;
            require_admin(&member)?;

            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO channels (id, workspace_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, workspace_id, &name, &now),
            )?;

            Ok(ChannelRow {
                id: id.to_string(),
                workspace_id: workspace_id.to_string(),
                name,
                created_at: now,
            })
        })
    }

    /// Rename a channel. Admin only.
    pub fn rename_channel(&self, channel_id: &str, user_id: &str, name: &str) -> StoreResult<ChannelRow> {
        let name = normalize_name(name)?;

        self.with_conn_mut(|conn| {
            let mut channel =
                channel_by_id(conn, channel_id)?.ok_or(StoreError::NotFound("channel"))?;
            let member = require_member(conn, &channel.workspace_id, user_id)?;
            require_admin(&member)?;

            conn.execute(
                "UPDATE channels SET name = ?1 WHERE id = ?2",
                [name.as_str(), channel_id],
            )?;

            channel.name = name;
            Ok(channel)
        })
    }

    /// Delete a channel and the messages/reactions in it. Admin only.
    pub fn delete_channel(&self, channel_id: &str, user_id: &str) -> StoreResult<ChannelRow> {
        self.with_conn_mut(|conn| {
            let channel =
                channel_by_id(conn, channel_id)?.ok_or(StoreError::NotFound("channel"))?;
            let member = require_member(conn, &channel.workspace_id, user_id)?;
            require_admin(&member)?;

            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (
                     SELECT id FROM messages WHERE channel_id = ?1)",
                [channel_id],
            )?;
            tx.execute("DELETE FROM messages WHERE channel_id = ?1", [channel_id])?;
            tx.execute("DELETE FROM channels WHERE id = ?1", [channel_id])?;
            tx.commit()?;

            Ok(channel)
        })
    }
}
