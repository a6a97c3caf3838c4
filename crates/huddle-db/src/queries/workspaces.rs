use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{MemberRow, WorkspaceRow};
use crate::queries::{member_for, require_admin, require_member};
use crate::{Database, StoreError, StoreResult, now_rfc3339};

fn map_workspace(row: &rusqlite::Row) -> rusqlite::Result<WorkspaceRow> {
    Ok(WorkspaceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        join_code: row.get(2)?,
        creator_user_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn workspace_by_id(conn: &Connection, id: &str) -> StoreResult<Option<WorkspaceRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, join_code, creator_user_id, created_at
             FROM workspaces WHERE id = ?1",
            [id],
            map_workspace,
        )
        .optional()?;

    Ok(row)
}

impl Database {
    /// Create a workspace. The creator becomes its admin member and a
    /// default `general` channel is seeded, all in one transaction.
    pub fn create_workspace(
        &self,
        id: &str,
        user_id: &str,
        name: &str,
        join_code: &str,
    ) -> StoreResult<WorkspaceRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("workspace name must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO workspaces (id, name, join_code, creator_user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, name, join_code, user_id, &now),
            )?;
            tx.execute(
                "INSERT INTO members (id, workspace_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, 'admin', ?4)",
                (Uuid::new_v4().to_string(), id, user_id, &now),
            )?;
            tx.execute(
                "INSERT INTO channels (id, workspace_id, name, created_at)
                 VALUES (?1, ?2, 'general', ?3)",
                (Uuid::new_v4().to_string(), id, &now),
            )?;

            tx.commit()?;

            Ok(WorkspaceRow {
                id: id.to_string(),
                name: name.to_string(),
                join_code: join_code.to_string(),
                creator_user_id: user_id.to_string(),
                created_at: now,
            })
        })
    }

    /// All workspaces the user belongs to, with their membership.
    pub fn workspaces_for_user(&self, user_id: &str) -> StoreResult<Vec<(WorkspaceRow, MemberRow)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT w.id, w.name, w.join_code, w.creator_user_id, w.created_at,
                        m.id, m.workspace_id, m.user_id, m.role, m.created_at
                 FROM workspaces w
                 JOIN members m ON m.workspace_id = w.id
                 WHERE m.user_id = ?1
                 ORDER BY w.created_at ASC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok((
                        WorkspaceRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            join_code: row.get(2)?,
                            creator_user_id: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        MemberRow {
                            id: row.get(5)?,
                            workspace_id: row.get(6)?,
                            user_id: row.get(7)?,
                            role: row.get(8)?,
                            created_at: row.get(9)?,
                        },
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// One workspace, guarded. Returns the caller's membership alongside so
    /// the API layer can withhold the join code from non-admins.
    pub fn get_workspace(&self, workspace_id: &str, user_id: &str) -> StoreResult<(WorkspaceRow, MemberRow)> {
        self.with_conn(|conn| {
            let workspace =
                workspace_by_id(conn, workspace_id)?.ok_or(StoreError::NotFound("workspace"))?;
            let member = require_member(conn, workspace_id, user_id)?;
            Ok((workspace, member))
        })
    }

    /// Rename a workspace. Admin only; empty names rejected.
    pub fn rename_workspace(&self, workspace_id: &str, user_id: &str, name: &str) -> StoreResult<WorkspaceRow> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("workspace name must not be empty"));
        }

        self.with_conn_mut(|conn| {
            let mut workspace =
                workspace_by_id(conn, workspace_id)?.ok_or(StoreError::NotFound("workspace"))?;
            let member = require_member(conn, workspace_id, user_id)?;
            require_admin(&member)?;

            conn.execute(
                "UPDATE workspaces SET name = ?1 WHERE id = ?2",
                [name, workspace_id],
            )?;

            workspace.name = name.to_string();
            Ok(workspace)
        })
    }

    /// Delete a workspace and everything under it. Admin only.
    pub fn delete_workspace(&self, workspace_id: &str, user_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            workspace_by_id(conn, workspace_id)?.ok_or(StoreError::NotFound("workspace"))?;
            let member = require_member(conn, workspace_id, user_id)?;
            require_admin(&member)?;

            let tx = conn.transaction()?;
            tx.execute("DELETE FROM reactions WHERE workspace_id = ?1", [workspace_id])?;
            tx.execute("DELETE FROM messages WHERE workspace_id = ?1", [workspace_id])?;
            tx.execute("DELETE FROM conversations WHERE workspace_id = ?1", [workspace_id])?;
            tx.execute("DELETE FROM channels WHERE workspace_id = ?1", [workspace_id])?;
            tx.execute("DELETE FROM members WHERE workspace_id = ?1", [workspace_id])?;
            tx.execute("DELETE FROM workspaces WHERE id = ?1", [workspace_id])?;
            tx.commit()?;

            Ok(())
        })
    }

    /// Replace the join code. Admin only.
    pub fn rotate_join_code(&self, workspace_id: &str, user_id: &str, new_code: &str) -> StoreResult<String> {
        self.with_conn_mut(|conn| {
            workspace_by_id(conn, workspace_id)?.ok_or(StoreError::NotFound("workspace"))?;
            let member = require_member(conn, workspace_id, user_id)?;
            require_admin(&member)?;

            conn.execute(
                "UPDATE workspaces SET join_code = ?1 WHERE id = ?2",
                [new_code, workspace_id],
            )?;

            Ok(new_code.to_string())
        })
    }

    /// Join a workspace with its current join code. Idempotent for users
    /// who are already members.
    pub fn join_workspace(&self, workspace_id: &str, user_id: &str, code: &str) -> StoreResult<MemberRow> {
        self.with_conn_mut(|conn| {
            let workspace =
                workspace_by_id(conn, workspace_id)?.ok_or(StoreError::NotFound("workspace"))?;

            if !workspace.join_code.eq_ignore_ascii_case(code.trim()) {
                return Err(StoreError::validation("invalid join code"));
            }

            if let Some(existing) = member_for(conn, workspace_id, user_id)? {
                return Ok(existing);
            }

            let member = MemberRow {
                id: Uuid::new_v4().to_string(),
                workspace_id: workspace_id.to_string(),
                user_id: user_id.to_string(),
                role: "member".to_string(),
                created_at: now_rfc3339(),
            };

            conn.execute(
                "INSERT INTO members (id, workspace_id, user_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    &member.id,
                    &member.workspace_id,
                    &member.user_id,
                    &member.role,
                    &member.created_at,
                ),
            )?;

            Ok(member)
        })
    }
}
