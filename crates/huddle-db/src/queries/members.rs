use rusqlite::{Connection, OptionalExtension};

use huddle_types::models::Role;

use crate::models::{MemberRow, MemberWithUserRow};
use crate::{Database, StoreError, StoreResult};

/// Membership Guard: resolve the unique (workspace, user) membership, if any.
/// Every workspace-scoped query and mutation goes through this before
/// touching data.
pub(crate) fn member_for(
    conn: &Connection,
    workspace_id: &str,
    user_id: &str,
) -> StoreResult<Option<MemberRow>> {
    let row = conn
        .query_row(
            "SELECT id, workspace_id, user_id, role, created_at
             FROM members
             WHERE workspace_id = ?1 AND user_id = ?2",
            [workspace_id, user_id],
            map_member,
        )
        .optional()?;

    Ok(row)
}

/// Guard that rejects non-members outright.
pub(crate) fn require_member(
    conn: &Connection,
    workspace_id: &str,
    user_id: &str,
) -> StoreResult<MemberRow> {
    member_for(conn, workspace_id, user_id)?.ok_or(StoreError::Unauthorized)
}

/// Admin-restricted operations call this on the already-resolved membership.
pub(crate) fn require_admin(member: &MemberRow) -> StoreResult<()> {
    if member.is_admin() {
        Ok(())
    } else {
        Err(StoreError::Unauthorized)
    }
}

pub(crate) fn map_member(row: &rusqlite::Row) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn member_by_id(conn: &Connection, member_id: &str) -> StoreResult<Option<MemberRow>> {
    let row = conn
        .query_row(
            "SELECT id, workspace_id, user_id, role, created_at
             FROM members WHERE id = ?1",
            [member_id],
            map_member,
        )
        .optional()?;

    Ok(row)
}

impl Database {
    /// The caller's own membership in a workspace, or None.
    pub fn current_member(&self, workspace_id: &str, user_id: &str) -> StoreResult<Option<MemberRow>> {
        self.with_conn(|conn| member_for(conn, workspace_id, user_id))
    }

    /// Workspace roster, joined with user names and avatars.
    pub fn list_members(&self, workspace_id: &str, user_id: &str) -> StoreResult<Vec<MemberWithUserRow>> {
        self.with_conn(|conn| {
            require_member(conn, workspace_id, user_id)?;

            let mut stmt = conn.prepare(
                "SELECT m.id, m.workspace_id, m.user_id, m.role, m.created_at, u.username, u.image
                 FROM members m
                 JOIN users u ON m.user_id = u.id
                 WHERE m.workspace_id = ?1
                 ORDER BY m.created_at ASC",
            )?;

            let rows = stmt
                .query_map([workspace_id], |row| {
                    Ok(MemberWithUserRow {
                        member: MemberRow {
                            id: row.get(0)?,
                            workspace_id: row.get(1)?,
                            user_id: row.get(2)?,
                            role: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                        username: row.get(5)?,
                        image: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Look up one member joined with its user record. Guarded by the
    /// caller's membership in the same workspace.
    pub fn get_member(&self, member_id: &str, user_id: &str) -> StoreResult<MemberWithUserRow> {
        self.with_conn(|conn| {
            let target = member_by_id(conn, member_id)?.ok_or(StoreError::NotFound("member"))?;
            require_member(conn, &target.workspace_id, user_id)?;

            let (username, image) = conn.query_row(
                "SELECT username, image FROM users WHERE id = ?1",
                [&target.user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(MemberWithUserRow {
                member: target,
                username,
                image,
            })
        })
    }

    /// Change a member's role. Admin only.
    pub fn update_member_role(
        &self,
        member_id: &str,
        caller_user_id: &str,
        role: Role,
    ) -> StoreResult<MemberRow> {
        self.with_conn_mut(|conn| {
            let mut target =
                member_by_id(conn, member_id)?.ok_or(StoreError::NotFound("member"))?;
            let caller = require_member(conn, &target.workspace_id, caller_user_id)?;
            require_admin(&caller)?;

            conn.execute(
                "UPDATE members SET role = ?1 WHERE id = ?2",
                [role.as_str(), member_id],
            )?;

            target.role = role.as_str().to_string();
            Ok(target)
        })
    }

    /// Remove a member from a workspace, together with their messages,
    /// reactions, and conversations. Admins may remove anyone but
    /// themselves; non-admins may only remove themselves (leave).
    pub fn remove_member(&self, member_id: &str, caller_user_id: &str) -> StoreResult<MemberRow> {
        self.with_conn_mut(|conn| {
            let target =
                member_by_id(conn, member_id)?.ok_or(StoreError::NotFound("member"))?;
            let caller = require_member(conn, &target.workspace_id, caller_user_id)?;

            if target.id == caller.id {
                if caller.is_admin() {
                    return Err(StoreError::validation(
                        "an admin cannot remove themselves",
                    ));
                }
            } else {
                require_admin(&caller)?;
            }

            let tx = conn.transaction()?;

            // Their reactions, and reactions sitting on content about to go.
            tx.execute("DELETE FROM reactions WHERE member_id = ?1", [&target.id])?;
            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (
                     SELECT id FROM messages WHERE parent_message_id IN (
                         SELECT id FROM messages WHERE member_id = ?1))",
                [&target.id],
            )?;
            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (
                     SELECT id FROM messages WHERE member_id = ?1)",
                [&target.id],
            )?;

            // Replies to their messages, then the messages themselves.
            tx.execute(
                "DELETE FROM messages WHERE parent_message_id IN (
                     SELECT id FROM messages WHERE member_id = ?1)",
                [&target.id],
            )?;
            tx.execute("DELETE FROM messages WHERE member_id = ?1", [&target.id])?;

            // Conversations they were part of, including the other side's
            // messages in them.
            tx.execute(
                "DELETE FROM reactions WHERE message_id IN (
                     SELECT id FROM messages WHERE conversation_id IN (
                         SELECT id FROM conversations
                         WHERE member_one_id = ?1 OR member_two_id = ?1))",
                [&target.id],
            )?;
            tx.execute(
                "DELETE FROM messages WHERE conversation_id IN (
                     SELECT id FROM conversations
                     WHERE member_one_id = ?1 OR member_two_id = ?1)",
                [&target.id],
            )?;
            tx.execute(
                "DELETE FROM conversations WHERE member_one_id = ?1 OR member_two_id = ?1",
                [&target.id],
            )?;

            tx.execute("DELETE FROM members WHERE id = ?1", [&target.id])?;

            tx.commit()?;
            Ok(target)
        })
    }
}
