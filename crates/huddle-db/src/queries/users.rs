use rusqlite::{Connection, OptionalExtension};

use crate::models::UserRow;
use crate::{Database, StoreResult, now_rfc3339};

impl Database {
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, now_rfc3339()),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, image, created_at FROM users WHERE username = ?1", username)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, image, created_at FROM users WHERE id = ?1", id)
        })
    }
}

fn query_user(conn: &Connection, sql: &str, key: &str) -> StoreResult<Option<UserRow>> {
    let row = conn
        .query_row(sql, [key], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                image: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
