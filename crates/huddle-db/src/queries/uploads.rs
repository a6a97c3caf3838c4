use rusqlite::OptionalExtension;

use crate::models::UploadRow;
use crate::{Database, StoreResult, now_rfc3339};

fn map_upload(row: &rusqlite::Row) -> rusqlite::Result<UploadRow> {
    Ok(UploadRow {
        id: row.get(0)?,
        owner_user_id: row.get(1)?,
        token: row.get(2)?,
        size: row.get(3)?,
        expires_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// Reserve an upload slot behind a short-lived token.
    pub fn create_upload(
        &self,
        id: &str,
        owner_user_id: &str,
        token: &str,
        expires_at: &str,
    ) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO uploads (id, owner_user_id, token, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, owner_user_id, token, expires_at, now_rfc3339()),
            )?;
            Ok(())
        })
    }

    /// Redeem an upload token: only unexpired, not-yet-claimed slots match.
    /// Recording the size marks the slot as claimed.
    pub fn claim_upload(&self, token: &str, size: i64) -> StoreResult<Option<UploadRow>> {
        self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, owner_user_id, token, size, expires_at, created_at
                     FROM uploads
                     WHERE token = ?1 AND size IS NULL AND expires_at > ?2",
                    [token, now_rfc3339().as_str()],
                    map_upload,
                )
                .optional()?;

            let Some(mut upload) = row else {
                return Ok(None);
            };

            conn.execute(
                "UPDATE uploads SET size = ?1 WHERE id = ?2",
                (size, &upload.id),
            )?;
            upload.size = Some(size);

            Ok(Some(upload))
        })
    }

    /// A stored file record, if the slot was claimed.
    pub fn get_upload(&self, id: &str) -> StoreResult<Option<UploadRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, owner_user_id, token, size, expires_at, created_at
                     FROM uploads WHERE id = ?1 AND size IS NOT NULL",
                    [id],
                    map_upload,
                )
                .optional()?;

            Ok(row)
        })
    }
}
