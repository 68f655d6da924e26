use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use crate::columns::{ts_at, uuid_at};
use crate::models::{CommentRow, PersonName};
use crate::{Database, now_ts};

const COMMENT_SELECT: &str = "SELECT c.id, c.issue_id, c.user_id, u.username, u.first_name,
        u.last_name, c.text, c.created_at, c.updated_at
     FROM comments c
     JOIN users u ON u.id = c.user_id";

impl Database {
    // -- Comments --

    pub fn create_comment(&self, issue_id: Uuid, user_id: Uuid, text: &str) -> Result<CommentRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            let now = now_ts();
            conn.execute(
                "INSERT INTO comments (id, issue_id, user_id, text, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id.to_string(), issue_id.to_string(), user_id.to_string(), text, now],
            )?;
            info!("Comment {} added to issue {} by {}", id, issue_id, user_id);
            query_comment(conn, &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("comment {} vanished after insert", id))
        })
    }

    /// Comments on an issue, newest first.
    pub fn list_comments(&self, issue_id: Uuid) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.issue_id = ?1 ORDER BY c.created_at DESC, c.rowid DESC",
                COMMENT_SELECT
            ))?;
            let rows = stmt
                .query_map([issue_id.to_string()], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Looks a comment up within its issue; a comment on another issue is not found.
    pub fn get_comment(&self, issue_id: Uuid, comment_id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.id = ?1 AND c.issue_id = ?2",
                COMMENT_SELECT
            ))?;
            stmt.query_row(
                params![comment_id.to_string(), issue_id.to_string()],
                map_comment,
            )
            .optional()
        })
    }

    pub fn delete_comment(&self, comment_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id.to_string()])?;
            Ok(deleted > 0)
        })
    }
}

fn query_comment(conn: &Connection, comment_id: &str) -> Result<Option<CommentRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE c.id = ?1", COMMENT_SELECT))?;
    stmt.query_row([comment_id], map_comment).optional()
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        issue_id: uuid_at(row, 1)?,
        user_id: uuid_at(row, 2)?,
        user_name: PersonName {
            username: row.get(3)?,
            first_name: row.get(4)?,
            last_name: row.get(5)?,
        },
        text: row.get(6)?,
        created_at: ts_at(row, 7)?,
        updated_at: ts_at(row, 8)?,
    })
}
