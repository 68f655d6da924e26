use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use crate::columns::{opt_uuid_at, ts_at, uuid_at};
use crate::models::{NewReport, ReportRow};
use crate::{Database, now_ts};

const REPORT_SELECT: &str = "SELECT r.id, r.campaign_id, r.title, r.description,
        r.total_donated_cents, r.utilized_cents, r.balance_cents, r.created_by, u.email,
        r.created_at
     FROM transparency_reports r
     LEFT JOIN users u ON u.id = r.created_by";

impl Database {
    // -- Transparency reports --

    pub fn create_report(&self, author: Uuid, report: &NewReport<'_>) -> Result<ReportRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transparency_reports (id, campaign_id, title, description,
                    total_donated_cents, utilized_cents, balance_cents, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    report.campaign_id.to_string(),
                    report.title,
                    report.description,
                    report.total_donated_cents,
                    report.utilized_cents,
                    report.balance_cents,
                    author.to_string(),
                    now_ts(),
                ],
            )?;
            info!("Transparency report {} for campaign {} by {}", id, report.campaign_id, author);
            query_report(conn, &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("report {} vanished after insert", id))
        })
    }

    pub fn get_report(&self, id: Uuid) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| query_report(conn, &id.to_string()))
    }

    pub fn list_reports(&self, campaign: Option<Uuid>) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let rows = match campaign {
                Some(campaign) => {
                    let mut stmt = conn.prepare(&format!(
                        "{} WHERE r.campaign_id = ?1 ORDER BY r.created_at DESC, r.rowid DESC",
                        REPORT_SELECT
                    ))?;
                    let rows = stmt
                        .query_map([campaign.to_string()], map_report)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "{} ORDER BY r.created_at DESC, r.rowid DESC",
                        REPORT_SELECT
                    ))?;
                    let rows = stmt
                        .query_map([], map_report)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    pub fn delete_report(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted =
                conn.execute("DELETE FROM transparency_reports WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }
}

fn query_report(conn: &Connection, report_id: &str) -> Result<Option<ReportRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE r.id = ?1", REPORT_SELECT))?;
    stmt.query_row([report_id], map_report).optional()
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: uuid_at(row, 0)?,
        campaign_id: opt_uuid_at(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        total_donated_cents: row.get(4)?,
        utilized_cents: row.get(5)?,
        balance_cents: row.get(6)?,
        created_by: opt_uuid_at(row, 7)?,
        created_by_email: row.get(8)?,
        created_at: ts_at(row, 9)?,
    })
}
