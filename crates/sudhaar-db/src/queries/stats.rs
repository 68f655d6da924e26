use anyhow::Result;

use crate::Database;
use crate::models::{FundsTotals, IssueCounts, PlatformTotals};

impl Database {
    // -- Aggregates --

    pub fn issue_counts(&self) -> Result<IssueCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'Resolved'), 0),
                        COALESCE(SUM(status = 'In Progress'), 0),
                        COALESCE(SUM(status NOT IN ('Resolved', 'Rejected')), 0)
                 FROM issues",
                [],
                |row| {
                    Ok(IssueCounts {
                        total: row.get(0)?,
                        resolved: row.get(1)?,
                        in_progress: row.get(2)?,
                        active: row.get(3)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }

    pub fn platform_totals(&self) -> Result<PlatformTotals> {
        self.with_conn(|conn| {
            let totals = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM campaigns WHERE is_active = 1 AND is_verified = 1),
                    (SELECT COALESCE(SUM(amount_cents), 0) FROM donations),
                    (SELECT COUNT(*) FROM users)",
                [],
                |row| {
                    Ok(PlatformTotals {
                        active_verified_campaigns: row.get(0)?,
                        donated_cents: row.get(1)?,
                        users: row.get(2)?,
                    })
                },
            )?;
            Ok(totals)
        })
    }

    /// Raised totals of verified campaigns; the completed ones count as utilized.
    pub fn funds_totals(&self) -> Result<FundsTotals> {
        self.with_conn(|conn| {
            let totals = conn.query_row(
                "SELECT COALESCE(SUM(raised_cents), 0),
                        COALESCE(SUM(CASE WHEN status = 'completed' THEN raised_cents ELSE 0 END), 0)
                 FROM campaigns
                 WHERE is_verified = 1",
                [],
                |row| {
                    Ok(FundsTotals {
                        raised_cents: row.get(0)?,
                        utilized_cents: row.get(1)?,
                    })
                },
            )?;
            Ok(totals)
        })
    }
}
