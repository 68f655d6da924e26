use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use sudhaar_types::models::CampaignStatus;

use super::{OptionalExt, like_pattern, placeholders};
use crate::columns::{choice_at, ts_at, uuid_at};
use crate::models::{
    BudgetItemRow, CampaignChanges, CampaignFilter, CampaignRow, CampaignScope, NewBudgetItem,
    NewCampaign,
};
use crate::{Database, now_ts};

const CAMPAIGN_SELECT: &str = "SELECT c.id, c.title, c.description, c.ngo_id, u.email,
        u.organization_name, c.category, c.image_url, c.goal_cents, c.raised_cents,
        c.donor_count, c.is_verified, c.is_active, c.status, c.created_at, c.updated_at
     FROM campaigns c
     JOIN users u ON u.id = c.ngo_id";

impl Database {
    // -- Campaigns --

    /// Creates a campaign and its budget breakdown in one transaction.
    pub fn create_campaign(
        &self,
        ngo: Uuid,
        campaign: &NewCampaign<'_>,
        budget_items: &[NewBudgetItem],
    ) -> Result<CampaignRow> {
        let id = Uuid::new_v4();
        let cid = id.to_string();
        self.with_tx(|tx| {
            let now = now_ts();
            tx.execute(
                "INSERT INTO campaigns (id, title, description, ngo_id, category, image_url,
                                        goal_cents, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    cid,
                    campaign.title,
                    campaign.description,
                    ngo.to_string(),
                    campaign.category.as_str(),
                    campaign.image_url,
                    campaign.goal_cents,
                    now,
                ],
            )?;

            for item in budget_items {
                tx.execute(
                    "INSERT INTO budget_items (id, campaign_id, item_name, total_cents, funded_cents)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        Uuid::new_v4().to_string(),
                        cid,
                        item.item_name,
                        item.total_cents,
                        item.funded_cents,
                    ],
                )?;
            }

            info!(
                "Campaign {} created by {} with {} budget items",
                cid,
                ngo,
                budget_items.len()
            );
            query_campaign(tx, &cid)?
                .ok_or_else(|| anyhow::anyhow!("campaign {} vanished after insert", cid))
        })
    }

    pub fn get_campaign(&self, id: Uuid) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| query_campaign(conn, &id.to_string()))
    }

    pub fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<CampaignRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match filter.scope {
            CampaignScope::OwnedBy(ngo) => {
                values.push(Value::Text(ngo.to_string()));
                clauses.push(format!("c.ngo_id = ?{}", values.len()));
            }
            CampaignScope::Verified => clauses.push("c.is_verified = 1".into()),
        }
        if let Some(category) = filter.category {
            values.push(Value::Text(category.as_str().into()));
            clauses.push(format!("c.category = ?{}", values.len()));
        }
        if let Some(verified) = filter.is_verified {
            values.push(Value::Integer(verified as i64));
            clauses.push(format!("c.is_verified = ?{}", values.len()));
        }
        if let Some(active) = filter.is_active {
            values.push(Value::Integer(active as i64));
            clauses.push(format!("c.is_active = ?{}", values.len()));
        }
        if let Some(term) = filter.search.as_deref().filter(|t| !t.is_empty()) {
            values.push(Value::Text(like_pattern(term)));
            let n = values.len();
            clauses.push(format!(
                "(c.title LIKE ?{n} ESCAPE '\\' OR c.description LIKE ?{n} ESCAPE '\\' \
                 OR u.organization_name LIKE ?{n} ESCAPE '\\')"
            ));
        }

        let sql = format!(
            "{} WHERE {} ORDER BY c.created_at DESC, c.rowid DESC",
            CAMPAIGN_SELECT,
            clauses.join(" AND ")
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_campaign)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch budget items for a set of campaigns, in creation order.
    pub fn get_budget_items_for_campaigns(&self, campaign_ids: &[Uuid]) -> Result<Vec<BudgetItemRow>> {
        if campaign_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, campaign_id, item_name, total_cents, funded_cents
                 FROM budget_items WHERE campaign_id IN ({}) ORDER BY rowid",
                placeholders(0, campaign_ids.len())
            );
            let ids: Vec<String> = campaign_ids.iter().map(Uuid::to_string).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), |row| {
                    Ok(BudgetItemRow {
                        id: uuid_at(row, 0)?,
                        campaign_id: uuid_at(row, 1)?,
                        item_name: row.get(2)?,
                        total_cents: row.get(3)?,
                        funded_cents: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Edits descriptive fields. Raised amount and donor count are never
    /// written here.
    pub fn update_campaign(&self, id: Uuid, changes: &CampaignChanges) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE campaigns SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    category = COALESCE(?4, category),
                    image_url = COALESCE(?5, image_url),
                    goal_cents = COALESCE(?6, goal_cents),
                    is_active = COALESCE(?7, is_active),
                    updated_at = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.title,
                    changes.description,
                    changes.category.map(|c| c.as_str()),
                    changes.image_url,
                    changes.goal_cents,
                    changes.is_active,
                    now_ts(),
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_campaign(conn, &id.to_string())
        })
    }

    pub fn set_campaign_verified(&self, id: Uuid, verified: bool) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE campaigns SET is_verified = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), verified, now_ts()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            info!("Campaign {} verified={}", id, verified);
            query_campaign(conn, &id.to_string())
        })
    }

    /// Marks a campaign completed and stops it accepting donations. Its raised
    /// total then counts as utilized funds.
    pub fn complete_campaign(&self, id: Uuid) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE campaigns SET status = ?2, is_active = 0, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), CampaignStatus::Completed.as_str(), now_ts()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            info!("Campaign {} completed", id);
            query_campaign(conn, &id.to_string())
        })
    }

    pub fn delete_campaign(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM campaigns WHERE id = ?1", [id.to_string()])?;
            if deleted > 0 {
                info!("Campaign {} deleted", id);
            }
            Ok(deleted > 0)
        })
    }
}

pub(super) fn query_campaign(conn: &Connection, campaign_id: &str) -> Result<Option<CampaignRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE c.id = ?1", CAMPAIGN_SELECT))?;
    stmt.query_row([campaign_id], map_campaign).optional()
}

fn map_campaign(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        ngo_id: uuid_at(row, 3)?,
        ngo_email: row.get(4)?,
        ngo_organization: row.get(5)?,
        category: choice_at(row, 6)?,
        image_url: row.get(7)?,
        goal_cents: row.get(8)?,
        raised_cents: row.get(9)?,
        donor_count: row.get(10)?,
        is_verified: row.get(11)?,
        is_active: row.get(12)?,
        status: choice_at(row, 13)?,
        created_at: ts_at(row, 14)?,
        updated_at: ts_at(row, 15)?,
    })
}

#[cfg(test)]
mod tests {
    use sudhaar_types::models::{CampaignCategory, CampaignStatus, Role};

    use crate::models::{CampaignChanges, CampaignFilter, CampaignScope, NewBudgetItem, NewCampaign};
    use crate::queries::test_support::{db, user};

    fn new_campaign(title: &str) -> NewCampaign<'_> {
        NewCampaign {
            title,
            description: "Clean water for Block C",
            category: CampaignCategory::Water,
            image_url: None,
            goal_cents: 100_000,
        }
    }

    #[test]
    fn creates_campaign_with_budget_items() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let items = vec![
            NewBudgetItem { item_name: "Pipes".into(), total_cents: 60_000, funded_cents: 0 },
            NewBudgetItem { item_name: "Labour".into(), total_cents: 40_000, funded_cents: 0 },
        ];
        let row = db.create_campaign(ngo, &new_campaign("Water"), &items).unwrap();
        assert_eq!(row.raised_cents, 0);
        assert_eq!(row.donor_count, 0);
        assert!(!row.is_verified);
        assert!(row.is_active);
        assert_eq!(row.status, CampaignStatus::Active);

        let budget = db.get_budget_items_for_campaigns(&[row.id]).unwrap();
        assert_eq!(budget.len(), 2);
        assert_eq!(budget[0].item_name, "Pipes");
    }

    #[test]
    fn scope_limits_visibility() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let other = user(&db, "other", Role::Ngo);
        let mine = db.create_campaign(ngo, &new_campaign("Mine"), &[]).unwrap();
        let theirs = db.create_campaign(other, &new_campaign("Theirs"), &[]).unwrap();
        db.set_campaign_verified(theirs.id, true).unwrap();

        let owned = db.list_campaigns(&CampaignFilter::new(CampaignScope::OwnedBy(ngo))).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id, mine.id);

        let public = db.list_campaigns(&CampaignFilter::new(CampaignScope::Verified)).unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, theirs.id);
    }

    #[test]
    fn update_does_not_touch_ledger_fields() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let row = db.create_campaign(ngo, &new_campaign("Water"), &[]).unwrap();
        let updated = db
            .update_campaign(
                row.id,
                &CampaignChanges { goal_cents: Some(250_000), ..Default::default() },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.goal_cents, 250_000);
        assert_eq!(updated.title, "Water");
        assert_eq!(updated.raised_cents, 0);
    }

    #[test]
    fn completing_deactivates() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let row = db.create_campaign(ngo, &new_campaign("Water"), &[]).unwrap();
        let done = db.complete_campaign(row.id).unwrap().unwrap();
        assert_eq!(done.status, CampaignStatus::Completed);
        assert!(!done.is_active);
    }

    #[test]
    fn completed_campaign_cannot_be_reactivated() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let row = db.create_campaign(ngo, &new_campaign("Wells"), &[]).unwrap();
        db.complete_campaign(row.id).unwrap().unwrap();

        let reactivate = CampaignChanges {
            is_active: Some(true),
            ..Default::default()
        };
        assert!(db.update_campaign(row.id, &reactivate).is_err());

        let retitle = CampaignChanges {
            title: Some("Wells, phase one".into()),
            is_active: Some(false),
            ..Default::default()
        };
        let kept = db.update_campaign(row.id, &retitle).unwrap().unwrap();
        assert_eq!(kept.status, CampaignStatus::Completed);
        assert!(!kept.is_active);
        assert_eq!(kept.title, "Wells, phase one");
    }
}
