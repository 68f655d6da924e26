use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use crate::columns::{ts_at, uuid_at};
use crate::models::{DonationFilter, DonationRow, NewDonation, PersonName};
use crate::{Database, now_ts};

const DONATION_SELECT: &str = "SELECT d.id, d.campaign_id, c.title, d.donor_id, u.email,
        u.username, u.first_name, u.last_name, d.amount_cents, d.is_anonymous,
        d.payment_method, d.transaction_id, d.created_at
     FROM donations d
     JOIN campaigns c ON c.id = d.campaign_id
     JOIN users u ON u.id = d.donor_id";

impl Database {
    // -- Donations --

    /// Records a donation, then re-derives the campaign's raised total from
    /// its donations and bumps its donor count. Returns `None` if the campaign
    /// does not exist.
    pub fn create_donation(&self, donation: &NewDonation<'_>) -> Result<Option<DonationRow>> {
        let id = Uuid::new_v4();
        let did = id.to_string();
        let cid = donation.campaign_id.to_string();
        self.with_tx(|tx| {
            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM campaigns WHERE id = ?1", [&cid], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO donations (id, campaign_id, donor_id, amount_cents, is_anonymous,
                                        payment_method, transaction_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    did,
                    cid,
                    donation.donor_id.to_string(),
                    donation.amount_cents,
                    donation.is_anonymous,
                    donation.payment_method,
                    donation.transaction_id,
                    now_ts(),
                ],
            )?;

            // donor_count counts donation rows ever created; deletions do not
            // decrement it.
            tx.execute(
                "UPDATE campaigns SET donor_count = donor_count + 1 WHERE id = ?1",
                [&cid],
            )?;
            let raised = recompute_raised_amount(tx, &cid)?;

            info!(
                "Donation {} of {} cents to campaign {} by {} (raised now {})",
                did, donation.amount_cents, cid, donation.donor_id, raised
            );
            query_donation(tx, &did)
        })
    }

    pub fn get_donation(&self, id: Uuid) -> Result<Option<DonationRow>> {
        self.with_conn(|conn| query_donation(conn, &id.to_string()))
    }

    pub fn list_donations(&self, filter: &DonationFilter) -> Result<Vec<DonationRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(donor) = filter.donor {
            values.push(Value::Text(donor.to_string()));
            clauses.push(format!("d.donor_id = ?{}", values.len()));
        }
        if let Some(campaign) = filter.campaign {
            values.push(Value::Text(campaign.to_string()));
            clauses.push(format!("d.campaign_id = ?{}", values.len()));
        }
        if let Some(anonymous) = filter.is_anonymous {
            values.push(Value::Integer(anonymous as i64));
            clauses.push(format!("d.is_anonymous = ?{}", values.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "{}{} ORDER BY d.created_at DESC, d.rowid DESC",
            DONATION_SELECT, where_sql
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_donation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes a donation and re-derives its campaign's raised total.
    pub fn delete_donation(&self, id: Uuid) -> Result<bool> {
        let did = id.to_string();
        self.with_tx(|tx| {
            let campaign: Option<String> = tx
                .query_row("SELECT campaign_id FROM donations WHERE id = ?1", [&did], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(cid) = campaign else {
                return Ok(false);
            };

            tx.execute("DELETE FROM donations WHERE id = ?1", [&did])?;
            let raised = recompute_raised_amount(tx, &cid)?;
            info!("Donation {} deleted (campaign {} raised now {})", did, cid, raised);
            Ok(true)
        })
    }
}

/// Sets a campaign's raised total to the exact sum of its donations and
/// returns it. Runs after every donation insert or delete, inside the same
/// transaction.
pub(super) fn recompute_raised_amount(conn: &Connection, campaign_id: &str) -> Result<i64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM donations WHERE campaign_id = ?1",
        [campaign_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE campaigns SET raised_cents = ?2, updated_at = ?3 WHERE id = ?1",
        params![campaign_id, total, now_ts()],
    )?;
    Ok(total)
}

fn query_donation(conn: &Connection, donation_id: &str) -> Result<Option<DonationRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE d.id = ?1", DONATION_SELECT))?;
    stmt.query_row([donation_id], map_donation).optional()
}

fn map_donation(row: &Row<'_>) -> rusqlite::Result<DonationRow> {
    Ok(DonationRow {
        id: uuid_at(row, 0)?,
        campaign_id: uuid_at(row, 1)?,
        campaign_title: row.get(2)?,
        donor_id: uuid_at(row, 3)?,
        donor_email: row.get(4)?,
        donor_name: PersonName {
            username: row.get(5)?,
            first_name: row.get(6)?,
            last_name: row.get(7)?,
        },
        amount_cents: row.get(8)?,
        is_anonymous: row.get(9)?,
        payment_method: row.get(10)?,
        transaction_id: row.get(11)?,
        created_at: ts_at(row, 12)?,
    })
}

#[cfg(test)]
mod tests {
    use sudhaar_types::models::{CampaignCategory, Role};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{DonationFilter, NewCampaign, NewDonation};
    use crate::queries::test_support::{db, user};

    fn campaign(db: &Database, ngo: Uuid) -> Uuid {
        db.create_campaign(
            ngo,
            &NewCampaign {
                title: "School books",
                description: "Books for 200 students",
                category: CampaignCategory::Education,
                image_url: None,
                goal_cents: 1_000_000,
            },
            &[],
        )
        .unwrap()
        .id
    }

    fn donate(db: &Database, campaign_id: Uuid, donor_id: Uuid, amount_cents: i64) -> Uuid {
        db.create_donation(&NewDonation {
            campaign_id,
            donor_id,
            amount_cents,
            is_anonymous: false,
            payment_method: "card",
            transaction_id: None,
        })
        .unwrap()
        .unwrap()
        .id
    }

    #[test]
    fn raised_amount_is_sum_of_donations() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let a = user(&db, "a", Role::Citizen);
        let b = user(&db, "b", Role::Citizen);
        let cid = campaign(&db, ngo);

        donate(&db, cid, a, 50_000);
        donate(&db, cid, b, 12_550);
        donate(&db, cid, a, 1);

        let row = db.get_campaign(cid).unwrap().unwrap();
        assert_eq!(row.raised_cents, 62_551);
        assert_eq!(row.donor_count, 3);
    }

    #[test]
    fn delete_recomputes_raised_but_keeps_donor_count() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let donor = user(&db, "donor", Role::Citizen);
        let cid = campaign(&db, ngo);

        let did = donate(&db, cid, donor, 50_000);
        assert_eq!(db.get_campaign(cid).unwrap().unwrap().raised_cents, 50_000);

        assert!(db.delete_donation(did).unwrap());
        let row = db.get_campaign(cid).unwrap().unwrap();
        assert_eq!(row.raised_cents, 0);
        assert_eq!(row.donor_count, 1);

        assert!(!db.delete_donation(did).unwrap());
    }

    #[test]
    fn donation_to_missing_campaign_is_none() {
        let db = db();
        let donor = user(&db, "donor", Role::Citizen);
        let result = db
            .create_donation(&NewDonation {
                campaign_id: Uuid::new_v4(),
                donor_id: donor,
                amount_cents: 100,
                is_anonymous: true,
                payment_method: "",
                transaction_id: None,
            })
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn deleting_a_donor_recomputes_their_campaigns() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let stays = user(&db, "stays", Role::Citizen);
        let leaves = user(&db, "leaves", Role::Citizen);
        let cid = campaign(&db, ngo);
        donate(&db, cid, stays, 1_000);
        donate(&db, cid, leaves, 9_000);

        assert!(db.delete_user(leaves).unwrap());
        assert_eq!(db.get_campaign(cid).unwrap().unwrap().raised_cents, 1_000);
    }

    #[test]
    fn list_filters_by_donor_and_campaign() {
        let db = db();
        let ngo = user(&db, "ngo", Role::Ngo);
        let a = user(&db, "a", Role::Citizen);
        let b = user(&db, "b", Role::Citizen);
        let first = campaign(&db, ngo);
        let second = campaign(&db, ngo);
        donate(&db, first, a, 100);
        donate(&db, second, a, 200);
        donate(&db, first, b, 300);

        let by_a = db
            .list_donations(&DonationFilter { donor: Some(a), ..Default::default() })
            .unwrap();
        assert_eq!(by_a.len(), 2);
        assert_eq!(by_a[0].amount_cents, 200);

        let to_first = db
            .list_donations(&DonationFilter { campaign: Some(first), ..Default::default() })
            .unwrap();
        assert_eq!(to_first.len(), 2);
        assert_eq!(to_first[0].campaign_title, "School books");
    }
}
