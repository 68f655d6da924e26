use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tracing::info;
use uuid::Uuid;

use super::OptionalExt;
use super::donations::recompute_raised_amount;
use crate::columns::{choice_at, ts_at, uuid_at};
use crate::models::{NewUser, ProfileChanges, Registration, UserRow};
use crate::{Database, now_ts};

const USER_COLUMNS: &str = "id, email, username, password, first_name, last_name, phone, cnic, \
     role, organization_name, is_verified, is_active, created_at, updated_at";

impl Database {
    // -- Users --

    /// Creates the user unless the email or username is already in use. The
    /// check and the insert share one transaction.
    pub fn register_user(&self, user: &NewUser<'_>) -> Result<Registration> {
        self.with_tx(|tx| {
            let email = query_user(tx, "email", user.email)?.is_some();
            let username = query_user(tx, "username", user.username)?.is_some();
            if email || username {
                return Ok(Registration::Taken { email, username });
            }
            insert_user(tx, user).map(Registration::Created)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at, rowid",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    first_name = COALESCE(?3, first_name),
                    last_name = COALESCE(?4, last_name),
                    phone = COALESCE(?5, phone),
                    cnic = COALESCE(?6, cnic),
                    organization_name = COALESCE(?7, organization_name),
                    updated_at = ?8
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.username,
                    changes.first_name,
                    changes.last_name,
                    changes.phone,
                    changes.cnic,
                    changes.organization_name,
                    now_ts(),
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())
        })
    }

    /// Deletes a user together with everything they own. Issues lose the
    /// user's upvotes and campaigns that lose donations through the cascade get
    /// their raised total recomputed.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let uid = id.to_string();
        self.with_tx(|tx| {
            let affected: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT d.campaign_id FROM donations d
                     JOIN campaigns c ON c.id = d.campaign_id
                     WHERE d.donor_id = ?1 AND c.ngo_id != ?1",
                )?;
                let ids = stmt
                    .query_map([&uid], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };

            tx.execute(
                "UPDATE issues SET upvotes = MAX(upvotes - 1, 0)
                 WHERE id IN (SELECT issue_id FROM issue_upvotes WHERE user_id = ?1)",
                [&uid],
            )?;

            let deleted = tx.execute("DELETE FROM users WHERE id = ?1", [&uid])?;
            if deleted == 0 {
                return Ok(false);
            }

            for campaign_id in &affected {
                recompute_raised_amount(tx, campaign_id)?;
            }

            info!("User {} deleted ({} campaign totals recomputed)", uid, affected.len());
            Ok(true)
        })
    }
}

fn insert_user(conn: &Connection, user: &NewUser<'_>) -> Result<UserRow> {
    let id = Uuid::new_v4();
    let now = now_ts();
    conn.execute(
        "INSERT INTO users (id, email, username, password, first_name, last_name, phone, cnic,
                            role, organization_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id.to_string(),
            user.email,
            user.username,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.phone,
            user.cnic,
            user.role.as_str(),
            user.organization_name,
            now,
        ],
    )?;
    query_user(conn, "id", &id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE {} = ?1",
        USER_COLUMNS, column
    ))?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone: row.get(6)?,
        cnic: row.get(7)?,
        role: choice_at(row, 8)?,
        organization_name: row.get(9)?,
        is_verified: row.get(10)?,
        is_active: row.get(11)?,
        created_at: ts_at(row, 12)?,
        updated_at: ts_at(row, 13)?,
    })
}

#[cfg(test)]
mod tests {
    use sudhaar_types::models::Role;

    use crate::models::{NewUser, ProfileChanges, Registration};
    use crate::queries::test_support::{db, user};

    fn new_user<'a>(email: &'a str, username: &'a str) -> NewUser<'a> {
        NewUser {
            email,
            username,
            password_hash: "x",
            first_name: "",
            last_name: "",
            phone: None,
            cnic: None,
            role: Role::Citizen,
            organization_name: None,
        }
    }

    #[test]
    fn lookup_by_email_username_and_id() {
        let db = db();
        let id = user(&db, "amna", Role::Ngo);

        let by_email = db.get_user_by_email("amna@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.role, Role::Ngo);
        assert!(by_email.is_active);
        assert!(!by_email.is_verified);

        assert!(db.get_user_by_username("amna").unwrap().is_some());
        assert!(db.get_user_by_id(id).unwrap().is_some());
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn registration_reports_taken_fields_instead_of_failing() {
        let db = db();
        let first = db.register_user(&new_user("zara@example.com", "zara")).unwrap();
        assert!(matches!(first, Registration::Created(ref row) if row.username == "zara"));

        let same_email = db.register_user(&new_user("zara@example.com", "zara2")).unwrap();
        assert!(matches!(
            same_email,
            Registration::Taken { email: true, username: false }
        ));

        let both = db.register_user(&new_user("zara@example.com", "zara")).unwrap();
        assert!(matches!(both, Registration::Taken { email: true, username: true }));
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn profile_update_keeps_unset_fields() {
        let db = db();
        let id = user(&db, "sana", Role::Citizen);
        let updated = db
            .update_user_profile(
                id,
                &ProfileChanges {
                    first_name: Some("Sana".into()),
                    phone: Some("03211234567".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.first_name, "Sana");
        assert_eq!(updated.phone.as_deref(), Some("03211234567"));
        assert_eq!(updated.username, "sana");
    }
}
