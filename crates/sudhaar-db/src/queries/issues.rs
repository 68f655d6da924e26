use std::collections::HashSet;

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use sudhaar_types::models::IssueStatus;

use super::{OptionalExt, like_pattern, placeholders};
use crate::columns::{choice_at, opt_choice_at, opt_ts_at, opt_uuid_at, ts_at, uuid_at};
use crate::models::{
    IssueChanges, IssueFilter, IssueOrdering, IssueRow, NewIssue, PersonName, TimelineRow,
    UpvoteOutcome,
};
use crate::{Database, now_ts};

// JOIN users to fetch the author's display fields in a single query
const ISSUE_SELECT: &str = "SELECT i.id, i.title, i.description, i.location, i.category, i.status,
        i.priority, i.author_id, u.email, u.username, u.first_name, u.last_name, i.image_url,
        i.upvotes, i.latitude, i.longitude, i.created_at, i.updated_at, i.resolved_at,
        i.resolved_by
     FROM issues i
     JOIN users u ON u.id = i.author_id";

impl Database {
    // -- Issues --

    pub fn create_issue(&self, author: Uuid, issue: &NewIssue<'_>) -> Result<IssueRow> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            let now = now_ts();
            conn.execute(
                "INSERT INTO issues (id, title, description, location, category, priority, author_id,
                                     image_url, latitude, longitude, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    id.to_string(),
                    issue.title,
                    issue.description,
                    issue.location,
                    issue.category.as_str(),
                    issue.priority.map(|p| p.as_str()),
                    author.to_string(),
                    issue.image_url,
                    issue.latitude,
                    issue.longitude,
                    now,
                ],
            )?;
            info!("Issue {} reported by {}", id, author);
            query_issue(conn, &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("issue {} vanished after insert", id))
        })
    }

    pub fn get_issue(&self, id: Uuid) -> Result<Option<IssueRow>> {
        self.with_conn(|conn| query_issue(conn, &id.to_string()))
    }

    pub fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.statuses.is_empty() {
            clauses.push(format!(
                "i.status IN ({})",
                placeholders(values.len(), filter.statuses.len())
            ));
            values.extend(filter.statuses.iter().map(|s| Value::Text(s.as_str().into())));
        }
        if filter.exclude_resolved {
            clauses.push("i.status != 'Resolved'".into());
        }
        if filter.resolved_only {
            clauses.push("i.status = 'Resolved'".into());
        }
        if let Some(author) = filter.author {
            values.push(Value::Text(author.to_string()));
            clauses.push(format!("i.author_id = ?{}", values.len()));
        }
        if let Some(category) = filter.category {
            values.push(Value::Text(category.as_str().into()));
            clauses.push(format!("i.category = ?{}", values.len()));
        }
        if let Some(priority) = filter.priority {
            values.push(Value::Text(priority.as_str().into()));
            clauses.push(format!("i.priority = ?{}", values.len()));
        }
        if let Some(term) = filter.search.as_deref().filter(|t| !t.is_empty()) {
            values.push(Value::Text(like_pattern(term)));
            let n = values.len();
            clauses.push(format!(
                "(i.title LIKE ?{n} ESCAPE '\\' OR i.description LIKE ?{n} ESCAPE '\\' \
                 OR i.location LIKE ?{n} ESCAPE '\\')"
            ));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let order_sql = match filter.ordering {
            IssueOrdering::NewestFirst => "i.created_at DESC, i.rowid DESC",
            IssueOrdering::OldestFirst => "i.created_at ASC, i.rowid ASC",
            IssueOrdering::MostUpvoted => "i.upvotes DESC, i.created_at DESC",
            IssueOrdering::LeastUpvoted => "i.upvotes ASC, i.created_at DESC",
        };
        let sql = format!("{}{} ORDER BY {}", ISSUE_SELECT, where_sql, order_sql);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), map_issue)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies field edits. A status change is recorded through the single
    /// status transition, so it appends exactly one timeline entry.
    pub fn update_issue(
        &self,
        id: Uuid,
        changes: &IssueChanges,
        actor: Uuid,
    ) -> Result<Option<IssueRow>> {
        let iid = id.to_string();
        self.with_tx(|tx| {
            let Some(old_status) = query_status(tx, &iid)? else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE issues SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    location = COALESCE(?4, location),
                    category = COALESCE(?5, category),
                    priority = COALESCE(?6, priority),
                    image_url = COALESCE(?7, image_url),
                    latitude = COALESCE(?8, latitude),
                    longitude = COALESCE(?9, longitude),
                    updated_at = ?10
                 WHERE id = ?1",
                params![
                    iid,
                    changes.title,
                    changes.description,
                    changes.location,
                    changes.category.map(|c| c.as_str()),
                    changes.priority.map(|p| p.as_str()),
                    changes.image_url,
                    changes.latitude,
                    changes.longitude,
                    now_ts(),
                ],
            )?;

            if let Some(new_status) = changes.status.filter(|s| *s != old_status) {
                transition_status(tx, &iid, old_status, new_status, None, actor)?;
            }

            query_issue(tx, &iid)
        })
    }

    /// The explicit status action: always appends one timeline entry, even
    /// when the status is unchanged.
    pub fn update_issue_status(
        &self,
        id: Uuid,
        new_status: IssueStatus,
        note: Option<&str>,
        actor: Uuid,
    ) -> Result<Option<IssueRow>> {
        let iid = id.to_string();
        self.with_tx(|tx| {
            let Some(old_status) = query_status(tx, &iid)? else {
                return Ok(None);
            };
            transition_status(tx, &iid, old_status, new_status, note, actor)?;
            query_issue(tx, &iid)
        })
    }

    pub fn delete_issue(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM issues WHERE id = ?1", [id.to_string()])?;
            if deleted > 0 {
                info!("Issue {} deleted", id);
            }
            Ok(deleted > 0)
        })
    }

    // -- Timeline --

    /// Batch-fetch timeline entries for a set of issues, newest first.
    pub fn get_timelines_for_issues(&self, issue_ids: &[Uuid]) -> Result<Vec<TimelineRow>> {
        if issue_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT t.id, t.issue_id, t.status, t.description, t.created_by, u.email, t.created_at
                 FROM issue_timeline t
                 LEFT JOIN users u ON u.id = t.created_by
                 WHERE t.issue_id IN ({})
                 ORDER BY t.created_at DESC, t.rowid DESC",
                placeholders(0, issue_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids: Vec<String> = issue_ids.iter().map(Uuid::to_string).collect();
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), |row| {
                    Ok(TimelineRow {
                        id: uuid_at(row, 0)?,
                        issue_id: uuid_at(row, 1)?,
                        status: choice_at(row, 2)?,
                        description: row.get(3)?,
                        created_by: opt_uuid_at(row, 4)?,
                        created_by_email: row.get(5)?,
                        created_at: ts_at(row, 6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Upvotes --

    /// Idempotent upvote. Returns `None` if the issue does not exist.
    pub fn upvote_issue(&self, issue_id: Uuid, user_id: Uuid) -> Result<Option<UpvoteOutcome>> {
        let iid = issue_id.to_string();
        self.with_tx(|tx| {
            if query_status(tx, &iid)?.is_none() {
                return Ok(None);
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO issue_upvotes (id, user_id, issue_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), user_id.to_string(), iid, now_ts()],
            )?;
            if inserted > 0 {
                tx.execute("UPDATE issues SET upvotes = upvotes + 1 WHERE id = ?1", [&iid])?;
            }
            Ok(Some(UpvoteOutcome {
                changed: inserted > 0,
                upvotes: query_upvotes(tx, &iid)?,
            }))
        })
    }

    /// Removes the caller's upvote if present; the counter never drops below zero.
    pub fn remove_upvote(&self, issue_id: Uuid, user_id: Uuid) -> Result<Option<UpvoteOutcome>> {
        let iid = issue_id.to_string();
        self.with_tx(|tx| {
            if query_status(tx, &iid)?.is_none() {
                return Ok(None);
            }
            let deleted = tx.execute(
                "DELETE FROM issue_upvotes WHERE user_id = ?1 AND issue_id = ?2",
                params![user_id.to_string(), iid],
            )?;
            if deleted > 0 {
                tx.execute(
                    "UPDATE issues SET upvotes = MAX(upvotes - 1, 0) WHERE id = ?1",
                    [&iid],
                )?;
            }
            Ok(Some(UpvoteOutcome {
                changed: deleted > 0,
                upvotes: query_upvotes(tx, &iid)?,
            }))
        })
    }

    /// Which of `issue_ids` the user has upvoted.
    pub fn upvoted_issue_ids(&self, user_id: Uuid, issue_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if issue_ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT issue_id FROM issue_upvotes WHERE user_id = ?1 AND issue_id IN ({})",
                placeholders(1, issue_ids.len())
            );
            let mut values = vec![user_id.to_string()];
            values.extend(issue_ids.iter().map(Uuid::to_string));
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(values.iter()), |row| uuid_at(row, 0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn upvoters(&self, issue_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM issue_upvotes WHERE issue_id = ?1 ORDER BY created_at, rowid",
            )?;
            let users = stmt
                .query_map([issue_id.to_string()], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

/// The one place an issue's status changes. Stamps or clears the resolution
/// fields so that `resolved_at` is set exactly when the status is Resolved,
/// then appends a single timeline entry.
fn transition_status(
    conn: &Connection,
    issue_id: &str,
    old: IssueStatus,
    new: IssueStatus,
    note: Option<&str>,
    actor: Uuid,
) -> Result<()> {
    let now = now_ts();
    let actor = actor.to_string();

    if new == IssueStatus::Resolved {
        // Re-resolving keeps the original stamp.
        conn.execute(
            "UPDATE issues SET status = ?2,
                resolved_at = COALESCE(resolved_at, ?3),
                resolved_by = COALESCE(resolved_by, ?4),
                updated_at = ?3
             WHERE id = ?1",
            params![issue_id, new.as_str(), now, actor],
        )?;
    } else {
        conn.execute(
            "UPDATE issues SET status = ?2, resolved_at = NULL, resolved_by = NULL, updated_at = ?3
             WHERE id = ?1",
            params![issue_id, new.as_str(), now],
        )?;
    }

    let description = timeline_description(old, new, note);
    conn.execute(
        "INSERT INTO issue_timeline (id, issue_id, status, description, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![Uuid::new_v4().to_string(), issue_id, new.as_str(), description, actor, now],
    )?;

    info!("Issue {} status {} -> {} by {}", issue_id, old, new, actor);
    Ok(())
}

fn timeline_description(old: IssueStatus, new: IssueStatus, note: Option<&str>) -> String {
    let base = format!("Status updated from {} to {}.", old, new);
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!("{} {}", base, note),
        None => base,
    }
}

fn query_status(conn: &Connection, issue_id: &str) -> Result<Option<IssueStatus>> {
    conn.query_row("SELECT status FROM issues WHERE id = ?1", [issue_id], |row| {
        choice_at(row, 0)
    })
    .optional()
}

fn query_upvotes(conn: &Connection, issue_id: &str) -> Result<i64> {
    Ok(conn.query_row("SELECT upvotes FROM issues WHERE id = ?1", [issue_id], |row| {
        row.get(0)
    })?)
}

fn query_issue(conn: &Connection, issue_id: &str) -> Result<Option<IssueRow>> {
    let mut stmt = conn.prepare(&format!("{} WHERE i.id = ?1", ISSUE_SELECT))?;
    stmt.query_row([issue_id], map_issue).optional()
}

fn map_issue(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        category: choice_at(row, 4)?,
        status: choice_at(row, 5)?,
        priority: opt_choice_at(row, 6)?,
        author_id: uuid_at(row, 7)?,
        author_email: row.get(8)?,
        author_name: PersonName {
            username: row.get(9)?,
            first_name: row.get(10)?,
            last_name: row.get(11)?,
        },
        image_url: row.get(12)?,
        upvotes: row.get(13)?,
        latitude: row.get(14)?,
        longitude: row.get(15)?,
        created_at: ts_at(row, 16)?,
        updated_at: ts_at(row, 17)?,
        resolved_at: opt_ts_at(row, 18)?,
        resolved_by: opt_uuid_at(row, 19)?,
    })
}

#[cfg(test)]
mod tests {
    use sudhaar_types::models::{IssueCategory, IssueStatus, Role};
    use uuid::Uuid;

    use crate::Database;
    use crate::models::{IssueChanges, IssueFilter, IssueOrdering, NewIssue};
    use crate::queries::test_support::{db, user};

    fn issue(db: &Database, author: Uuid, title: &str) -> Uuid {
        db.create_issue(
            author,
            &NewIssue {
                title,
                description: "Deep pothole near the market",
                location: "Main Bazaar",
                category: IssueCategory::Roads,
                priority: None,
                image_url: None,
                latitude: Some(31.5204),
                longitude: Some(74.3587),
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn new_issue_is_open_and_unresolved() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let id = issue(&db, author, "Pothole");
        let row = db.get_issue(id).unwrap().unwrap();
        assert_eq!(row.status, IssueStatus::Open);
        assert_eq!(row.upvotes, 0);
        assert!(row.resolved_at.is_none());
        assert_eq!(row.author_email, "citizen@example.com");
        assert!(db.get_timelines_for_issues(&[id]).unwrap().is_empty());
    }

    #[test]
    fn status_change_appends_exactly_one_timeline_entry() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let official = user(&db, "official", Role::Official);
        let id = issue(&db, author, "Pothole");

        let row = db
            .update_issue_status(id, IssueStatus::InProgress, None, official)
            .unwrap()
            .unwrap();
        assert_eq!(row.status, IssueStatus::InProgress);
        assert!(row.resolved_at.is_none());

        let timeline = db.get_timelines_for_issues(&[id]).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].status, IssueStatus::InProgress);
        assert!(timeline[0].description.contains("Open"));
        assert!(timeline[0].description.contains("In Progress"));
        assert_eq!(timeline[0].created_by, Some(official));
        assert_eq!(timeline[0].created_by_email.as_deref(), Some("official@example.com"));
    }

    #[test]
    fn resolved_at_tracks_resolved_status() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let official = user(&db, "official", Role::Official);
        let id = issue(&db, author, "Broken streetlight");

        let resolved = db
            .update_issue_status(id, IssueStatus::Resolved, Some("Replaced bulb"), official)
            .unwrap()
            .unwrap();
        assert!(resolved.resolved_at.is_some());
        assert_eq!(resolved.resolved_by, Some(official));

        let reopened = db
            .update_issue(
                id,
                &IssueChanges {
                    status: Some(IssueStatus::Open),
                    ..Default::default()
                },
                author,
            )
            .unwrap()
            .unwrap();
        assert_eq!(reopened.status, IssueStatus::Open);
        assert!(reopened.resolved_at.is_none());
        assert!(reopened.resolved_by.is_none());

        let timeline = db.get_timelines_for_issues(&[id]).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].status, IssueStatus::Open);
        assert!(timeline[1].description.ends_with("Replaced bulb"));
    }

    #[test]
    fn re_resolving_keeps_first_stamp() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let first = user(&db, "first", Role::Official);
        let second = user(&db, "second", Role::Official);
        let id = issue(&db, author, "Leak");

        let a = db.update_issue_status(id, IssueStatus::Resolved, None, first).unwrap().unwrap();
        let b = db.update_issue_status(id, IssueStatus::Resolved, None, second).unwrap().unwrap();
        assert_eq!(a.resolved_at, b.resolved_at);
        assert_eq!(b.resolved_by, Some(first));
    }

    #[test]
    fn field_update_without_status_change_records_nothing() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let id = issue(&db, author, "Garbage");

        let row = db
            .update_issue(
                id,
                &IssueChanges {
                    title: Some("Garbage pile".into()),
                    status: Some(IssueStatus::Open),
                    ..Default::default()
                },
                author,
            )
            .unwrap()
            .unwrap();
        assert_eq!(row.title, "Garbage pile");
        assert!(db.get_timelines_for_issues(&[id]).unwrap().is_empty());
    }

    #[test]
    fn missing_issue_is_reported_as_none() {
        let db = db();
        let actor = user(&db, "official", Role::Official);
        let missing = Uuid::new_v4();
        assert!(db.update_issue_status(missing, IssueStatus::Open, None, actor).unwrap().is_none());
        assert!(db.upvote_issue(missing, actor).unwrap().is_none());
        assert!(!db.delete_issue(missing).unwrap());
    }

    #[test]
    fn upvote_is_idempotent_per_user() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let voter = user(&db, "voter", Role::Citizen);
        let id = issue(&db, author, "Pothole");

        let first = db.upvote_issue(id, voter).unwrap().unwrap();
        assert!(first.changed);
        assert_eq!(first.upvotes, 1);

        let second = db.upvote_issue(id, voter).unwrap().unwrap();
        assert!(!second.changed);
        assert_eq!(second.upvotes, 1);
        assert_eq!(db.upvoters(id).unwrap(), vec![voter]);
    }

    #[test]
    fn removing_one_upvote_leaves_the_other() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let a = user(&db, "a", Role::Citizen);
        let b = user(&db, "b", Role::Citizen);
        let id = issue(&db, author, "Pothole");

        db.upvote_issue(id, a).unwrap();
        assert_eq!(db.upvote_issue(id, b).unwrap().unwrap().upvotes, 2);

        let removed = db.remove_upvote(id, a).unwrap().unwrap();
        assert!(removed.changed);
        assert_eq!(removed.upvotes, 1);

        assert_eq!(db.upvoters(id).unwrap(), vec![b]);

        let nothing = db.remove_upvote(id, a).unwrap().unwrap();
        assert!(!nothing.changed);
        assert_eq!(nothing.upvotes, 1);

        let voted = db.upvoted_issue_ids(b, &[id]).unwrap();
        assert!(voted.contains(&id));
        assert!(db.upvoted_issue_ids(a, &[id]).unwrap().is_empty());
    }

    #[test]
    fn list_filters_by_status_and_author() {
        let db = db();
        let alice = user(&db, "alice", Role::Citizen);
        let bob = user(&db, "bob", Role::Citizen);
        let official = user(&db, "official", Role::Official);
        let open = issue(&db, alice, "Open issue");
        let resolved = issue(&db, bob, "Fixed issue");
        let pending = issue(&db, bob, "Pending water main");
        db.update_issue_status(resolved, IssueStatus::Resolved, None, official).unwrap();
        db.update_issue_status(pending, IssueStatus::Pending, None, official).unwrap();

        let all = db.list_issues(&IssueFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, pending);

        let unresolved = db
            .list_issues(&IssueFilter { exclude_resolved: true, ..Default::default() })
            .unwrap();
        assert_eq!(unresolved.len(), 2);

        let resolved_only = db
            .list_issues(&IssueFilter { resolved_only: true, ..Default::default() })
            .unwrap();
        assert_eq!(resolved_only.len(), 1);
        assert_eq!(resolved_only[0].id, resolved);

        let several = db
            .list_issues(&IssueFilter {
                statuses: vec![IssueStatus::Open, IssueStatus::Pending],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(several.len(), 2);

        let mine = db
            .list_issues(&IssueFilter { author: Some(alice), ..Default::default() })
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, open);

        let searched = db
            .list_issues(&IssueFilter { search: Some("water".into()), ..Default::default() })
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id, pending);
    }

    #[test]
    fn list_orders_by_upvotes() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let voter = user(&db, "voter", Role::Citizen);
        let quiet = issue(&db, author, "Quiet");
        let popular = issue(&db, author, "Popular");
        db.upvote_issue(popular, voter).unwrap();

        let most = db
            .list_issues(&IssueFilter { ordering: IssueOrdering::MostUpvoted, ..Default::default() })
            .unwrap();
        assert_eq!(most[0].id, popular);
        let least = db
            .list_issues(&IssueFilter { ordering: IssueOrdering::LeastUpvoted, ..Default::default() })
            .unwrap();
        assert_eq!(least[0].id, quiet);
    }

    #[test]
    fn deleting_issue_cascades_to_timeline_and_upvotes() {
        let db = db();
        let author = user(&db, "citizen", Role::Citizen);
        let id = issue(&db, author, "Pothole");
        db.upvote_issue(id, author).unwrap();
        db.update_issue_status(id, IssueStatus::Verified, None, author).unwrap();

        assert!(db.delete_issue(id).unwrap());
        assert!(db.get_issue(id).unwrap().is_none());
        assert!(db.get_timelines_for_issues(&[id]).unwrap().is_empty());
        assert!(db.upvoters(id).unwrap().is_empty());
    }
}
