use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                email               TEXT NOT NULL UNIQUE,
                username            TEXT NOT NULL UNIQUE,
                password            TEXT NOT NULL,
                first_name          TEXT NOT NULL DEFAULT '',
                last_name           TEXT NOT NULL DEFAULT '',
                phone               TEXT,
                cnic                TEXT,
                role                TEXT NOT NULL DEFAULT 'citizen',
                organization_name   TEXT,
                is_verified         INTEGER NOT NULL DEFAULT 0,
                is_active           INTEGER NOT NULL DEFAULT 1,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE issues (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                location        TEXT NOT NULL,
                category        TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'Open',
                priority        TEXT,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                image_url       TEXT,
                upvotes         INTEGER NOT NULL DEFAULT 0 CHECK (upvotes >= 0),
                latitude        REAL,
                longitude       REAL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                resolved_at     TEXT,
                resolved_by     TEXT REFERENCES users(id) ON DELETE SET NULL,
                CHECK ((status = 'Resolved') = (resolved_at IS NOT NULL))
            );

            CREATE INDEX idx_issues_created ON issues(created_at);
            CREATE INDEX idx_issues_status ON issues(status);

            CREATE TABLE issue_upvotes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                issue_id    TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                UNIQUE(user_id, issue_id)
            );

            CREATE TABLE issue_timeline (
                id          TEXT PRIMARY KEY,
                issue_id    TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                status      TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_by  TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_timeline_issue ON issue_timeline(issue_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                issue_id    TEXT NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_issue ON comments(issue_id, created_at);

            CREATE TABLE campaigns (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                ngo_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                category        TEXT NOT NULL,
                image_url       TEXT,
                goal_cents      INTEGER NOT NULL CHECK (goal_cents >= 0),
                raised_cents    INTEGER NOT NULL DEFAULT 0 CHECK (raised_cents >= 0),
                donor_count     INTEGER NOT NULL DEFAULT 0,
                is_verified     INTEGER NOT NULL DEFAULT 0,
                is_active       INTEGER NOT NULL DEFAULT 1,
                status          TEXT NOT NULL DEFAULT 'active',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                CHECK (status = 'active' OR is_active = 0)
            );

            CREATE TABLE budget_items (
                id              TEXT PRIMARY KEY,
                campaign_id     TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                item_name       TEXT NOT NULL,
                total_cents     INTEGER NOT NULL CHECK (total_cents >= 0),
                funded_cents    INTEGER NOT NULL DEFAULT 0 CHECK (funded_cents >= 0)
            );

            CREATE TABLE donations (
                id              TEXT PRIMARY KEY,
                campaign_id     TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                donor_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                amount_cents    INTEGER NOT NULL CHECK (amount_cents >= 0),
                is_anonymous    INTEGER NOT NULL DEFAULT 0,
                payment_method  TEXT NOT NULL DEFAULT '',
                transaction_id  TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_donations_campaign ON donations(campaign_id);
            CREATE INDEX idx_donations_donor ON donations(donor_id);

            CREATE TABLE transparency_reports (
                id                  TEXT PRIMARY KEY,
                campaign_id         TEXT REFERENCES campaigns(id) ON DELETE SET NULL,
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                total_donated_cents INTEGER NOT NULL DEFAULT 0,
                utilized_cents      INTEGER NOT NULL DEFAULT 0,
                balance_cents       INTEGER NOT NULL DEFAULT 0,
                created_by          TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at          TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
