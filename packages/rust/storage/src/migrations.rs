//! SQL migration definitions for the Letterpress database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: generation_jobs",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per generation job. Options, logs, and the final document are JSON.
CREATE TABLE IF NOT EXISTS generation_jobs (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    topic           TEXT NOT NULL,
    options_json    TEXT NOT NULL,
    status          TEXT NOT NULL CHECK (status IN ('generating', 'ready', 'failed')),
    progress        INTEGER NOT NULL DEFAULT 0,
    logs_json       TEXT NOT NULL DEFAULT '[]',
    content_json    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_org ON generation_jobs(organization_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Organization reference data: knowledge_items, events",
            sql: r#"
CREATE TABLE IF NOT EXISTS knowledge_items (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    title           TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_knowledge_org ON knowledge_items(organization_id);

-- starts_at is unix seconds so range queries compare numerically.
CREATE TABLE IF NOT EXISTS events (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    starts_at       INTEGER NOT NULL,
    location        TEXT,
    url             TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_org_start ON events(organization_id, starts_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
