//! SQL migration definitions for the MorningBrief history database.
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
    vec![Migration {
        version: 1,
        description: "Initial schema: briefs, deliveries",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Generated briefs
CREATE TABLE IF NOT EXISTS briefs (
    id            TEXT PRIMARY KEY,
    brief_date    TEXT NOT NULL,
    generated_at  TEXT NOT NULL,
    complete      INTEGER NOT NULL,
    section_count INTEGER NOT NULL,
    content_hash  TEXT NOT NULL,
    document_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_briefs_date ON briefs(brief_date);
CREATE INDEX IF NOT EXISTS idx_briefs_generated_at ON briefs(generated_at);

-- Where each brief was delivered
CREATE TABLE IF NOT EXISTS deliveries (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    brief_id     TEXT NOT NULL REFERENCES briefs(id) ON DELETE CASCADE,
    destination  TEXT NOT NULL,
    delivered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_deliveries_brief ON deliveries(brief_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
