use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Versioned domain settings

CREATE TABLE domains (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    userid TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX idx_domains_userid_created ON domains(userid, created_at);
CREATE INDEX idx_domains_created ON domains(created_at);
",
    )])
}
