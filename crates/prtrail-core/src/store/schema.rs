//! Schema creation and versioned migrations.
//!
//! The schema version lives in SQLite's `PRAGMA user_version`. A fresh file
//! (version 0) gets the full current schema in one step. An older file runs
//! every pending step in ascending order inside a single transaction. Steps
//! are keyed by the version they upgrade *from* and never introspect the live
//! schema, since SQLite cannot add a column conditionally.

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::core::{CoreError, CoreResult};

/// Schema version written by this release.
pub const CURRENT_SCHEMA_VERSION: i64 = 5;

/// One additive upgrade step.
struct Migration {
    from: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 1,
        description: "track review thread resolution",
        sql: "ALTER TABLE entries ADD COLUMN thread_resolved INTEGER;
              CREATE INDEX IF NOT EXISTS idx_entries_thread_resolved ON entries(thread_resolved);",
    },
    Migration {
        from: 2,
        description: "reaction and file-activity annotations",
        sql: "ALTER TABLE entries ADD COLUMN reactions TEXT;
              ALTER TABLE entries ADD COLUMN file_activity_after TEXT;",
    },
    Migration {
        from: 3,
        description: "per-PR freeze cutoff",
        sql: "ALTER TABLE prs ADD COLUMN frozen_at TEXT;",
    },
    Migration {
        from: 4,
        description: "per-scope sync state",
        sql: "ALTER TABLE sync_meta ADD COLUMN open_last_sync TEXT;
              ALTER TABLE sync_meta ADD COLUMN open_cursor TEXT;
              ALTER TABLE sync_meta ADD COLUMN open_pr_count INTEGER NOT NULL DEFAULT 0;
              ALTER TABLE sync_meta ADD COLUMN closed_last_sync TEXT;
              ALTER TABLE sync_meta ADD COLUMN closed_cursor TEXT;
              ALTER TABLE sync_meta ADD COLUMN closed_pr_count INTEGER NOT NULL DEFAULT 0;
              UPDATE sync_meta SET
                  open_last_sync = last_sync,
                  open_cursor = cursor,
                  open_pr_count = pr_count;",
    },
];

/// Read the stored schema version (0 when never stamped).
pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to read schema version")
}

/// Bring the schema up to [`CURRENT_SCHEMA_VERSION`].
///
/// Opening an already-current store is a no-op. Not safe to run from two
/// processes at once.
pub fn migrate(conn: &Connection) -> CoreResult<()> {
    let found = schema_version(conn)?;

    if found > CURRENT_SCHEMA_VERSION {
        return Err(CoreError::UnsupportedSchemaVersion {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if found == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .unchecked_transaction()
        .context("Failed to begin migration transaction")?;

    if found == 0 {
        tx.execute_batch(SCHEMA_SQL)
            .context("Failed to create schema")?;
        info!(version = CURRENT_SCHEMA_VERSION, "created mirror schema");
    } else {
        for step in MIGRATIONS.iter().filter(|m| m.from >= found) {
            tx.execute_batch(step.sql).with_context(|| {
                format!(
                    "Failed to migrate schema from v{} ({})",
                    step.from, step.description
                )
            })?;
            info!(from = step.from, to = step.from + 1, step = step.description, "migrated schema");
        }
    }

    // PRAGMA does not take bound parameters; the value is a compile-time constant.
    tx.execute_batch(&format!("PRAGMA user_version = {CURRENT_SCHEMA_VERSION};"))
        .context("Failed to stamp schema version")?;
    tx.commit().context("Failed to commit migration")?;
    Ok(())
}

// ============================================================================
// Schema SQL
// ============================================================================

const SCHEMA_SQL: &str = r"
-- PR RECORDS
CREATE TABLE IF NOT EXISTS prs (
    repo TEXT NOT NULL,
    number INTEGER NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('open', 'closed', 'merged')),
    is_draft INTEGER NOT NULL DEFAULT 0,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    branch TEXT NOT NULL,
    labels TEXT NOT NULL DEFAULT '[]',
    url TEXT,
    updated_at TEXT NOT NULL,
    frozen_at TEXT,
    PRIMARY KEY (repo, number)
);

-- ACTIVITY ENTRIES
CREATE TABLE IF NOT EXISTS entries (
    id TEXT NOT NULL,
    repo TEXT NOT NULL,
    pr INTEGER NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('comment', 'review', 'commit', 'ci', 'event')),
    subtype TEXT,
    author TEXT NOT NULL,
    body TEXT,
    state TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT,
    captured_at TEXT NOT NULL,
    url TEXT,
    file TEXT,
    line INTEGER,
    stack TEXT,
    thread_resolved INTEGER,
    reactions TEXT,
    file_activity_after TEXT,
    PRIMARY KEY (id, repo),
    FOREIGN KEY (repo, pr) REFERENCES prs(repo, number)
);

CREATE INDEX IF NOT EXISTS idx_entries_repo_pr ON entries(repo, pr);
CREATE INDEX IF NOT EXISTS idx_entries_type ON entries(type);
CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);
CREATE INDEX IF NOT EXISTS idx_entries_author ON entries(author);
CREATE INDEX IF NOT EXISTS idx_entries_thread_resolved ON entries(thread_resolved);

-- SYNC STATE
CREATE TABLE IF NOT EXISTS sync_meta (
    repo TEXT PRIMARY KEY,
    last_sync TEXT,
    cursor TEXT,
    pr_count INTEGER NOT NULL DEFAULT 0,
    open_last_sync TEXT,
    open_cursor TEXT,
    open_pr_count INTEGER NOT NULL DEFAULT 0,
    closed_last_sync TEXT,
    closed_cursor TEXT,
    closed_pr_count INTEGER NOT NULL DEFAULT 0
);
";
