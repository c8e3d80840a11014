//! Local mirror database for PR activity.
//!
//! Holds PR records, activity entries, and per-scope sync state in one
//! SQLite file. The sync engine is the only bulk writer; freeze and
//! staleness passes mutate single PRs in place.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod query;
pub mod schema;

pub use query::{BotMatcher, EntryFilter, RepoFilter, DEFAULT_BOT_PATTERNS};
pub use schema::CURRENT_SCHEMA_VERSION;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::config::MirrorConfig;
use crate::core::CoreResult;
use crate::model::{
    format_ts, Entry, FileActivity, PrRecord, PrState, Reactions, SyncScope, SyncState,
};

/// Database holding the mirrored PR activity.
pub struct MirrorDb {
    conn: Connection,
}

/// A PR with a freeze cutoff set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrozenPr {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub frozen_at: DateTime<Utc>,
}

/// In-place changes to a stored entry. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub body: Option<String>,
    pub state: Option<String>,
    pub thread_resolved: Option<bool>,
    pub reactions: Option<Reactions>,
    /// `Some(None)` clears the annotation.
    pub file_activity_after: Option<Option<FileActivity>>,
}

impl MirrorDb {
    /// Open or create a mirror at the given path and bring its schema current.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path, config: &MirrorConfig) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn, config)
    }

    /// Create an in-memory mirror (for tests and scratch use).
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, &MirrorConfig::default())
    }

    fn from_connection(conn: Connection, config: &MirrorConfig) -> CoreResult<Self> {
        // In-memory databases answer "memory" here; that is fine.
        let _mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("Failed to enable WAL")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.busy_timeout(config.busy_timeout())
            .context("Failed to set busy timeout")?;

        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // PR records
    // ========================================================================

    /// Insert or overwrite a PR record. The freeze cutoff is owned by the
    /// freeze overlay and is never touched here.
    pub fn upsert_pr(&self, pr: &PrRecord) -> Result<()> {
        upsert_pr_inner(&self.conn, pr)
    }

    /// Look up one PR record.
    pub fn get_pr(&self, repo: &str, number: u64) -> Result<Option<PrRecord>> {
        self.conn
            .query_row(
                "SELECT repo, number, state, is_draft, title, author, branch, labels,
                        url, updated_at, frozen_at
                 FROM prs WHERE repo = ? AND number = ?",
                params![repo, number as i64],
                pr_from_row,
            )
            .optional()
            .context("Failed to query PR")
    }

    /// PR numbers mirrored for a repository, ascending.
    pub fn pr_numbers(&self, repo: &str) -> Result<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number FROM prs WHERE repo = ? ORDER BY number")
            .context("Failed to prepare pr_numbers query")?;
        let rows = stmt
            .query_map(params![repo], |row| row.get::<_, i64>(0))
            .context("Failed to execute pr_numbers query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read PR number")? as u64);
        }
        Ok(results)
    }

    /// Every repository with at least one PR or sync record.
    pub fn repos(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT repo FROM prs UNION SELECT repo FROM sync_meta ORDER BY repo",
            )
            .context("Failed to prepare repos query")?;
        let repos = stmt
            .query_map([], |row| row.get(0))
            .context("Failed to query repos")?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read repos")?;
        Ok(repos)
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Insert entries, overwriting any already stored under the same
    /// `(id, repo)`. Returns how many were new.
    pub fn insert_entries(&self, entries: &[Entry]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let added = insert_entries_inner(&tx, entries)?;
        tx.commit().context("Failed to commit entries")?;
        Ok(added)
    }

    /// Write one sync page atomically: PR upserts first, then entries.
    /// Returns how many entries were new.
    pub fn write_page(&self, prs: &[PrRecord], entries: &[Entry]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin page transaction")?;
        for pr in prs {
            upsert_pr_inner(&tx, pr)
                .with_context(|| format!("Failed to upsert {}#{}", pr.repo, pr.number))?;
        }
        let added = insert_entries_inner(&tx, entries)?;
        tx.commit().context("Failed to commit page")?;
        Ok(added)
    }

    /// Apply a patch to one entry. Returns false when no such entry exists.
    pub fn update_entry(&self, id: &str, repo: &str, patch: &EntryPatch) -> Result<bool> {
        update_entry_inner(&self.conn, id, repo, patch)
    }

    /// Replace the file-activity annotation on several entries of one
    /// repository in a single transaction.
    pub fn apply_file_activity(
        &self,
        repo: &str,
        updates: &[(String, Option<FileActivity>)],
    ) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let mut changed = 0;
        for (id, activity) in updates {
            let patch = EntryPatch {
                file_activity_after: Some(activity.clone()),
                ..EntryPatch::default()
            };
            if update_entry_inner(&tx, id, repo, &patch)? {
                changed += 1;
            }
        }
        tx.commit().context("Failed to commit file activity")?;
        Ok(changed)
    }

    /// Delete every entry, PR record, and sync record for a repository.
    /// Returns the number of entries removed.
    pub fn clear_repo(&self, repo: &str) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin clear transaction")?;
        // Entries first: they reference prs.
        let removed = tx
            .execute("DELETE FROM entries WHERE repo = ?", params![repo])
            .context("Failed to delete entries")?;
        tx.execute("DELETE FROM prs WHERE repo = ?", params![repo])
            .context("Failed to delete PRs")?;
        tx.execute("DELETE FROM sync_meta WHERE repo = ?", params![repo])
            .context("Failed to delete sync state")?;
        tx.commit().context("Failed to commit clear")?;
        Ok(removed)
    }

    // ========================================================================
    // Sync state
    // ========================================================================

    /// Sync state for one scope, or `None` if that scope never synced.
    pub fn get_sync_state(&self, repo: &str, scope: SyncScope) -> Result<Option<SyncState>> {
        let sql = match scope {
            SyncScope::Open => {
                "SELECT open_last_sync, open_cursor, open_pr_count FROM sync_meta WHERE repo = ?"
            }
            SyncScope::Closed => {
                "SELECT closed_last_sync, closed_cursor, closed_pr_count FROM sync_meta WHERE repo = ?"
            }
        };
        let row: Option<(Option<String>, Option<String>, i64)> = self
            .conn
            .query_row(sql, params![repo], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()
            .context("Failed to query sync state")?;

        let Some((last_sync, cursor, pr_count)) = row else {
            return Ok(None);
        };
        if last_sync.is_none() && cursor.is_none() && pr_count == 0 {
            return Ok(None);
        }
        Ok(Some(SyncState {
            repo: repo.to_string(),
            scope,
            last_sync: last_sync
                .as_deref()
                .map(crate::model::parse_ts)
                .transpose()
                .context("Corrupt last_sync timestamp")?,
            cursor,
            pr_count: pr_count as u64,
        }))
    }

    /// Both scopes' state for a repository, omitting scopes never synced.
    pub fn sync_states(&self, repo: &str) -> Result<Vec<SyncState>> {
        let mut states = Vec::new();
        for scope in [SyncScope::Open, SyncScope::Closed] {
            if let Some(state) = self.get_sync_state(repo, scope)? {
                states.push(state);
            }
        }
        Ok(states)
    }

    /// Record the end of a sync run for one scope.
    ///
    /// `cursor = None` keeps the stored cursor. The legacy cross-scope
    /// columns are recomputed so older readers see the newest sync.
    pub fn record_sync(
        &self,
        repo: &str,
        scope: SyncScope,
        last_sync: &DateTime<Utc>,
        cursor: Option<&str>,
        prs_processed: u64,
    ) -> Result<()> {
        let scope_sql = match scope {
            SyncScope::Open => {
                "UPDATE sync_meta SET
                    open_last_sync = ?2,
                    open_cursor = COALESCE(?3, open_cursor),
                    open_pr_count = open_pr_count + ?4
                 WHERE repo = ?1"
            }
            SyncScope::Closed => {
                "UPDATE sync_meta SET
                    closed_last_sync = ?2,
                    closed_cursor = COALESCE(?3, closed_cursor),
                    closed_pr_count = closed_pr_count + ?4
                 WHERE repo = ?1"
            }
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin sync-state transaction")?;
        tx.execute(
            "INSERT INTO sync_meta (repo) VALUES (?) ON CONFLICT (repo) DO NOTHING",
            params![repo],
        )
        .context("Failed to create sync state")?;
        tx.execute(
            scope_sql,
            params![repo, format_ts(last_sync), cursor, prs_processed as i64],
        )
        .context("Failed to update scope sync state")?;
        tx.execute(
            "UPDATE sync_meta SET
                last_sync = NULLIF(MAX(COALESCE(open_last_sync, ''), COALESCE(closed_last_sync, '')), ''),
                cursor = COALESCE(?2, cursor),
                pr_count = open_pr_count + closed_pr_count
             WHERE repo = ?1",
            params![repo, cursor],
        )
        .context("Failed to update legacy sync state")?;
        tx.commit().context("Failed to commit sync state")?;
        Ok(())
    }

    // ========================================================================
    // Freeze cutoffs
    // ========================================================================

    /// Set or clear a PR's freeze cutoff. Returns false if the PR is unknown.
    pub fn set_frozen_at(
        &self,
        repo: &str,
        number: u64,
        frozen_at: Option<&DateTime<Utc>>,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE prs SET frozen_at = ? WHERE repo = ? AND number = ?",
                params![frozen_at.map(format_ts), repo, number as i64],
            )
            .context("Failed to update freeze cutoff")?;
        Ok(changed > 0)
    }

    /// Frozen PRs, newest cutoff first, optionally for one repository.
    pub fn frozen_prs(&self, repo: Option<&str>) -> Result<Vec<FrozenPr>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT repo, number, title, frozen_at FROM prs
                 WHERE frozen_at IS NOT NULL AND (?1 IS NULL OR repo = ?1)
                 ORDER BY frozen_at DESC, repo, number",
            )
            .context("Failed to prepare frozen_prs query")?;

        let rows = stmt
            .query_map(params![repo], |row| {
                Ok(FrozenPr {
                    repo: row.get(0)?,
                    number: row.get::<_, i64>(1)? as u64,
                    title: row.get(2)?,
                    frozen_at: ts_column(row, 3)?,
                })
            })
            .context("Failed to execute frozen_prs query")?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.context("Failed to read frozen PR row")?);
        }
        Ok(results)
    }

    /// Count stored entries of a PR created strictly after `cutoff`.
    pub fn count_entries_after(
        &self,
        repo: &str,
        number: u64,
        cutoff: &DateTime<Utc>,
    ) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM entries WHERE repo = ? AND pr = ? AND created_at > ?",
                params![repo, number as i64, format_ts(cutoff)],
                |row| row.get(0),
            )
            .context("Failed to count entries after cutoff")?;
        Ok(count as usize)
    }
}

// ============================================================================
// Write helpers (shared by connection and transaction paths)
// ============================================================================

fn upsert_pr_inner(conn: &Connection, pr: &PrRecord) -> Result<()> {
    let labels = serde_json::to_string(&pr.labels).context("Failed to serialize labels")?;
    conn.execute(
        "INSERT INTO prs (
            repo, number, state, is_draft, title, author, branch, labels, url, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (repo, number) DO UPDATE SET
            state = excluded.state,
            is_draft = excluded.is_draft,
            title = excluded.title,
            author = excluded.author,
            branch = excluded.branch,
            labels = excluded.labels,
            url = excluded.url,
            updated_at = excluded.updated_at",
        params![
            pr.repo,
            pr.number as i64,
            pr.state.as_str(),
            pr.is_draft,
            pr.title,
            pr.author,
            pr.branch,
            labels,
            pr.url,
            format_ts(&pr.updated_at),
        ],
    )
    .context("Failed to upsert PR")?;
    Ok(())
}

fn insert_entries_inner(conn: &Connection, entries: &[Entry]) -> Result<usize> {
    let mut exists = conn
        .prepare_cached("SELECT 1 FROM entries WHERE id = ? AND repo = ?")
        .context("Failed to prepare entry existence check")?;
    // Re-ingesting keeps the first capture time and any locally computed
    // file-activity annotation the incoming row lacks.
    let mut insert = conn
        .prepare_cached(
            "INSERT INTO entries (
                id, repo, pr, type, subtype, author, body, state,
                created_at, updated_at, captured_at, url, file, line,
                stack, thread_resolved, reactions, file_activity_after
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id, repo) DO UPDATE SET
                pr = excluded.pr,
                type = excluded.type,
                subtype = excluded.subtype,
                author = excluded.author,
                body = excluded.body,
                state = excluded.state,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                url = excluded.url,
                file = excluded.file,
                line = excluded.line,
                stack = excluded.stack,
                thread_resolved = excluded.thread_resolved,
                reactions = excluded.reactions,
                file_activity_after = COALESCE(excluded.file_activity_after, entries.file_activity_after)",
        )
        .context("Failed to prepare entry insert")?;

    let mut added = 0;
    for entry in entries {
        let is_new = !exists
            .exists(params![entry.id, entry.repo])
            .context("Failed to check entry existence")?;

        insert
            .execute(params![
                entry.id,
                entry.repo,
                entry.pr as i64,
                entry.entry_type.as_str(),
                entry.subtype,
                entry.author,
                entry.body,
                entry.state,
                format_ts(&entry.created_at),
                entry.updated_at.as_ref().map(format_ts),
                format_ts(&entry.captured_at),
                entry.url,
                entry.file,
                entry.line,
                to_json(entry.stack.as_ref())?,
                entry.thread_resolved,
                to_json(entry.reactions.as_ref())?,
                to_json(entry.file_activity_after.as_ref())?,
            ])
            .with_context(|| format!("Failed to insert entry {} ({})", entry.id, entry.repo))?;

        if is_new {
            added += 1;
        }
    }
    Ok(added)
}

fn update_entry_inner(conn: &Connection, id: &str, repo: &str, patch: &EntryPatch) -> Result<bool> {
    let mut sets: Vec<&'static str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(body) = &patch.body {
        sets.push("body = ?");
        values.push(Box::new(body.clone()));
    }
    if let Some(state) = &patch.state {
        sets.push("state = ?");
        values.push(Box::new(state.clone()));
    }
    if let Some(resolved) = patch.thread_resolved {
        sets.push("thread_resolved = ?");
        values.push(Box::new(resolved));
    }
    if let Some(reactions) = &patch.reactions {
        sets.push("reactions = ?");
        values.push(Box::new(to_json(Some(reactions))?));
    }
    if let Some(activity) = &patch.file_activity_after {
        sets.push("file_activity_after = ?");
        values.push(Box::new(to_json(activity.as_ref())?));
    }

    if sets.is_empty() {
        let found = conn
            .prepare_cached("SELECT 1 FROM entries WHERE id = ? AND repo = ?")
            .context("Failed to prepare entry lookup")?
            .exists(params![id, repo])
            .context("Failed to look up entry")?;
        return Ok(found);
    }

    let sql = format!(
        "UPDATE entries SET {} WHERE id = ? AND repo = ?",
        sets.join(", ")
    );
    values.push(Box::new(id.to_string()));
    values.push(Box::new(repo.to_string()));
    let params: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();

    let changed = conn
        .execute(&sql, params.as_slice())
        .with_context(|| format!("Failed to update entry {id} ({repo})"))?;
    Ok(changed > 0)
}

fn to_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to serialize annotation")
}

// ============================================================================
// Row helpers
// ============================================================================

fn pr_from_row(row: &Row<'_>) -> rusqlite::Result<PrRecord> {
    let state: String = row.get(2)?;
    let labels: String = row.get(7)?;
    Ok(PrRecord {
        repo: row.get(0)?,
        number: row.get::<_, i64>(1)? as u64,
        state: state
            .parse::<PrState>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?,
        is_draft: row.get(3)?,
        title: row.get(4)?,
        author: row.get(5)?,
        branch: row.get(6)?,
        labels: serde_json::from_str(&labels).unwrap_or_default(),
        url: row.get(8)?,
        updated_at: ts_column(row, 9)?,
        frozen_at: opt_ts_column(row, 10)?,
    })
}

/// Read a required timestamp column.
pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read an optional timestamp column.
pub(crate) fn opt_ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Builders shared by the test modules of this crate.

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::model::{DisplayState, Entry, EntryType, PrRecord, PrState, SUBTYPE_REVIEW_COMMENT};

    pub const REPO: &str = "acme/app";

    /// Fixed base time; `at(n)` is `n` minutes after it.
    pub fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    pub fn pr(number: u64, state: PrState, is_draft: bool) -> PrRecord {
        PrRecord {
            repo: REPO.to_string(),
            number,
            state,
            is_draft,
            title: format!("PR {number}"),
            author: "alice".to_string(),
            branch: format!("feature-{number}"),
            labels: Vec::new(),
            url: None,
            updated_at: at(0),
            frozen_at: None,
        }
    }

    pub fn entry(id: &str, pr: u64, entry_type: EntryType, author: &str, created: i64) -> Entry {
        Entry {
            id: id.to_string(),
            repo: REPO.to_string(),
            pr,
            entry_type,
            subtype: None,
            author: author.to_string(),
            body: Some(format!("body of {id}")),
            state: None,
            created_at: at(created),
            updated_at: None,
            captured_at: at(1_000),
            url: None,
            file: None,
            line: None,
            thread_resolved: None,
            reactions: None,
            file_activity_after: None,
            stack: None,
            pr_title: format!("PR {pr}"),
            pr_state: DisplayState::Open,
            pr_author: "alice".to_string(),
            pr_branch: format!("feature-{pr}"),
            pr_labels: Vec::new(),
        }
    }

    pub fn review_comment(id: &str, pr: u64, resolved: Option<bool>, created: i64) -> Entry {
        let mut e = entry(id, pr, EntryType::Comment, "bob", created);
        e.subtype = Some(SUBTYPE_REVIEW_COMMENT.to_string());
        e.file = Some("src/lib.rs".to_string());
        e.line = Some(10);
        e.thread_resolved = resolved;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{at, entry, pr, review_comment, REPO};
    use super::*;
    use crate::model::EntryType;
    use tempfile::tempdir;

    fn setup_db() -> MirrorDb {
        MirrorDb::open_in_memory().unwrap()
    }

    #[test]
    fn test_open_creates_parent_dirs_and_wal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("mirror.db");
        let db = MirrorDb::open(&path, &MirrorConfig::default()).unwrap();
        assert!(path.exists());

        let mode: String = db
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_upsert_pr_overwrites_but_keeps_freeze() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, true)).unwrap();
        assert!(db.set_frozen_at(REPO, 1, Some(&at(5))).unwrap());

        let mut merged = pr(1, PrState::Merged, false);
        merged.title = "Renamed".to_string();
        db.upsert_pr(&merged).unwrap();

        let stored = db.get_pr(REPO, 1).unwrap().unwrap();
        assert_eq!(stored.state, PrState::Merged);
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.frozen_at, Some(at(5)));
    }

    #[test]
    fn test_insert_entries_counts_only_new() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();

        let batch = vec![
            entry("c1", 1, EntryType::Comment, "bob", 1),
            entry("c2", 1, EntryType::Comment, "bob", 2),
        ];
        assert_eq!(db.insert_entries(&batch).unwrap(), 2);
        assert_eq!(db.insert_entries(&batch).unwrap(), 0);

        let mut edited = batch[0].clone();
        edited.body = Some("edited".to_string());
        assert_eq!(db.insert_entries(&[edited]).unwrap(), 0);
    }

    #[test]
    fn test_entry_requires_existing_pr() {
        let db = setup_db();
        let err = db
            .insert_entries(&[entry("c1", 404, EntryType::Comment, "bob", 1)])
            .unwrap_err();
        assert!(format!("{err:#}").contains("FOREIGN KEY"));
    }

    #[test]
    fn test_reinsert_keeps_capture_time_and_file_activity() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();
        let original = review_comment("rc1", 1, Some(false), 1);
        db.insert_entries(std::slice::from_ref(&original)).unwrap();

        let activity = FileActivity {
            modified: true,
            commits_touching_file: 1,
            latest_commit: Some("abc".to_string()),
            latest_commit_at: Some(at(3)),
        };
        db.apply_file_activity(REPO, &[("rc1".to_string(), Some(activity.clone()))])
            .unwrap();

        let mut resynced = original;
        resynced.captured_at = at(2_000);
        resynced.thread_resolved = Some(true);
        db.insert_entries(&[resynced]).unwrap();

        let (captured, resolved, stored_activity): (String, bool, String) = db
            .conn()
            .query_row(
                "SELECT captured_at, thread_resolved, file_activity_after FROM entries WHERE id = 'rc1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(captured, format_ts(&at(1_000)));
        assert!(resolved);
        assert_eq!(
            serde_json::from_str::<FileActivity>(&stored_activity).unwrap(),
            activity
        );
    }

    #[test]
    fn test_update_entry_patch() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();
        db.insert_entries(&[review_comment("rc1", 1, Some(false), 1)])
            .unwrap();

        let patch = EntryPatch {
            thread_resolved: Some(true),
            body: Some("new body".to_string()),
            ..EntryPatch::default()
        };
        assert!(db.update_entry("rc1", REPO, &patch).unwrap());
        assert!(!db.update_entry("missing", REPO, &patch).unwrap());

        let (body, resolved): (String, bool) = db
            .conn()
            .query_row(
                "SELECT body, thread_resolved FROM entries WHERE id = 'rc1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(body, "new body");
        assert!(resolved);

        assert!(db.update_entry("rc1", REPO, &EntryPatch::default()).unwrap());
    }

    #[test]
    fn test_clear_repo_removes_everything_for_repo_only() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();
        let mut other = pr(2, PrState::Open, false);
        other.repo = "acme/other".to_string();
        db.upsert_pr(&other).unwrap();
        db.insert_entries(&[entry("c1", 1, EntryType::Comment, "bob", 1)])
            .unwrap();
        db.record_sync(REPO, SyncScope::Open, &at(0), None, 1).unwrap();

        assert_eq!(db.clear_repo(REPO).unwrap(), 1);
        assert!(db.get_pr(REPO, 1).unwrap().is_none());
        assert!(db.get_sync_state(REPO, SyncScope::Open).unwrap().is_none());
        assert!(db.get_pr("acme/other", 2).unwrap().is_some());
    }

    #[test]
    fn test_record_sync_per_scope_and_legacy_fields() {
        let db = setup_db();
        assert!(db.get_sync_state(REPO, SyncScope::Open).unwrap().is_none());

        db.record_sync(REPO, SyncScope::Open, &at(10), Some("cur-1"), 3)
            .unwrap();
        db.record_sync(REPO, SyncScope::Closed, &at(5), None, 4).unwrap();
        db.record_sync(REPO, SyncScope::Open, &at(20), None, 2).unwrap();

        let open = db.get_sync_state(REPO, SyncScope::Open).unwrap().unwrap();
        assert_eq!(open.last_sync, Some(at(20)));
        assert_eq!(open.cursor.as_deref(), Some("cur-1"));
        assert_eq!(open.pr_count, 5);

        let closed = db.get_sync_state(REPO, SyncScope::Closed).unwrap().unwrap();
        assert_eq!(closed.last_sync, Some(at(5)));
        assert_eq!(closed.cursor, None);
        assert_eq!(closed.pr_count, 4);

        let (legacy_last, legacy_count): (String, i64) = db
            .conn()
            .query_row(
                "SELECT last_sync, pr_count FROM sync_meta WHERE repo = ?",
                params![REPO],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(legacy_last, format_ts(&at(20)));
        assert_eq!(legacy_count, 9);
        assert_eq!(db.sync_states(REPO).unwrap().len(), 2);
    }

    #[test]
    fn test_frozen_prs_and_count_after() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();
        db.upsert_pr(&pr(2, PrState::Open, false)).unwrap();
        db.insert_entries(&[
            entry("c1", 1, EntryType::Comment, "bob", 1),
            entry("c2", 1, EntryType::Comment, "bob", 10),
        ])
        .unwrap();

        db.set_frozen_at(REPO, 1, Some(&at(5))).unwrap();
        assert!(!db.set_frozen_at(REPO, 99, Some(&at(5))).unwrap());

        let frozen = db.frozen_prs(None).unwrap();
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen[0].number, 1);
        assert!(db.frozen_prs(Some("acme/other")).unwrap().is_empty());
        assert_eq!(db.count_entries_after(REPO, 1, &at(5)).unwrap(), 1);
    }

    #[test]
    fn test_repos_lists_distinct() {
        let db = setup_db();
        db.upsert_pr(&pr(1, PrState::Open, false)).unwrap();
        db.record_sync("acme/empty", SyncScope::Open, &at(0), None, 0)
            .unwrap();
        assert_eq!(db.repos().unwrap(), vec!["acme/app", "acme/empty"]);
    }
}
