//! Domain types for the PR activity mirror.
//!
//! PR records are mutable metadata rows; entries are immutable units of
//! activity (comments, reviews, commits, CI signals) keyed by `(id, repo)`.
//! The displayed PR state is never stored: it is derived from the stored
//! lifecycle plus the draft flag by [`DisplayState::derive`].

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Repository identifiers
// ============================================================================

/// A validated `owner/name` repository identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Parse `owner/name`. Both halves must be non-empty and contain only
    /// characters the code host accepts (alphanumerics, `-`, `_`, `.`).
    pub fn parse(s: &str) -> Result<Self> {
        let Some((owner, name)) = s.trim().split_once('/') else {
            bail!("expected owner/name, got '{s}'");
        };
        for part in [owner, name] {
            if part.is_empty()
                || !part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                bail!("invalid repository identifier '{s}'");
            }
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl TryFrom<String> for RepoId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.to_string()
    }
}

// ============================================================================
// PR lifecycle
// ============================================================================

/// Stored lifecycle of a PR, exactly as the remote reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }

    /// Closed and merged are terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Merged)
    }
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "merged" => Ok(Self::Merged),
            other => bail!("unknown PR state '{other}'"),
        }
    }
}

/// State shown to users and accepted by state filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Open,
    Draft,
    Closed,
    Merged,
}

impl DisplayState {
    /// Derive the display state. Terminal lifecycle always wins over the
    /// draft flag, so a stale draft flag never shows a merged PR as draft.
    #[must_use]
    pub const fn derive(state: PrState, is_draft: bool) -> Self {
        match (state, is_draft) {
            (PrState::Merged, _) => Self::Merged,
            (PrState::Closed, _) => Self::Closed,
            (PrState::Open, true) => Self::Draft,
            (PrState::Open, false) => Self::Open,
        }
    }

    /// The stored `(lifecycle, draft)` pair this display state matches.
    /// `None` for the draft flag means it is not consulted.
    #[must_use]
    pub const fn stored_match(self) -> (PrState, Option<bool>) {
        match self {
            Self::Open => (PrState::Open, Some(false)),
            Self::Draft => (PrState::Open, Some(true)),
            Self::Closed => (PrState::Closed, None),
            Self::Merged => (PrState::Merged, None),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Draft => "draft",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entry types
// ============================================================================

/// Kind of activity an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Comment,
    Review,
    Commit,
    Ci,
    Event,
}

impl EntryType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Review => "review",
            Self::Commit => "commit",
            Self::Ci => "ci",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "comment" => Ok(Self::Comment),
            "review" => Ok(Self::Review),
            "commit" => Ok(Self::Commit),
            "ci" => Ok(Self::Ci),
            "event" => Ok(Self::Event),
            other => bail!("unknown entry type '{other}'"),
        }
    }
}

/// Subtype for top-level PR conversation comments.
pub const SUBTYPE_ISSUE_COMMENT: &str = "issue_comment";
/// Subtype for comments anchored in a review thread.
pub const SUBTYPE_REVIEW_COMMENT: &str = "review_comment";

// ============================================================================
// Annotations
// ============================================================================

/// Reaction rollup for a comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
    /// Logins that reacted with a thumbs-up.
    #[serde(default)]
    pub thumbs_up_by: Vec<String>,
    /// Total reactions of any kind.
    #[serde(default)]
    pub total: u32,
}

/// Whether the file a comment is anchored to changed after the comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileActivity {
    pub modified: bool,
    pub commits_touching_file: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_commit_at: Option<DateTime<Utc>>,
}

/// Position of a PR inside a third-party stack of dependent PRs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInfo {
    pub stack_id: String,
    /// 1-based, bottom of the stack first.
    pub position: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_pr: Option<u64>,
}

// ============================================================================
// Records
// ============================================================================

/// Mutable metadata for one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRecord {
    pub repo: String,
    pub number: u64,
    pub state: PrState,
    pub is_draft: bool,
    pub title: String,
    pub author: String,
    pub branch: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_at: Option<DateTime<Utc>>,
}

impl PrRecord {
    #[must_use]
    pub const fn display_state(&self) -> DisplayState {
        DisplayState::derive(self.state, self.is_draft)
    }
}

/// One unit of PR activity, with the owning PR's fields denormalized in.
///
/// The `pr_*` fields are filled from the PR record on every read; when
/// writing, only the entry's own columns are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub repo: String,
    pub pr: u64,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_resolved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Reactions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_activity_after: Option<FileActivity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackInfo>,

    pub pr_title: String,
    pub pr_state: DisplayState,
    pub pr_author: String,
    pub pr_branch: String,
    #[serde(default)]
    pub pr_labels: Vec<String>,
}

impl Entry {
    /// Latest known activity time: `updated_at`, else `created_at`.
    #[must_use]
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    #[must_use]
    pub fn is_review_comment(&self) -> bool {
        self.entry_type == EntryType::Comment
            && self.subtype.as_deref() == Some(SUBTYPE_REVIEW_COMMENT)
    }
}

/// Which partition of PRs a sync run covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    #[default]
    Open,
    Closed,
}

impl SyncScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Remote lifecycle states requested for this scope.
    #[must_use]
    pub fn remote_states(self) -> Vec<PrState> {
        match self {
            Self::Open => vec![PrState::Open],
            Self::Closed => vec![PrState::Closed, PrState::Merged],
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental sync cursor for one `(repo, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub repo: String,
    pub scope: SyncScope,
    pub last_sync: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub pr_count: u64,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Canonical stored form: RFC 3339, UTC, fixed millisecond precision.
/// Fixed width keeps lexical order equal to chronological order in SQL.
#[must_use]
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp into UTC.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
