//! Contract for the remote code-review API.
//!
//! The mirror never talks to the network itself. A caller supplies an
//! [`ActivitySource`] that turns the remote's paginated PR listing into the
//! flattened node types below; the sync engine only consumes them.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::model::{PrState, Reactions};

/// Request for one page of PR activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page size.
    pub first: u32,
    /// Continuation token from the previous page's [`PageInfo::end_cursor`].
    pub after: Option<String>,
    /// Remote lifecycle states to include.
    pub states: Vec<PrState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

/// One page of PRs, most recently updated first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrPage {
    pub prs: Vec<PrNode>,
    pub page_info: PageInfo,
}

/// A PR as the remote reports it, with its activity inlined.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrNode {
    pub number: u64,
    pub title: String,
    #[serde(deserialize_with = "de_pr_state")]
    pub state: PrState,
    #[serde(default)]
    pub is_draft: bool,
    /// `None` for deleted accounts.
    #[serde(default)]
    pub author: Option<String>,
    pub head_ref_name: String,
    #[serde(default)]
    pub url: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<ReviewNode>,
    #[serde(default)]
    pub comments: Vec<CommentNode>,
    #[serde(default)]
    pub review_threads: Vec<ReviewThreadNode>,
    #[serde(default)]
    pub commits: Vec<CommitNode>,
    #[serde(default)]
    pub checks: Vec<CheckNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    /// Upper-snake remote state, e.g. `CHANGES_REQUESTED`.
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A top-level conversation comment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewThreadNode {
    pub is_resolved: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub comments: Vec<ThreadCommentNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCommentNode {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    /// Falls back to the thread's path when absent.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub oid: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    pub committed_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A CI check run attached to the PR's head commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckNode {
    pub id: String,
    pub name: String,
    /// `QUEUED`, `IN_PROGRESS`, `COMPLETED`, ...
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Remote PR activity provider.
///
/// Errors are surfaced to the sync caller unchanged; nothing here retries.
pub trait ActivitySource {
    /// Fetch one page of PRs in `states`, ordered by last update, newest first.
    fn fetch_pr_activity(&self, owner: &str, name: &str, request: &PageRequest) -> Result<PrPage>;

    /// Reaction summaries for the given comment ids. Ids without reactions
    /// may be omitted.
    fn fetch_comment_reactions(&self, ids: &[String]) -> Result<HashMap<String, Reactions>>;
}

fn de_pr_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PrState, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}
