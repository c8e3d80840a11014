//! Entry queries over the mirror.
//!
//! An [`EntryFilter`] is compiled into a list of typed [`Clause`]s, each of
//! which renders its own SQL fragment and binds its values as named
//! parameters. Author and bot exclusion are pattern-based, and label search
//! folds case beyond ASCII, which SQLite's `LOWER` and `LIKE` cannot do.
//! Both run over the result set afterwards, so offset and limit are only
//! pushed into SQL when no in-memory filtering is needed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use rusqlite::types::{ToSql, Type};
use rusqlite::{OptionalExtension, Row};

use super::{opt_ts_column, ts_column, MirrorDb};
use crate::core::{CoreError, CoreResult};
use crate::model::{format_ts, DisplayState, Entry, EntryType, PrState, SUBTYPE_REVIEW_COMMENT};

/// Author patterns treated as bots unless the caller supplies more.
pub const DEFAULT_BOT_PATTERNS: &[&str] = &[
    r"\[bot\]$",
    r"^dependabot",
    r"^renovate",
    r"-bot$",
    r"^github-actions",
];

// ============================================================================
// Filters
// ============================================================================

/// How to match the repository column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoFilter {
    Exact(String),
    /// Case-insensitive substring.
    Contains(String),
}

/// Typed filter for entry queries. Every present field is ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub id: Option<String>,
    pub repo: Option<RepoFilter>,
    pub pr: Option<u64>,
    pub prs: Vec<u64>,
    /// Case-insensitive exact login.
    pub author: Option<String>,
    pub types: Vec<EntryType>,
    pub states: Vec<DisplayState>,
    /// Case-insensitive substring of any PR label.
    pub label: Option<String>,
    /// Entries created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub exclude_authors: Vec<String>,
    pub exclude_bots: bool,
    /// Extra bot regexes, added to [`DEFAULT_BOT_PATTERNS`].
    pub bot_patterns: Vec<String>,
    /// Only unresolved review comments on closed or merged PRs.
    pub orphaned: bool,
    /// `None` hides stale review comments; `Some(false)` shows them.
    pub exclude_stale: Option<bool>,
    /// Show entries created after their PR's freeze cutoff.
    pub include_frozen: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl EntryFilter {
    /// Filter for everything stored for one PR, ignoring visibility rules.
    #[must_use]
    pub fn all_for_pr(repo: &str, pr: u64) -> Self {
        Self {
            repo: Some(RepoFilter::Exact(repo.to_string())),
            pr: Some(pr),
            exclude_stale: Some(false),
            include_frozen: true,
            ..Self::default()
        }
    }

    /// Reject combinations that cannot both hold.
    pub fn validate(&self) -> CoreResult<()> {
        if self.pr.is_some() && !self.prs.is_empty() {
            return Err(CoreError::ConflictingFilters {
                detail: "a single PR and a PR list cannot be combined".to_string(),
            });
        }
        if self.orphaned && self.exclude_stale == Some(true) {
            return Err(CoreError::ConflictingFilters {
                detail: "orphaned comments are exactly the stale ones being excluded"
                    .to_string(),
            });
        }
        Ok(())
    }

    const fn hides_stale(&self) -> bool {
        !self.orphaned && !matches!(self.exclude_stale, Some(false))
    }

    fn needs_post_filter(&self) -> bool {
        self.exclude_bots || !self.exclude_authors.is_empty() || self.label.is_some()
    }

    fn clauses(&self) -> Vec<Clause> {
        let mut clauses = Vec::new();

        if let Some(id) = &self.id {
            clauses.push(Clause::Id(id.clone()));
        }
        match &self.repo {
            Some(RepoFilter::Exact(repo)) => clauses.push(Clause::RepoExact(repo.clone())),
            Some(RepoFilter::Contains(part)) => clauses.push(Clause::RepoContains(part.clone())),
            None => {}
        }
        if let Some(pr) = self.pr {
            clauses.push(Clause::Pr(pr));
        }
        if !self.prs.is_empty() {
            clauses.push(Clause::PrIn(self.prs.clone()));
        }
        if let Some(author) = &self.author {
            clauses.push(Clause::Author(author.clone()));
        }
        if !self.types.is_empty() {
            clauses.push(Clause::TypeIn(self.types.clone()));
        }
        if !self.states.is_empty() {
            clauses.push(Clause::StateAny(self.states.clone()));
        }
        if let Some(since) = self.since {
            clauses.push(Clause::Since(since));
        }
        if self.orphaned {
            clauses.push(Clause::Orphaned);
        } else if self.hides_stale() {
            clauses.push(Clause::HideStale);
        }
        if !self.include_frozen {
            clauses.push(Clause::HideFrozen);
        }
        clauses
    }
}

/// Case-insensitive author matcher for bot accounts.
#[derive(Debug, Clone)]
pub struct BotMatcher {
    patterns: Vec<Regex>,
}

impl BotMatcher {
    /// Built-in patterns plus `extra`.
    pub fn new(extra: &[String]) -> Result<Self> {
        let patterns = DEFAULT_BOT_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid bot pattern '{p}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn is_bot(&self, author: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(author))
    }
}

/// In-memory author and label filtering applied after the SQL query.
struct PostFilter {
    excluded: Vec<String>,
    bots: Option<BotMatcher>,
    label: Option<String>,
}

impl PostFilter {
    fn new(filter: &EntryFilter) -> Result<Self> {
        Ok(Self {
            excluded: filter
                .exclude_authors
                .iter()
                .map(|a| a.to_lowercase())
                .collect(),
            bots: filter
                .exclude_bots
                .then(|| BotMatcher::new(&filter.bot_patterns))
                .transpose()?,
            label: filter.label.as_deref().map(str::to_lowercase),
        })
    }

    fn keeps(&self, entry: &Entry) -> bool {
        let author = entry.author.to_lowercase();
        if self.excluded.contains(&author) {
            return false;
        }
        if self.bots.as_ref().is_some_and(|b| b.is_bot(&entry.author)) {
            return false;
        }
        self.label.as_ref().is_none_or(|label| {
            entry
                .pr_labels
                .iter()
                .any(|l| l.to_lowercase().contains(label.as_str()))
        })
    }
}

// ============================================================================
// Clause compilation
// ============================================================================

/// One predicate of the WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Id(String),
    RepoExact(String),
    RepoContains(String),
    Pr(u64),
    PrIn(Vec<u64>),
    Author(String),
    TypeIn(Vec<EntryType>),
    StateAny(Vec<DisplayState>),
    Since(DateTime<Utc>),
    Orphaned,
    HideStale,
    HideFrozen,
}

/// Unresolved review comment on a terminal PR. `thread_resolved` NULL
/// counts as resolved.
const STALE_REVIEW_COMMENT: &str = "(e.type = 'comment' AND e.subtype IS 'review_comment' \
     AND COALESCE(e.thread_resolved, 1) = 0 AND p.state IN ('closed', 'merged'))";

/// Accumulates SQL fragments and their named parameters.
#[derive(Default)]
struct QueryBuilder {
    predicates: Vec<String>,
    params: Vec<(String, Box<dyn ToSql>)>,
}

impl QueryBuilder {
    fn from_clauses(clauses: &[Clause]) -> Self {
        let mut builder = Self::default();
        for clause in clauses {
            let sql = builder.render(clause);
            builder.predicates.push(sql);
        }
        builder
    }

    /// Bind a value and return its placeholder.
    fn bind(&mut self, value: impl ToSql + 'static) -> String {
        let name = format!(":p{}", self.params.len());
        self.params.push((name.clone(), Box::new(value)));
        name
    }

    fn bind_list<T: ToSql + 'static>(&mut self, values: impl IntoIterator<Item = T>) -> String {
        values
            .into_iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[allow(clippy::cast_possible_wrap)]
    fn render(&mut self, clause: &Clause) -> String {
        match clause {
            Clause::Id(id) => format!("e.id = {}", self.bind(id.clone())),
            Clause::RepoExact(repo) => format!("e.repo = {}", self.bind(repo.clone())),
            Clause::RepoContains(part) => format!(
                "LOWER(e.repo) LIKE {} ESCAPE '\\'",
                self.bind(like_pattern(part))
            ),
            Clause::Pr(pr) => format!("e.pr = {}", self.bind(*pr as i64)),
            Clause::PrIn(prs) => {
                format!("e.pr IN ({})", self.bind_list(prs.iter().map(|&n| n as i64)))
            }
            Clause::Author(author) => {
                format!("e.author = {} COLLATE NOCASE", self.bind(author.clone()))
            }
            Clause::TypeIn(types) => format!(
                "e.type IN ({})",
                self.bind_list(types.iter().map(|t| t.as_str()))
            ),
            Clause::StateAny(states) => {
                let alternatives = states
                    .iter()
                    .map(|state| self.render_state(*state))
                    .collect::<Vec<_>>();
                format!("({})", alternatives.join(" OR "))
            }
            Clause::Since(since) => format!("e.created_at >= {}", self.bind(format_ts(since))),
            Clause::Orphaned => format!(
                "(e.type = 'comment' AND e.subtype IS '{SUBTYPE_REVIEW_COMMENT}' \
                 AND e.thread_resolved = 0 AND p.state IN ('closed', 'merged'))"
            ),
            Clause::HideStale => format!("NOT {STALE_REVIEW_COMMENT}"),
            Clause::HideFrozen => {
                "(p.frozen_at IS NULL OR e.created_at <= p.frozen_at)".to_string()
            }
        }
    }

    fn render_state(&mut self, state: DisplayState) -> String {
        let (lifecycle, draft): (PrState, Option<bool>) = state.stored_match();
        let lifecycle = self.bind(lifecycle.as_str());
        match draft {
            Some(draft) => format!("(p.state = {lifecycle} AND p.is_draft = {})", self.bind(draft)),
            None => format!("p.state = {lifecycle}"),
        }
    }

    fn where_sql(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    fn named_params(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
            .collect()
    }
}

/// Lowercased `%part%` with LIKE wildcards escaped.
fn like_pattern(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len() + 2);
    escaped.push('%');
    for c in part.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const ENTRY_SELECT: &str = "SELECT e.id, e.repo, e.pr, e.type, e.subtype, e.author, e.body,
        e.state, e.created_at, e.updated_at, e.captured_at, e.url, e.file, e.line,
        e.thread_resolved, e.reactions, e.file_activity_after, e.stack,
        p.title, p.state, p.is_draft, p.author, p.branch, p.labels
    FROM entries e
    JOIN prs p ON p.repo = e.repo AND p.number = e.pr";

const ENTRY_ORDER: &str = " ORDER BY e.created_at DESC, e.id";

// ============================================================================
// Queries
// ============================================================================

impl MirrorDb {
    /// Entries matching `filter`, newest first.
    pub fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        self.run_entry_query(filter, None)
    }

    /// Like [`MirrorDb::query_entries`], with an extra caller predicate
    /// applied in memory before offset and limit.
    pub fn query_entries_matching(
        &self,
        filter: &EntryFilter,
        predicate: impl Fn(&Entry) -> bool,
    ) -> Result<Vec<Entry>> {
        let predicate: &dyn Fn(&Entry) -> bool = &predicate;
        self.run_entry_query(filter, Some(predicate))
    }

    fn run_entry_query(
        &self,
        filter: &EntryFilter,
        predicate: Option<&dyn Fn(&Entry) -> bool>,
    ) -> Result<Vec<Entry>> {
        let mut builder = QueryBuilder::from_clauses(&filter.clauses());
        let mut sql = format!("{ENTRY_SELECT}{}{ENTRY_ORDER}", builder.where_sql());

        // Paging moves into SQL only when nothing filters in memory.
        let page_in_sql = predicate.is_none() && !filter.needs_post_filter();
        if page_in_sql && (filter.limit.is_some() || filter.offset > 0) {
            let limit = filter.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
            let offset = i64::try_from(filter.offset).unwrap_or(i64::MAX);
            let limit = builder.bind(limit);
            let offset = builder.bind(offset);
            sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare entry query")?;
        let rows = stmt
            .query_map(builder.named_params().as_slice(), entry_from_row)
            .context("Failed to execute entry query")?;

        let post = PostFilter::new(filter)?;
        let mut results = Vec::new();
        for row in rows {
            let entry = row.context("Failed to read entry row")?;
            if post.keeps(&entry) && predicate.is_none_or(|p| p(&entry)) {
                results.push(entry);
            }
        }

        if page_in_sql {
            return Ok(results);
        }
        Ok(results
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Number of entries matching `filter`, ignoring offset and limit.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn count_entries(&self, filter: &EntryFilter) -> Result<usize> {
        let unpaged = EntryFilter {
            limit: None,
            offset: 0,
            ..filter.clone()
        };
        if unpaged.needs_post_filter() {
            return Ok(self.query_entries(&unpaged)?.len());
        }

        let builder = QueryBuilder::from_clauses(&unpaged.clauses());
        let sql = format!(
            "SELECT COUNT(*) FROM entries e
             JOIN prs p ON p.repo = e.repo AND p.number = e.pr{}",
            builder.where_sql()
        );
        let count: i64 = self
            .conn
            .query_row(&sql, builder.named_params().as_slice(), |row| row.get(0))
            .context("Failed to count entries")?;
        Ok(count as usize)
    }

    /// One entry by id, regardless of freeze or staleness visibility.
    pub fn get_entry(&self, id: &str, repo: &str) -> Result<Option<Entry>> {
        let filter = EntryFilter {
            id: Some(id.to_string()),
            repo: Some(RepoFilter::Exact(repo.to_string())),
            exclude_stale: Some(false),
            include_frozen: true,
            ..EntryFilter::default()
        };
        let builder = QueryBuilder::from_clauses(&filter.clauses());
        let sql = format!("{ENTRY_SELECT}{}", builder.where_sql());
        self.conn
            .query_row(&sql, builder.named_params().as_slice(), entry_from_row)
            .optional()
            .context("Failed to query entry")
    }
}

// ============================================================================
// Row mapping
// ============================================================================

#[allow(clippy::cast_sign_loss)]
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let entry_type: String = row.get(3)?;
    let pr_state: String = row.get(19)?;
    let pr_state = pr_state
        .parse::<PrState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(19, Type::Text, e.into()))?;
    let labels: String = row.get(23)?;

    Ok(Entry {
        id: row.get(0)?,
        repo: row.get(1)?,
        pr: row.get::<_, i64>(2)? as u64,
        entry_type: entry_type
            .parse()
            .map_err(|e: anyhow::Error| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
            })?,
        subtype: row.get(4)?,
        author: row.get(5)?,
        body: row.get(6)?,
        state: row.get(7)?,
        created_at: ts_column(row, 8)?,
        updated_at: opt_ts_column(row, 9)?,
        captured_at: ts_column(row, 10)?,
        url: row.get(11)?,
        file: row.get(12)?,
        line: row.get(13)?,
        thread_resolved: row.get(14)?,
        reactions: json_column(row, 15)?,
        file_activity_after: json_column(row, 16)?,
        stack: json_column(row, 17)?,
        pr_title: row.get(18)?,
        pr_state: DisplayState::derive(pr_state, row.get(20)?),
        pr_author: row.get(21)?,
        pr_branch: row.get(22)?,
        pr_labels: serde_json::from_str(&labels).unwrap_or_default(),
    })
}

/// Annotation column; unreadable JSON reads as absent.
fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
}
