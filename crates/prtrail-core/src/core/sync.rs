//! Sync service: pull PR activity from a remote source into the mirror.
//!
//! Each `(repo, scope)` pair is synced either by a full cursor traversal
//! (first sync, or `full`) or by a time window that stops at the first PR
//! older than the window start. Every page is written in one transaction,
//! so an interrupted sync keeps all pages committed before the failure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MirrorConfig;
use crate::enrich::Enricher;
use crate::model::{
    DisplayState, Entry, EntryType, PrRecord, RepoId, SyncScope, SyncState,
    SUBTYPE_ISSUE_COMMENT, SUBTYPE_REVIEW_COMMENT,
};
use crate::remote::{ActivitySource, PageRequest, PrNode, PrPage};
use crate::store::MirrorDb;

use super::{parse_repo, CoreError, CoreResult};

/// Login recorded for deleted accounts.
const GHOST_AUTHOR: &str = "ghost";

/// How a sync run walked the remote listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Cursor,
    TimeWindow,
}

/// Options for one sync run.
#[derive(Default)]
pub struct SyncOptions {
    pub scope: SyncScope,
    /// Ignore the stored sync state and traverse everything.
    pub full: bool,
    /// Window start for an incremental run, replacing the stored last-sync time.
    pub since: Option<DateTime<Utc>>,
    /// Applied to every entry, in order.
    pub enrichers: Vec<Box<dyn Enricher>>,
    /// Overrides the configured page size.
    pub page_size: Option<u32>,
    /// Recorded as the sync time; defaults to now.
    pub started_at: Option<DateTime<Utc>>,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub entries_added: usize,
    pub prs_processed: u64,
    /// Final continuation token of a cursor traversal.
    pub cursor: Option<String>,
    pub mode: SyncMode,
    pub pages: u32,
    /// Closed or merged PR rows corrected by the catch-up pass.
    pub reconciled: u64,
}

/// Service for sync operations.
pub struct SyncService<'a> {
    db: &'a MirrorDb,
    config: &'a MirrorConfig,
}

impl<'a> SyncService<'a> {
    pub(crate) const fn new(db: &'a MirrorDb, config: &'a MirrorConfig) -> Self {
        Self { db, config }
    }

    /// Sync one scope of a repository from `source`.
    #[tracing::instrument(skip(self, source, options), fields(scope = %options.scope, full = options.full))]
    pub fn run(
        &self,
        source: &dyn ActivitySource,
        repo: &str,
        options: &SyncOptions,
    ) -> CoreResult<SyncReport> {
        let repo = parse_repo(repo)?;
        let page_size = options
            .page_size
            .map_or_else(|| self.config.effective_page_size(), |n| n.clamp(1, 100));
        sync_repo(self.db, source, &repo, options, page_size)
    }

    /// Per-scope sync state of a repository.
    pub fn status(&self, repo: &str) -> CoreResult<Vec<SyncState>> {
        let repo = parse_repo(repo)?;
        self.db
            .sync_states(&repo.to_string())
            .map_err(CoreError::Internal)
    }
}

/// Sync one scope of `repo` into `db`.
pub fn sync_repo(
    db: &MirrorDb,
    source: &dyn ActivitySource,
    repo: &RepoId,
    options: &SyncOptions,
    page_size: u32,
) -> CoreResult<SyncReport> {
    let started_at = options.started_at.unwrap_or_else(Utc::now);
    let repo_name = repo.to_string();
    let scope = options.scope;

    let window_start = if options.full {
        None
    } else {
        match options.since {
            Some(since) => Some(since),
            None => db
                .get_sync_state(&repo_name, scope)?
                .and_then(|state| state.last_sync),
        }
    };
    let mode = if window_start.is_some() {
        SyncMode::TimeWindow
    } else {
        SyncMode::Cursor
    };
    info!(repo = %repo, %scope, ?mode, window_start = ?window_start, "sync started");

    let mut report = SyncReport {
        entries_added: 0,
        prs_processed: 0,
        cursor: None,
        mode,
        pages: 0,
        reconciled: 0,
    };

    let mut after: Option<String> = None;
    loop {
        let request = PageRequest {
            first: page_size,
            after: after.clone(),
            states: scope.remote_states(),
        };
        let page = fetch_page(source, repo, &request)?;
        report.pages += 1;

        let total = page.prs.len();
        let (nodes, cut) = window_nodes(page.prs, window_start);
        if cut {
            warn!(
                page = report.pages,
                kept = nodes.len(),
                dropped = total - nodes.len(),
                "page cut short by sync window"
            );
        }

        let (prs, entries) = expand_page(&repo_name, &nodes, started_at);
        let entries = merge_reactions(source, entries)?;
        let entries = run_enrichers(&options.enrichers, entries);

        let added = db.write_page(&prs, &entries)?;
        report.entries_added += added;
        report.prs_processed += prs.len() as u64;
        debug!(
            page = report.pages,
            prs = prs.len(),
            entries = entries.len(),
            added,
            "page written"
        );

        let next = page.page_info.end_cursor;
        if mode == SyncMode::Cursor && next.is_some() {
            report.cursor.clone_from(&next);
        }
        if cut || !page.page_info.has_next_page {
            break;
        }
        match next {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }

    if scope == SyncScope::Open {
        if let Some(start) = window_start.filter(|_| mode == SyncMode::TimeWindow) {
            report.reconciled = reconcile_closed(db, source, repo, start, page_size)?;
        }
    }

    let persisted_cursor = match mode {
        SyncMode::Cursor => report.cursor.as_deref(),
        SyncMode::TimeWindow => None,
    };
    db.record_sync(
        &repo_name,
        scope,
        &started_at,
        persisted_cursor,
        report.prs_processed,
    )?;

    info!(
        repo = %repo,
        %scope,
        entries_added = report.entries_added,
        prs = report.prs_processed,
        pages = report.pages,
        reconciled = report.reconciled,
        "sync finished"
    );
    Ok(report)
}

/// Upsert PR rows for PRs that closed or merged inside the window, so an
/// open-scope sync corrects their state without touching the closed scope.
fn reconcile_closed(
    db: &MirrorDb,
    source: &dyn ActivitySource,
    repo: &RepoId,
    window_start: DateTime<Utc>,
    page_size: u32,
) -> CoreResult<u64> {
    let repo_name = repo.to_string();
    let mut reconciled = 0_u64;
    let mut after: Option<String> = None;

    loop {
        let request = PageRequest {
            first: page_size,
            after: after.clone(),
            states: SyncScope::Closed.remote_states(),
        };
        let page = fetch_page(source, repo, &request)?;
        let (nodes, cut) = window_nodes(page.prs, Some(window_start));

        let prs: Vec<PrRecord> = nodes.iter().map(|node| pr_record(&repo_name, node)).collect();
        db.write_page(&prs, &[])?;
        reconciled += prs.len() as u64;

        if cut || !page.page_info.has_next_page {
            break;
        }
        match page.page_info.end_cursor {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }

    if reconciled > 0 {
        info!(repo = %repo, reconciled, "reconciled closed and merged PRs");
    }
    Ok(reconciled)
}

fn fetch_page(
    source: &dyn ActivitySource,
    repo: &RepoId,
    request: &PageRequest,
) -> CoreResult<PrPage> {
    source
        .fetch_pr_activity(repo.owner(), repo.name(), request)
        .map_err(CoreError::Remote)
}

/// Keep the leading PRs updated at or after `window_start`. Returns whether
/// the page was cut.
fn window_nodes(
    mut nodes: Vec<PrNode>,
    window_start: Option<DateTime<Utc>>,
) -> (Vec<PrNode>, bool) {
    let Some(start) = window_start else {
        return (nodes, false);
    };
    match nodes.iter().position(|node| node.updated_at < start) {
        Some(idx) => {
            nodes.truncate(idx);
            (nodes, true)
        }
        None => (nodes, false),
    }
}

fn merge_reactions(source: &dyn ActivitySource, mut entries: Vec<Entry>) -> CoreResult<Vec<Entry>> {
    let ids: Vec<String> = entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Comment)
        .map(|e| e.id.clone())
        .collect();
    if ids.is_empty() {
        return Ok(entries);
    }

    let mut reactions = source
        .fetch_comment_reactions(&ids)
        .map_err(CoreError::Remote)?;
    for entry in entries
        .iter_mut()
        .filter(|e| e.entry_type == EntryType::Comment)
    {
        if let Some(summary) = reactions.remove(&entry.id) {
            entry.reactions = Some(summary);
        }
    }
    Ok(entries)
}

fn run_enrichers(enrichers: &[Box<dyn Enricher>], mut entries: Vec<Entry>) -> Vec<Entry> {
    for enricher in enrichers {
        debug!(enricher = enricher.name(), entries = entries.len(), "running enricher");
        entries = entries.into_iter().map(|e| enricher.enrich(e)).collect();
    }
    entries
}

// ============================================================================
// Node expansion
// ============================================================================

fn author_of(login: Option<&str>) -> String {
    login.unwrap_or(GHOST_AUTHOR).to_string()
}

fn non_empty(body: &str) -> Option<String> {
    (!body.is_empty()).then(|| body.to_string())
}

fn pr_record(repo: &str, node: &PrNode) -> PrRecord {
    PrRecord {
        repo: repo.to_string(),
        number: node.number,
        state: node.state,
        is_draft: node.is_draft,
        title: node.title.clone(),
        author: author_of(node.author.as_deref()),
        branch: node.head_ref_name.clone(),
        labels: node.labels.clone(),
        url: node.url.clone(),
        updated_at: node.updated_at,
        frozen_at: None,
    }
}

fn expand_page(
    repo: &str,
    nodes: &[PrNode],
    captured_at: DateTime<Utc>,
) -> (Vec<PrRecord>, Vec<Entry>) {
    let mut prs = Vec::with_capacity(nodes.len());
    let mut entries = Vec::new();
    for node in nodes {
        let pr = pr_record(repo, node);
        entries.extend(expand_pr(&pr, node, captured_at));
        prs.push(pr);
    }
    (prs, entries)
}

/// Turn one PR node into its activity entries.
fn expand_pr(pr: &PrRecord, node: &PrNode, captured_at: DateTime<Utc>) -> Vec<Entry> {
    let base = |id: &str, entry_type: EntryType, author: String, created_at: DateTime<Utc>| Entry {
        id: id.to_string(),
        repo: pr.repo.clone(),
        pr: pr.number,
        entry_type,
        subtype: None,
        author,
        body: None,
        state: None,
        created_at,
        updated_at: None,
        captured_at,
        url: None,
        file: None,
        line: None,
        thread_resolved: None,
        reactions: None,
        file_activity_after: None,
        stack: None,
        pr_title: pr.title.clone(),
        pr_state: DisplayState::derive(pr.state, pr.is_draft),
        pr_author: pr.author.clone(),
        pr_branch: pr.branch.clone(),
        pr_labels: pr.labels.clone(),
    };

    let mut entries = Vec::new();

    for review in &node.reviews {
        let state = review.state.to_ascii_lowercase();
        // An empty COMMENTED review only wraps thread comments ingested below.
        if state == "commented" && review.body.trim().is_empty() {
            continue;
        }
        let mut e = base(
            &review.id,
            EntryType::Review,
            author_of(review.author.as_deref()),
            review.submitted_at.unwrap_or(review.created_at),
        );
        e.body = non_empty(&review.body);
        e.state = Some(state);
        e.url.clone_from(&review.url);
        entries.push(e);
    }

    for comment in &node.comments {
        let mut e = base(
            &comment.id,
            EntryType::Comment,
            author_of(comment.author.as_deref()),
            comment.created_at,
        );
        e.subtype = Some(SUBTYPE_ISSUE_COMMENT.to_string());
        e.body = non_empty(&comment.body);
        e.updated_at = comment.updated_at;
        e.url.clone_from(&comment.url);
        entries.push(e);
    }

    for thread in &node.review_threads {
        for comment in &thread.comments {
            let mut e = base(
                &comment.id,
                EntryType::Comment,
                author_of(comment.author.as_deref()),
                comment.created_at,
            );
            e.subtype = Some(SUBTYPE_REVIEW_COMMENT.to_string());
            e.body = non_empty(&comment.body);
            e.updated_at = comment.updated_at;
            e.url.clone_from(&comment.url);
            e.file = thread.path.clone().or_else(|| comment.path.clone());
            e.line = thread.line.or(comment.line);
            e.thread_resolved = Some(thread.is_resolved);
            entries.push(e);
        }
    }

    for commit in &node.commits {
        let mut e = base(
            &commit.oid,
            EntryType::Commit,
            author_of(commit.author.as_deref()),
            commit.committed_at,
        );
        e.body = non_empty(&commit.message);
        e.url.clone_from(&commit.url);
        entries.push(e);
    }

    for check in &node.checks {
        // Queued checks have no time to place them at yet.
        let Some(at) = check.completed_at.or(check.started_at) else {
            continue;
        };
        let mut e = base(&check.id, EntryType::Ci, check.name.clone(), at);
        e.body = Some(check.name.clone());
        e.state = Some(
            check
                .conclusion
                .as_deref()
                .unwrap_or(&check.status)
                .to_ascii_lowercase(),
        );
        e.url.clone_from(&check.url);
        entries.push(e);
    }

    entries
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use anyhow::bail;

    use super::*;
    use crate::enrich::{FnEnricher, StackEnricher};
    use crate::model::{PrState, Reactions};
    use crate::remote::{
        CheckNode, CommentNode, CommitNode, PageInfo, ReviewNode, ReviewThreadNode,
        ThreadCommentNode,
    };
    use crate::store::test_support::{at, REPO};
    use crate::store::EntryFilter;

    /// Scripted remote: serves the configured PRs for the requested states,
    /// `per_page` at a time, and records every request.
    #[derive(Default)]
    struct FakeSource {
        prs: RefCell<Vec<PrNode>>,
        per_page: usize,
        reactions: HashMap<String, Reactions>,
        requests: RefCell<Vec<PageRequest>>,
        fail_on_page: Option<usize>,
    }

    impl FakeSource {
        fn new(prs: Vec<PrNode>) -> Self {
            Self {
                prs: RefCell::new(prs),
                per_page: 2,
                ..Self::default()
            }
        }

        fn set_prs(&self, prs: Vec<PrNode>) {
            *self.prs.borrow_mut() = prs;
        }
    }

    impl ActivitySource for FakeSource {
        fn fetch_pr_activity(&self, owner: &str, name: &str, request: &PageRequest) -> anyhow::Result<PrPage> {
            assert_eq!(format!("{owner}/{name}"), REPO);
            self.requests.borrow_mut().push(request.clone());
            let page_no = self.requests.borrow().len();
            if self.fail_on_page == Some(page_no) {
                bail!("502 Bad Gateway");
            }

            let mut matching: Vec<PrNode> = self
                .prs
                .borrow()
                .iter()
                .filter(|pr| request.states.contains(&pr.state))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

            let start: usize = request.after.as_deref().map_or(0, |c| c.parse().unwrap());
            let end = (start + self.per_page).min(matching.len());
            let prs = matching[start.min(end)..end].to_vec();
            Ok(PrPage {
                prs,
                page_info: PageInfo {
                    has_next_page: end < matching.len(),
                    end_cursor: Some(end.to_string()),
                },
            })
        }

        fn fetch_comment_reactions(&self, ids: &[String]) -> anyhow::Result<HashMap<String, Reactions>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.reactions.get(id).map(|r| (id.clone(), r.clone())))
                .collect())
        }
    }

    fn node(number: u64, state: PrState, updated: i64) -> PrNode {
        PrNode {
            number,
            title: format!("PR {number}"),
            state,
            is_draft: false,
            author: Some("alice".to_string()),
            head_ref_name: format!("feature-{number}"),
            url: None,
            updated_at: at(updated),
            labels: Vec::new(),
            reviews: Vec::new(),
            comments: vec![CommentNode {
                id: format!("IC{number}"),
                author: Some("bob".to_string()),
                body: "looks good".to_string(),
                created_at: at(updated - 1),
                updated_at: None,
                url: None,
            }],
            review_threads: Vec::new(),
            commits: Vec::new(),
            checks: Vec::new(),
        }
    }

    fn options(scope: SyncScope, started: i64) -> SyncOptions {
        SyncOptions {
            scope,
            started_at: Some(at(started)),
            ..SyncOptions::default()
        }
    }

    fn run(db: &MirrorDb, source: &FakeSource, opts: &SyncOptions) -> CoreResult<SyncReport> {
        sync_repo(db, source, &RepoId::parse(REPO).unwrap(), opts, 2)
    }

    fn all_entries(db: &MirrorDb) -> Vec<Entry> {
        db.query_entries(&EntryFilter {
            include_frozen: true,
            exclude_stale: Some(false),
            ..EntryFilter::default()
        })
        .unwrap()
    }

    #[test]
    fn test_first_sync_walks_every_page() {
        let db = MirrorDb::open_in_memory().unwrap();
        let source = FakeSource::new(vec![
            node(1, PrState::Open, 10),
            node(2, PrState::Open, 20),
            node(3, PrState::Open, 30),
        ]);

        let report = run(&db, &source, &options(SyncScope::Open, 100)).unwrap();
        assert_eq!(report.mode, SyncMode::Cursor);
        assert_eq!(report.pages, 2);
        assert_eq!(report.prs_processed, 3);
        assert_eq!(report.entries_added, 3);
        assert_eq!(report.cursor.as_deref(), Some("3"));
        assert!(source.requests.borrow().iter().all(|r| r.states == vec![PrState::Open]));

        let state = db.get_sync_state(REPO, SyncScope::Open).unwrap().unwrap();
        assert_eq!(state.last_sync, Some(at(100)));
        assert_eq!(state.cursor.as_deref(), Some("3"));
        assert_eq!(state.pr_count, 3);
    }

    #[test]
    fn test_resync_of_unchanged_snapshot_is_idempotent() {
        let db = MirrorDb::open_in_memory().unwrap();
        let source = FakeSource::new(vec![node(1, PrState::Open, 10), node(2, PrState::Open, 20)]);

        run(&db, &source, &options(SyncScope::Open, 100)).unwrap();
        let before_entries = all_entries(&db);
        let before_pr = db.get_pr(REPO, 1).unwrap();

        let full = SyncOptions {
            full: true,
            ..options(SyncScope::Open, 200)
        };
        let report = run(&db, &source, &full).unwrap();
        assert_eq!(report.entries_added, 0);
        assert_eq!(all_entries(&db), before_entries);
        assert_eq!(db.get_pr(REPO, 1).unwrap(), before_pr);
    }

    #[test]
    fn test_incremental_sync_stops_at_window() {
        let db = MirrorDb::open_in_memory().unwrap();
        let source = FakeSource::new(vec![
            node(1, PrState::Open, 10),
            node(2, PrState::Open, 20),
            node(3, PrState::Open, 30),
        ]);
        run(&db, &source, &options(SyncScope::Open, 100)).unwrap();

        source.set_prs(vec![
            node(1, PrState::Open, 10),
            node(2, PrState::Open, 20),
            node(3, PrState::Open, 30),
            node(4, PrState::Open, 150),
        ]);
        source.requests.borrow_mut().clear();

        let report = run(&db, &source, &options(SyncScope::Open, 200)).unwrap();
        assert_eq!(report.mode, SyncMode::TimeWindow);
        assert_eq!(report.prs_processed, 1);
        assert_eq!(report.entries_added, 1);
        assert_eq!(report.cursor, None);

        // One open-scope page, then one catch-up page.
        let requests = source.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.after.is_none()));

        let state = db.get_sync_state(REPO, SyncScope::Open).unwrap().unwrap();
        assert_eq!(state.last_sync, Some(at(200)));
        assert_eq!(state.cursor.as_deref(), Some("3"), "time-window runs keep the cursor");
        assert_eq!(state.pr_count, 4);
    }

    #[test]
    fn test_incremental_catch_up_marks_merged() {
        let db = MirrorDb::open_in_memory().unwrap();
        let mut draft = node(1, PrState::Open, 10);
        draft.is_draft = true;
        let source = FakeSource::new(vec![draft.clone(), node(2, PrState::Open, 20)]);
        run(&db, &source, &options(SyncScope::Open, 100)).unwrap();

        let mut merged = draft;
        merged.state = PrState::Merged;
        merged.updated_at = at(150);
        source.set_prs(vec![merged, node(2, PrState::Open, 20)]);

        let report = run(&db, &source, &options(SyncScope::Open, 200)).unwrap();
        assert_eq!(report.reconciled, 1);

        let pr = db.get_pr(REPO, 1).unwrap().unwrap();
        assert_eq!(pr.state, PrState::Merged);
        assert_eq!(pr.display_state(), DisplayState::Merged);

        let merged_entries = db
            .query_entries(&EntryFilter {
                states: vec![DisplayState::Merged],
                ..EntryFilter::default()
            })
            .unwrap();
        assert_eq!(merged_entries.len(), 1);
        assert!(db.get_sync_state(REPO, SyncScope::Closed).unwrap().is_none());
    }

    #[test]
    fn test_since_overrides_stored_window() {
        let db = MirrorDb::open_in_memory().unwrap();
        let source = FakeSource::new(vec![node(1, PrState::Open, 10), node(2, PrState::Open, 50)]);

        let opts = SyncOptions {
            since: Some(at(40)),
            ..options(SyncScope::Open, 100)
        };
        let report = run(&db, &source, &opts).unwrap();
        assert_eq!(report.mode, SyncMode::TimeWindow);
        assert_eq!(report.prs_processed, 1);
        assert!(db.get_pr(REPO, 1).unwrap().is_none());
    }

    #[test]
    fn test_closed_scope_requests_terminal_states() {
        let db = MirrorDb::open_in_memory().unwrap();
        let source = FakeSource::new(vec![
            node(1, PrState::Open, 10),
            node(2, PrState::Closed, 20),
            node(3, PrState::Merged, 30),
        ]);
        let report = run(&db, &source, &options(SyncScope::Closed, 100)).unwrap();
        assert_eq!(report.prs_processed, 2);
        assert_eq!(db.pr_numbers(REPO).unwrap(), vec![2, 3]);
        assert!(db.get_sync_state(REPO, SyncScope::Open).unwrap().is_none());
    }

    #[test]
    fn test_remote_failure_keeps_committed_pages() {
        let db = MirrorDb::open_in_memory().unwrap();
        let mut source = FakeSource::new(vec![
            node(1, PrState::Open, 10),
            node(2, PrState::Open, 20),
            node(3, PrState::Open, 30),
        ]);
        source.fail_on_page = Some(2);

        let err = run(&db, &source, &options(SyncScope::Open, 100)).unwrap_err();
        assert!(matches!(err, CoreError::Remote(_)));
        assert_eq!(db.pr_numbers(REPO).unwrap(), vec![2, 3]);
        assert!(db.get_sync_state(REPO, SyncScope::Open).unwrap().is_none());
    }

    #[test]
    fn test_reactions_and_enrichers_applied() {
        let db = MirrorDb::open_in_memory().unwrap();
        let mut source = FakeSource::new(vec![node(7, PrState::Open, 10)]);
        source.reactions.insert(
            "IC7".to_string(),
            Reactions {
                thumbs_up_by: vec!["carol".to_string()],
                total: 2,
            },
        );

        let opts = SyncOptions {
            enrichers: vec![
                Box::new(StackEnricher::new().with_stack(REPO, "s1", &[6, 7])),
                Box::new(FnEnricher::new("tag", |mut e: Entry| {
                    e.body = e.body.map(|b| format!("[{}] {b}", e.stack.as_ref().map_or(0, |s| s.position)));
                    e
                })),
            ],
            ..options(SyncScope::Open, 100)
        };
        run(&db, &source, &opts).unwrap();

        let entry = db.get_entry("IC7", REPO).unwrap().unwrap();
        assert_eq!(entry.reactions.unwrap().total, 2);
        assert_eq!(entry.stack.unwrap().parent_pr, Some(6));
        assert_eq!(entry.body.as_deref(), Some("[2] looks good"));
    }

    #[test]
    fn test_expand_pr_entry_kinds() {
        let mut n = node(5, PrState::Open, 100);
        n.reviews = vec![
            ReviewNode {
                id: "R1".to_string(),
                author: Some("bob".to_string()),
                body: String::new(),
                state: "CHANGES_REQUESTED".to_string(),
                submitted_at: Some(at(50)),
                created_at: at(49),
                url: None,
            },
            ReviewNode {
                id: "R2".to_string(),
                author: Some("bob".to_string()),
                body: String::new(),
                state: "COMMENTED".to_string(),
                submitted_at: Some(at(51)),
                created_at: at(51),
                url: None,
            },
        ];
        n.review_threads = vec![ReviewThreadNode {
            is_resolved: false,
            path: Some("src/a.ts".to_string()),
            line: Some(4),
            comments: vec![ThreadCommentNode {
                id: "RC1".to_string(),
                author: None,
                body: "why?".to_string(),
                created_at: at(52),
                updated_at: None,
                url: None,
                path: None,
                line: None,
            }],
        }];
        n.commits = vec![CommitNode {
            oid: "abc123".to_string(),
            message: "fix".to_string(),
            author: Some("alice".to_string()),
            committed_at: at(60),
            url: None,
        }];
        n.checks = vec![
            CheckNode {
                id: "CK1".to_string(),
                name: "build".to_string(),
                status: "COMPLETED".to_string(),
                conclusion: Some("FAILURE".to_string()),
                started_at: Some(at(61)),
                completed_at: Some(at(65)),
                url: None,
            },
            CheckNode {
                id: "CK2".to_string(),
                name: "lint".to_string(),
                status: "QUEUED".to_string(),
                conclusion: None,
                started_at: None,
                completed_at: None,
                url: None,
            },
        ];

        let pr = pr_record(REPO, &n);
        let entries = expand_pr(&pr, &n, at(200));
        let by_id: HashMap<&str, &Entry> = entries.iter().map(|e| (e.id.as_str(), e)).collect();

        assert_eq!(by_id["R1"].state.as_deref(), Some("changes_requested"));
        assert_eq!(by_id["R1"].created_at, at(50));
        assert!(!by_id.contains_key("R2"));

        let rc = by_id["RC1"];
        assert!(rc.is_review_comment());
        assert_eq!(rc.author, GHOST_AUTHOR);
        assert_eq!(rc.file.as_deref(), Some("src/a.ts"));
        assert_eq!(rc.line, Some(4));
        assert_eq!(rc.thread_resolved, Some(false));

        assert_eq!(by_id["IC5"].subtype.as_deref(), Some(SUBTYPE_ISSUE_COMMENT));
        assert_eq!(by_id["abc123"].entry_type, EntryType::Commit);
        assert_eq!(by_id["CK1"].state.as_deref(), Some("failure"));
        assert_eq!(by_id["CK1"].created_at, at(65));
        assert!(!by_id.contains_key("CK2"));
        assert!(entries.iter().all(|e| e.captured_at == at(200)));
    }
}
