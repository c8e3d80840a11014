//! Staleness service: was a comment's file touched after the comment?
//!
//! For every comment, the commits created after it are the comparison set.
//! When the comment is anchored to a file and every commit in that set has a
//! known file list, only commits touching the file count. Otherwise all of
//! them count, since modification can't be ruled out.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Entry, EntryType, FileActivity};
use crate::store::{EntryFilter, MirrorDb};

use super::{parse_repo, CoreError, CoreResult};

/// Looks up the files a commit touched.
pub trait CommitFiles {
    /// `None` when the commit's file list is unknown.
    fn files_touched(&self, commit: &str) -> Option<Vec<String>>;
}

impl<F> CommitFiles for F
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn files_touched(&self, commit: &str) -> Option<Vec<String>> {
        self(commit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StalenessReport {
    pub comments_checked: usize,
    pub entries_updated: usize,
}

/// Service for file-activity checks.
pub struct StalenessService<'a> {
    db: &'a MirrorDb,
}

impl<'a> StalenessService<'a> {
    pub(crate) const fn new(db: &'a MirrorDb) -> Self {
        Self { db }
    }

    /// Recompute the file-activity annotation of every comment in `repo`.
    ///
    /// Each PR is evaluated completely before its changed annotations are
    /// written in one transaction.
    #[tracing::instrument(skip(self, resolver))]
    pub fn check(&self, repo: &str, resolver: Option<&dyn CommitFiles>) -> CoreResult<StalenessReport> {
        let repo = parse_repo(repo)?.to_string();
        let mut report = StalenessReport::default();
        let mut known_files: HashMap<String, Option<HashSet<String>>> = HashMap::new();

        for pr in self.db.pr_numbers(&repo).map_err(CoreError::Internal)? {
            let entries = self
                .db
                .query_entries(&EntryFilter::all_for_pr(&repo, pr))
                .map_err(CoreError::Internal)?;

            let mut commits: Vec<&Entry> = entries
                .iter()
                .filter(|e| e.entry_type == EntryType::Commit)
                .collect();
            commits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

            for commit in &commits {
                known_files.entry(commit.id.clone()).or_insert_with(|| {
                    resolver
                        .and_then(|r| r.files_touched(&commit.id))
                        .map(|files| files.into_iter().collect())
                });
            }

            let mut updates = Vec::new();
            for comment in entries.iter().filter(|e| e.entry_type == EntryType::Comment) {
                report.comments_checked += 1;
                let activity = file_activity(comment, &commits, &known_files);
                if comment.file_activity_after.as_ref() != Some(&activity) {
                    updates.push((comment.id.clone(), Some(activity)));
                }
            }

            if !updates.is_empty() {
                let changed = self
                    .db
                    .apply_file_activity(&repo, &updates)
                    .map_err(CoreError::Internal)?;
                debug!(pr, changed, "updated file activity");
                report.entries_updated += changed;
            }
        }

        info!(
            %repo,
            comments = report.comments_checked,
            updated = report.entries_updated,
            "file activity check finished"
        );
        Ok(report)
    }
}

/// File activity after `comment`, given the PR's commits in creation order.
#[allow(clippy::cast_possible_truncation)]
fn file_activity(
    comment: &Entry,
    commits: &[&Entry],
    known_files: &HashMap<String, Option<HashSet<String>>>,
) -> FileActivity {
    let later: Vec<&Entry> = commits
        .iter()
        .copied()
        .filter(|c| c.created_at > comment.created_at)
        .collect();

    let file_lists: Option<Vec<&HashSet<String>>> = later
        .iter()
        .map(|c| known_files.get(&c.id).and_then(Option::as_ref))
        .collect();

    let qualifying: Vec<&Entry> = match (comment.file.as_deref(), file_lists) {
        (Some(path), Some(lists)) => later
            .iter()
            .zip(lists)
            .filter(|(_, files)| files.contains(path))
            .map(|(c, _)| *c)
            .collect(),
        _ => later,
    };

    let latest = qualifying.last();
    FileActivity {
        modified: !qualifying.is_empty(),
        commits_touching_file: qualifying.len() as u32,
        latest_commit: latest.map(|c| c.id.clone()),
        latest_commit_at: latest.map(|c| c.created_at),
    }
}
