//! Per-PR rollup of an entry list.
//!
//! [`build_worklist`] is a pure reducer over whatever an entry query
//! returned; it never touches the store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{DisplayState, Entry, EntryType, StackInfo};

/// Entry counts by type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntryCounts {
    pub comments: u64,
    pub reviews: u64,
    pub commits: u64,
    pub ci: u64,
    pub events: u64,
}

impl EntryCounts {
    fn bump(&mut self, entry_type: EntryType) {
        match entry_type {
            EntryType::Comment => self.comments += 1,
            EntryType::Review => self.reviews += 1,
            EntryType::Commit => self.commits += 1,
            EntryType::Ci => self.ci += 1,
            EntryType::Event => self.events += 1,
        }
    }
}

/// Summary of all matching activity on one PR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorklistEntry {
    pub repo: String,
    pub pr: u64,
    pub pr_title: String,
    pub pr_state: DisplayState,
    pub pr_author: String,
    pub pr_branch: String,
    pub pr_labels: Vec<String>,
    pub latest_activity_at: DateTime<Utc>,
    pub latest_activity_type: EntryType,
    pub latest_activity_author: String,
    pub counts: EntryCounts,
    /// Review count per review state, e.g. `approved`.
    pub review_states: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackInfo>,
}

impl WorklistEntry {
    fn start(entry: &Entry) -> Self {
        Self {
            repo: entry.repo.clone(),
            pr: entry.pr,
            pr_title: entry.pr_title.clone(),
            pr_state: entry.pr_state,
            pr_author: entry.pr_author.clone(),
            pr_branch: entry.pr_branch.clone(),
            pr_labels: entry.pr_labels.clone(),
            latest_activity_at: entry.activity_at(),
            latest_activity_type: entry.entry_type,
            latest_activity_author: entry.author.clone(),
            counts: EntryCounts::default(),
            review_states: BTreeMap::new(),
            stack: None,
        }
    }

    fn absorb(&mut self, entry: &Entry) {
        self.counts.bump(entry.entry_type);
        if entry.entry_type == EntryType::Review {
            if let Some(state) = &entry.state {
                *self.review_states.entry(state.clone()).or_default() += 1;
            }
        }
        if entry.activity_at() > self.latest_activity_at {
            self.latest_activity_at = entry.activity_at();
            self.latest_activity_type = entry.entry_type;
            self.latest_activity_author.clone_from(&entry.author);
        }
        if self.stack.is_none() {
            self.stack.clone_from(&entry.stack);
        }
    }
}

/// Reduce entries to one summary per `(repo, pr)`.
///
/// Stacked PRs come first, grouped by stack and ordered by position within
/// a group. Groups are ordered by their most recent member. PRs outside any
/// stack follow, most recent first.
#[must_use]
pub fn build_worklist(entries: &[Entry]) -> Vec<WorklistEntry> {
    let mut index: HashMap<(&str, u64), usize> = HashMap::new();
    let mut items: Vec<WorklistEntry> = Vec::new();

    for entry in entries {
        let slot = *index
            .entry((entry.repo.as_str(), entry.pr))
            .or_insert_with(|| {
                items.push(WorklistEntry::start(entry));
                items.len() - 1
            });
        items[slot].absorb(entry);
    }

    let mut group_latest: HashMap<GroupKey, DateTime<Utc>> = HashMap::new();
    for item in &items {
        if let Some(stack) = &item.stack {
            let latest = group_latest
                .entry((item.repo.clone(), stack.stack_id.clone()))
                .or_insert(item.latest_activity_at);
            *latest = (*latest).max(item.latest_activity_at);
        }
    }

    items.sort_by(|a, b| compare_items(a, b, &group_latest));
    items
}

/// Stack ids are only unique within a repository.
type GroupKey = (String, String);

fn compare_items(
    a: &WorklistEntry,
    b: &WorklistEntry,
    group_latest: &HashMap<GroupKey, DateTime<Utc>>,
) -> Ordering {
    let by_recency = b.latest_activity_at.cmp(&a.latest_activity_at);
    match (&a.stack, &b.stack) {
        (Some(sa), Some(sb)) if a.repo == b.repo && sa.stack_id == sb.stack_id => {
            sa.position.cmp(&sb.position).then(by_recency)
        }
        (Some(sa), Some(sb)) => {
            let key_a = (a.repo.clone(), sa.stack_id.clone());
            let key_b = (b.repo.clone(), sb.stack_id.clone());
            group_latest
                .get(&key_b)
                .cmp(&group_latest.get(&key_a))
                .then_with(|| key_a.cmp(&key_b))
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => by_recency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{at, entry, REPO};

    fn stacked(mut e: Entry, stack_id: &str, position: u32) -> Entry {
        e.stack = Some(StackInfo {
            stack_id: stack_id.to_string(),
            position,
            size: 3,
            parent_pr: None,
        });
        e
    }

    #[test]
    fn test_single_pr_rollup() {
        let mut review = entry("r", 10, EntryType::Review, "bob", 2);
        review.state = Some("approved".to_string());
        let entries = vec![
            entry("k", 10, EntryType::Commit, "alice", 3),
            review,
            entry("c", 10, EntryType::Comment, "alice", 1),
        ];

        let worklist = build_worklist(&entries);
        assert_eq!(worklist.len(), 1);
        let item = &worklist[0];
        assert_eq!(item.pr, 10);
        assert_eq!(
            item.counts,
            EntryCounts {
                comments: 1,
                reviews: 1,
                commits: 1,
                ..EntryCounts::default()
            }
        );
        assert_eq!(item.review_states.get("approved"), Some(&1));
        assert_eq!(item.latest_activity_type, EntryType::Commit);
        assert_eq!(item.latest_activity_author, "alice");
        assert_eq!(item.latest_activity_at, at(3));
    }

    #[test]
    fn test_updated_time_counts_as_activity() {
        let mut edited = entry("old", 1, EntryType::Comment, "carol", 1);
        edited.updated_at = Some(at(50));
        let entries = vec![entry("new", 1, EntryType::Review, "bob", 10), edited];

        let item = &build_worklist(&entries)[0];
        assert_eq!(item.latest_activity_author, "carol");
        assert_eq!(item.latest_activity_at, at(50));
    }

    #[test]
    fn test_stack_groups_sort_before_loose_prs() {
        let entries = vec![
            entry("loose-new", 1, EntryType::Comment, "bob", 100),
            stacked(entry("a2", 2, EntryType::Comment, "bob", 5), "a", 2),
            stacked(entry("a1", 3, EntryType::Comment, "bob", 4), "a", 1),
            stacked(entry("b1", 4, EntryType::Comment, "bob", 50), "b", 1),
            entry("loose-old", 5, EntryType::Comment, "bob", 1),
        ];

        let order: Vec<u64> = build_worklist(&entries).iter().map(|w| w.pr).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 5]);
    }

    #[test]
    fn test_same_number_in_different_repos_stays_separate() {
        let mut other = entry("x", 1, EntryType::Comment, "bob", 1);
        other.repo = "acme/other".to_string();
        let entries = vec![entry("y", 1, EntryType::Comment, "bob", 2), other];

        let worklist = build_worklist(&entries);
        assert_eq!(worklist.len(), 2);
        assert_eq!(worklist[0].repo, REPO);
    }

    #[test]
    fn test_same_stack_position_ordered_by_recency() {
        let entries = vec![
            stacked(entry("older", 2, EntryType::Comment, "bob", 5), "a", 1),
            stacked(entry("newer", 3, EntryType::Comment, "bob", 9), "a", 1),
            stacked(entry("top", 4, EntryType::Comment, "bob", 20), "a", 2),
        ];

        let order: Vec<u64> = build_worklist(&entries).iter().map(|w| w.pr).collect();
        assert_eq!(order, vec![3, 2, 4]);
    }

    #[test]
    fn test_stack_ids_scoped_to_repo() {
        let mut other_bottom = stacked(entry("o1", 7, EntryType::Comment, "bob", 30), "s", 1);
        other_bottom.repo = "acme/other".to_string();
        let entries = vec![
            stacked(entry("h2", 2, EntryType::Comment, "bob", 40), "s", 2),
            other_bottom,
            stacked(entry("h1", 1, EntryType::Comment, "bob", 10), "s", 1),
        ];

        let worklist = build_worklist(&entries);
        let order: Vec<(&str, u64)> = worklist.iter().map(|w| (w.repo.as_str(), w.pr)).collect();
        assert_eq!(
            order,
            vec![(REPO, 1), (REPO, 2), ("acme/other", 7)]
        );
    }
}
