//! Pluggable per-entry enrichment run by the sync engine.
//!
//! Enrichers run in registration order over every entry of a page, after
//! reaction summaries are merged in. They must be total and side-effect
//! free: the only output is the returned entry.

use std::collections::HashMap;

use crate::model::{Entry, StackInfo};

/// Transform applied to each entry before it is written.
pub trait Enricher {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn enrich(&self, entry: Entry) -> Entry;
}

/// Enricher backed by a closure.
pub struct FnEnricher<F> {
    name: String,
    f: F,
}

impl<F> FnEnricher<F>
where
    F: Fn(Entry) -> Entry,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Enricher for FnEnricher<F>
where
    F: Fn(Entry) -> Entry,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn enrich(&self, entry: Entry) -> Entry {
        (self.f)(entry)
    }
}

/// Stamps stack metadata on entries of PRs that belong to a stack of
/// dependent PRs.
#[derive(Debug, Clone, Default)]
pub struct StackEnricher {
    by_pr: HashMap<(String, u64), StackInfo>,
}

impl StackEnricher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stack for `repo`, bottom PR first. Each PR's parent is
    /// the PR below it. A PR listed in several stacks keeps the last one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_stack(mut self, repo: &str, stack_id: &str, prs: &[u64]) -> Self {
        let size = prs.len() as u32;
        for (idx, &pr) in prs.iter().enumerate() {
            let info = StackInfo {
                stack_id: stack_id.to_string(),
                position: idx as u32 + 1,
                size,
                parent_pr: idx.checked_sub(1).map(|below| prs[below]),
            };
            self.by_pr.insert((repo.to_string(), pr), info);
        }
        self
    }
}

impl Enricher for StackEnricher {
    fn name(&self) -> &str {
        "stack"
    }

    fn enrich(&self, mut entry: Entry) -> Entry {
        if let Some(info) = self.by_pr.get(&(entry.repo.clone(), entry.pr)) {
            entry.stack = Some(info.clone());
        }
        entry
    }
}
