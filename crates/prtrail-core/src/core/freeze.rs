//! Freeze service: per-PR cutoffs that hide later activity by default.
//!
//! Freezing never pauses sync. Entries after the cutoff are still stored;
//! entry queries simply leave them out unless `include_frozen` is set.

use chrono::{DateTime, SubsecRound, Utc};
use tracing::info;

use crate::store::{FrozenPr, MirrorDb};

use super::{parse_repo, CoreError, CoreResult};

/// Service for freeze operations.
pub struct FreezeService<'a> {
    db: &'a MirrorDb,
}

impl<'a> FreezeService<'a> {
    pub(crate) const fn new(db: &'a MirrorDb) -> Self {
        Self { db }
    }

    /// Freeze a PR at the current time. Returns the cutoff.
    pub fn freeze(&self, repo: &str, pr: u64) -> CoreResult<DateTime<Utc>> {
        self.freeze_at(repo, pr, Utc::now())
    }

    /// Freeze a PR at an explicit time, replacing any earlier cutoff.
    ///
    /// The cutoff is stored at millisecond precision; the returned value is
    /// the stored one.
    #[tracing::instrument(skip(self))]
    pub fn freeze_at(&self, repo: &str, pr: u64, at: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        let repo = parse_repo(repo)?.to_string();
        let at = at.trunc_subsecs(3);
        if !self.db.set_frozen_at(&repo, pr, Some(&at))? {
            return Err(CoreError::PrNotFound { repo, pr });
        }
        info!(%repo, pr, cutoff = %at, "froze PR");
        Ok(at)
    }

    /// Clear a PR's cutoff. Unfreezing a PR that isn't frozen is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn unfreeze(&self, repo: &str, pr: u64) -> CoreResult<()> {
        let repo = parse_repo(repo)?.to_string();
        if !self.db.set_frozen_at(&repo, pr, None)? {
            return Err(CoreError::PrNotFound { repo, pr });
        }
        info!(%repo, pr, "unfroze PR");
        Ok(())
    }

    pub fn is_frozen(&self, repo: &str, pr: u64) -> CoreResult<bool> {
        Ok(self.cutoff(repo, pr)?.is_some())
    }

    /// The PR's cutoff, if frozen.
    pub fn cutoff(&self, repo: &str, pr: u64) -> CoreResult<Option<DateTime<Utc>>> {
        let repo = parse_repo(repo)?.to_string();
        match self.db.get_pr(&repo, pr)? {
            Some(record) => Ok(record.frozen_at),
            None => Err(CoreError::PrNotFound { repo, pr }),
        }
    }

    /// Frozen PRs, newest cutoff first.
    pub fn list_frozen(&self, repo: Option<&str>) -> CoreResult<Vec<FrozenPr>> {
        let repo = repo.map(parse_repo).transpose()?.map(|r| r.to_string());
        self.db
            .frozen_prs(repo.as_deref())
            .map_err(CoreError::Internal)
    }

    /// How many stored entries the cutoff currently hides. Zero when the PR
    /// isn't frozen.
    pub fn count_hidden(&self, repo: &str, pr: u64) -> CoreResult<usize> {
        let repo = parse_repo(repo)?.to_string();
        let Some(cutoff) = self.cutoff(&repo, pr)? else {
            return Ok(0);
        };
        self.db
            .count_entries_after(&repo, pr, &cutoff)
            .map_err(CoreError::Internal)
    }
}
