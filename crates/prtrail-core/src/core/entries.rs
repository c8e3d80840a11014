//! Entry service: validated queries, lookups, and repository maintenance.

use tracing::info;

use crate::config::MirrorConfig;
use crate::model::Entry;
use crate::store::{EntryFilter, EntryPatch, MirrorDb};
use crate::worklist::{build_worklist, WorklistEntry};

use super::{parse_repo, CoreError, CoreResult};

/// Service for entry operations.
pub struct EntryService<'a> {
    db: &'a MirrorDb,
    config: &'a MirrorConfig,
}

impl<'a> EntryService<'a> {
    pub(crate) const fn new(db: &'a MirrorDb, config: &'a MirrorConfig) -> Self {
        Self { db, config }
    }

    /// Entries matching `filter`, newest first.
    pub fn query(&self, filter: &EntryFilter) -> CoreResult<Vec<Entry>> {
        let filter = self.effective(filter)?;
        self.db.query_entries(&filter).map_err(CoreError::Internal)
    }

    /// Entries matching `filter` and `predicate`, newest first.
    pub fn query_matching(
        &self,
        filter: &EntryFilter,
        predicate: impl Fn(&Entry) -> bool,
    ) -> CoreResult<Vec<Entry>> {
        let filter = self.effective(filter)?;
        self.db
            .query_entries_matching(&filter, predicate)
            .map_err(CoreError::Internal)
    }

    pub fn count(&self, filter: &EntryFilter) -> CoreResult<usize> {
        let filter = self.effective(filter)?;
        self.db.count_entries(&filter).map_err(CoreError::Internal)
    }

    /// One entry by id, ignoring visibility rules.
    pub fn get(&self, id: &str, repo: &str) -> CoreResult<Entry> {
        let repo = parse_repo(repo)?.to_string();
        self.db
            .get_entry(id, &repo)?
            .ok_or_else(|| CoreError::EntryNotFound {
                id: id.to_string(),
                repo,
            })
    }

    /// Apply a patch to one entry.
    pub fn update(&self, id: &str, repo: &str, patch: &EntryPatch) -> CoreResult<()> {
        let repo = parse_repo(repo)?.to_string();
        if self.db.update_entry(id, &repo, patch)? {
            Ok(())
        } else {
            Err(CoreError::EntryNotFound {
                id: id.to_string(),
                repo,
            })
        }
    }

    /// One summary per PR over the entries matching `filter`. Offset and
    /// limit page the underlying entries, not the summaries.
    pub fn worklist(&self, filter: &EntryFilter) -> CoreResult<Vec<WorklistEntry>> {
        Ok(build_worklist(&self.query(filter)?))
    }

    /// Remove all mirrored data for a repository. Returns entries removed.
    #[tracing::instrument(skip(self))]
    pub fn clear_repo(&self, repo: &str) -> CoreResult<usize> {
        let repo = parse_repo(repo)?.to_string();
        let removed = self.db.clear_repo(&repo)?;
        info!(%repo, removed, "cleared repository");
        Ok(removed)
    }

    /// Repositories present in the mirror.
    pub fn repos(&self) -> CoreResult<Vec<String>> {
        self.db.repos().map_err(CoreError::Internal)
    }

    /// Validate `filter` and fold in the configured author exclusions.
    fn effective(&self, filter: &EntryFilter) -> CoreResult<EntryFilter> {
        filter.validate()?;
        let mut filter = filter.clone();
        for author in &self.config.exclude_authors {
            if !filter.exclude_authors.contains(author) {
                filter.exclude_authors.push(author.clone());
            }
        }
        if filter.exclude_bots {
            filter
                .bot_patterns
                .extend(self.config.bot_patterns.iter().cloned());
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryType, PrState};
    use crate::store::test_support::{entry, pr, REPO};

    fn setup_db() -> MirrorDb {
        let db = MirrorDb::open_in_memory().unwrap();
        db.upsert_pr(&pr(10, PrState::Open, false)).unwrap();
        db.insert_entries(&[
            entry("c", 10, EntryType::Comment, "alice", 1),
            entry("r", 10, EntryType::Review, "bob", 2),
            entry("k", 10, EntryType::Commit, "ci-runner", 3),
        ])
        .unwrap();
        db
    }

    #[test]
    fn test_config_exclusions_apply() {
        let db = setup_db();
        let config = MirrorConfig {
            exclude_authors: vec!["alice".to_string()],
            bot_patterns: vec!["^ci-".to_string()],
            ..MirrorConfig::default()
        };
        let service = EntryService::new(&db, &config);

        let plain = service.query(&EntryFilter::default()).unwrap();
        assert_eq!(plain.len(), 2);

        let no_bots = EntryFilter {
            exclude_bots: true,
            ..EntryFilter::default()
        };
        let found = service.query(&no_bots).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "r");
        assert_eq!(service.count(&no_bots).unwrap(), 1);
    }

    #[test]
    fn test_conflicting_filter_rejected() {
        let db = setup_db();
        let config = MirrorConfig::default();
        let filter = EntryFilter {
            pr: Some(10),
            prs: vec![11],
            ..EntryFilter::default()
        };
        assert!(matches!(
            EntryService::new(&db, &config).query(&filter),
            Err(CoreError::ConflictingFilters { .. })
        ));
    }

    #[test]
    fn test_get_and_update_not_found() {
        let db = setup_db();
        let config = MirrorConfig::default();
        let service = EntryService::new(&db, &config);

        assert_eq!(service.get("c", REPO).unwrap().author, "alice");
        assert!(matches!(
            service.get("nope", REPO),
            Err(CoreError::EntryNotFound { .. })
        ));
        assert!(matches!(
            service.update("nope", REPO, &EntryPatch::default()),
            Err(CoreError::EntryNotFound { .. })
        ));
        assert!(matches!(
            service.get("c", "bad repo"),
            Err(CoreError::InvalidRepo { .. })
        ));
    }

    #[test]
    fn test_worklist_over_query() {
        let db = setup_db();
        let config = MirrorConfig::default();
        let worklist = EntryService::new(&db, &config)
            .worklist(&EntryFilter::default())
            .unwrap();
        assert_eq!(worklist.len(), 1);
        assert_eq!(worklist[0].counts.commits, 1);
        assert_eq!(worklist[0].latest_activity_type, EntryType::Commit);
    }

    #[test]
    fn test_clear_repo() {
        let db = setup_db();
        let config = MirrorConfig::default();
        let service = EntryService::new(&db, &config);
        assert_eq!(service.clear_repo(REPO).unwrap(), 3);
        assert!(service.repos().unwrap().is_empty());
    }
}
