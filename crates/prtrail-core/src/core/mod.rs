//! Service layer for prtrail-core.
//!
//! Provides typed, high-level APIs for entry queries, freeze cutoffs,
//! file-activity checks, and sync. The service layer validates inputs and
//! maps storage failures into [`CoreError`].
//!
//! # Usage
//!
//! ```no_run
//! use prtrail_core::config::MirrorConfig;
//! use prtrail_core::core::MirrorContext;
//! use prtrail_core::store::EntryFilter;
//!
//! let ctx = MirrorContext::new(MirrorConfig::default().with_env_overrides());
//! let services = ctx.services().unwrap();
//! let recent = services.entries().query(&EntryFilter::default()).unwrap();
//! ```

pub mod entries;
pub mod errors;
pub mod freeze;
pub mod staleness;
pub mod sync;

pub use errors::{CoreError, CoreResult};

use crate::config::MirrorConfig;
use crate::model::RepoId;
use crate::store::MirrorDb;

/// Context for prtrail-core services.
///
/// Holds the configuration needed to locate and tune the mirror database.
#[derive(Debug, Clone)]
pub struct MirrorContext {
    config: MirrorConfig,
}

impl MirrorContext {
    #[must_use]
    pub const fn new(config: MirrorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Open the mirror, creating or migrating it as needed.
    pub fn open(&self) -> CoreResult<MirrorDb> {
        MirrorDb::open(&self.config.db_path, &self.config)
    }

    /// Create a `MirrorServices` instance backed by this context.
    pub fn services(&self) -> CoreResult<MirrorServices> {
        let db = self.open()?;
        Ok(MirrorServices::new(db, self.config.clone()))
    }
}

/// Facade providing all prtrail service APIs over one open mirror.
pub struct MirrorServices {
    config: MirrorConfig,
    db: MirrorDb,
}

impl MirrorServices {
    #[must_use]
    pub const fn new(db: MirrorDb, config: MirrorConfig) -> Self {
        Self { config, db }
    }

    /// Access entry query operations.
    #[must_use]
    pub const fn entries(&self) -> entries::EntryService<'_> {
        entries::EntryService::new(&self.db, &self.config)
    }

    /// Access freeze operations.
    #[must_use]
    pub const fn freeze(&self) -> freeze::FreezeService<'_> {
        freeze::FreezeService::new(&self.db)
    }

    /// Access file-activity checks.
    #[must_use]
    pub const fn staleness(&self) -> staleness::StalenessService<'_> {
        staleness::StalenessService::new(&self.db)
    }

    /// Access sync operations.
    #[must_use]
    pub const fn sync(&self) -> sync::SyncService<'_> {
        sync::SyncService::new(&self.db, &self.config)
    }

    /// Get a reference to the underlying mirror database.
    ///
    /// Useful for advanced queries not covered by the service layer.
    #[must_use]
    pub const fn db(&self) -> &MirrorDb {
        &self.db
    }
}

/// Parse and validate an `owner/name` repository identifier.
pub(crate) fn parse_repo(repo: &str) -> CoreResult<RepoId> {
    RepoId::parse(repo).map_err(|_| CoreError::InvalidRepo {
        repo: repo.to_string(),
    })
}
