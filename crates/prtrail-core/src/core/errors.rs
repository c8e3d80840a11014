//! Typed error types for the prtrail-core service layer.

use thiserror::Error;

/// Result type alias for core service operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the prtrail-core service layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The PR is not in the mirror.
    #[error("PR not found: {repo}#{pr}")]
    PrNotFound { repo: String, pr: u64 },

    /// No entry with this id exists for the repository.
    #[error("Entry not found: {id} in {repo}")]
    EntryNotFound { id: String, repo: String },

    /// The repository identifier is not `owner/name`.
    #[error("Invalid repository '{repo}': expected owner/name")]
    InvalidRepo { repo: String },

    /// Two filters were combined that cannot both hold.
    #[error("Conflicting filters: {detail}")]
    ConflictingFilters { detail: String },

    /// The store was written by a newer release.
    #[error("Store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    /// The remote activity client failed. Never retried here.
    #[error("Remote fetch failed: {0:#}")]
    Remote(#[source] anyhow::Error),

    /// An internal storage or database error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// True when the underlying store reported a lock conflict that outlasted
    /// the busy timeout. Such failures are safe to retry.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let Self::Internal(err) = self else {
            return false;
        };
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<rusqlite::Error>(),
                Some(rusqlite::Error::SqliteFailure(e, _))
                    if matches!(
                        e.code,
                        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                    )
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_is_busy_detects_wrapped_sqlite_busy() {
        let sqlite = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err: anyhow::Result<()> = Err(sqlite).context("Failed to commit page");
        let core = CoreError::from(err.unwrap_err());
        assert!(core.is_busy());
    }

    #[test]
    fn test_is_busy_false_for_other_errors() {
        assert!(!CoreError::PrNotFound {
            repo: "a/b".to_string(),
            pr: 1
        }
        .is_busy());
        assert!(!CoreError::Internal(anyhow::anyhow!("disk on fire")).is_busy());
    }
}
