//! Runtime configuration for the mirror.
//!
//! Every field has a default so a partial document deserializes cleanly.
//! Where the document comes from (a TOML file, flags) is the caller's concern.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding the database path.
pub const ENV_DB_PATH: &str = "PRTRAIL_DB";
/// Environment variable overriding the busy timeout, in milliseconds.
pub const ENV_BUSY_TIMEOUT_MS: &str = "PRTRAIL_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Location of the SQLite mirror.
    pub db_path: PathBuf,
    /// How long a writer waits on a lock before reporting busy.
    pub busy_timeout_ms: u64,
    /// PRs requested per remote page.
    pub page_size: u32,
    /// Extra case-insensitive author regexes treated as bots.
    pub bot_patterns: Vec<String>,
    /// Authors hidden from every entry query.
    pub exclude_authors: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".prtrail").join("mirror.db"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            page_size: DEFAULT_PAGE_SIZE,
            bot_patterns: Vec::new(),
            exclude_authors: Vec::new(),
        }
    }
}

impl MirrorConfig {
    /// Apply `PRTRAIL_DB` and `PRTRAIL_BUSY_TIMEOUT_MS` on top of `self`.
    /// Unparseable timeout values are ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS).and_then(|v| v.trim().parse().ok()) {
            self.busy_timeout_ms = ms;
        }
        self
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Page size clamped to what the remote accepts.
    #[must_use]
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}
