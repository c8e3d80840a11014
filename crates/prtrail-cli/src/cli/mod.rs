//! CLI command definitions and handlers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use prtrail_core::model::{DisplayState, EntryType};
use prtrail_core::store::{EntryFilter, RepoFilter};

use crate::output::OutputFormat;

pub mod commands;

/// Offline queries over a local mirror of pull-request activity
#[derive(Parser, Debug)]
#[command(name = "prtrail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Mirror database path (default: $PRTRAIL_DB or .prtrail/mirror.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub const fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List activity entries, newest first
    Query {
        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,

        /// Entries to skip before the first one shown
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Count matching activity entries
    Count {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Summarize matching activity per PR
    Worklist {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show one entry by id
    Show {
        /// Entry id
        id: String,

        /// Repository (owner/name)
        #[arg(long)]
        repo: String,
    },

    /// Hide activity on a PR created after now
    Freeze {
        /// Repository (owner/name)
        repo: String,
        /// PR number
        pr: u64,
    },

    /// Clear a PR's freeze cutoff
    Unfreeze {
        /// Repository (owner/name)
        repo: String,
        /// PR number
        pr: u64,
    },

    /// List frozen PRs
    Frozen {
        /// Only this repository
        #[arg(long)]
        repo: Option<String>,
    },

    /// Recompute whether commented files changed after each comment
    Check {
        /// Repository (owner/name)
        repo: String,

        /// JSON object mapping commit ids to the files they touched
        #[arg(long)]
        commit_files: Option<PathBuf>,
    },

    /// Show per-scope sync state
    Status {
        /// Only this repository (default: all mirrored repositories)
        repo: Option<String>,
    },

    /// Delete all mirrored data for a repository
    Clear {
        /// Repository (owner/name)
        repo: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Entry filters shared by query, count, and worklist.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Exact repository (owner/name)
    #[arg(long, conflicts_with = "repo_contains")]
    pub repo: Option<String>,

    /// Repository substring, case-insensitive
    #[arg(long)]
    pub repo_contains: Option<String>,

    /// PR number (repeat for several)
    #[arg(long = "pr")]
    pub prs: Vec<u64>,

    /// Entry author
    #[arg(long)]
    pub author: Option<String>,

    /// Entry type (repeat for several)
    #[arg(long = "type", value_enum)]
    pub types: Vec<EntryType>,

    /// PR state (repeat for several)
    #[arg(long = "state", value_enum)]
    pub states: Vec<DisplayState>,

    /// PR label substring, case-insensitive
    #[arg(long)]
    pub label: Option<String>,

    /// Only entries created at or after this RFC 3339 time
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Hide entries by this author (repeatable)
    #[arg(long = "exclude-author")]
    pub exclude_authors: Vec<String>,

    /// Hide entries from bot accounts
    #[arg(long)]
    pub no_bots: bool,

    /// Only unresolved review comments on closed or merged PRs
    #[arg(long)]
    pub orphaned: bool,

    /// Show unresolved review comments on closed or merged PRs
    #[arg(long)]
    pub include_stale: bool,

    /// Show entries created after a PR's freeze cutoff
    #[arg(long)]
    pub include_frozen: bool,
}

impl FilterArgs {
    /// Build the core filter. A single `--pr` becomes an exact PR match.
    #[must_use]
    pub fn to_filter(&self) -> EntryFilter {
        let repo = self
            .repo
            .clone()
            .map(RepoFilter::Exact)
            .or_else(|| self.repo_contains.clone().map(RepoFilter::Contains));
        let (pr, prs) = match self.prs.as_slice() {
            [single] => (Some(*single), Vec::new()),
            many => (None, many.to_vec()),
        };

        EntryFilter {
            repo,
            pr,
            prs,
            author: self.author.clone(),
            types: self.types.clone(),
            states: self.states.clone(),
            label: self.label.clone(),
            since: self.since,
            exclude_authors: self.exclude_authors.clone(),
            exclude_bots: self.no_bots,
            orphaned: self.orphaned,
            exclude_stale: self.include_stale.then_some(false),
            include_frozen: self.include_frozen,
            ..EntryFilter::default()
        }
    }
}
