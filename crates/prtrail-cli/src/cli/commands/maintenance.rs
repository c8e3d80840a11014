//! Implementation of `prtrail check`, `status`, and `clear`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use prtrail_core::core::staleness::CommitFiles;
use prtrail_core::core::MirrorServices;
use prtrail_core::model::SyncState;

use crate::output::{Formatter, OutputFormat};

/// Run the check command.
///
/// With `commit_files`, file lists for the listed commits are known and
/// comments are only marked modified by commits that touched their file.
#[tracing::instrument(skip(services, format))]
pub fn run_check(
    services: &MirrorServices,
    repo: &str,
    commit_files: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let known = commit_files.map(load_commit_files).transpose()?;
    let lookup = known
        .as_ref()
        .map(|map| move |commit: &str| map.get(commit).cloned());
    let resolver = lookup.as_ref().map(|f| f as &dyn CommitFiles);

    let report = services.staleness().check(repo, resolver)?;
    Formatter::new(format).print(&report)
}

fn load_commit_files(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit file lists: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Expected a JSON object of commit -> files in {}", path.display()))
}

/// Run the status command for one repository or every mirrored one.
pub fn run_status(services: &MirrorServices, repo: Option<&str>, format: OutputFormat) -> Result<()> {
    let repos = match repo {
        Some(repo) => vec![repo.to_string()],
        None => services.entries().repos()?,
    };

    let mut states: Vec<SyncState> = Vec::new();
    for repo in &repos {
        states.extend(services.sync().status(repo)?);
    }
    Formatter::new(format).print_list(&states, "Nothing synced yet.", "sync_states")
}

#[derive(Serialize)]
struct ClearOutput {
    repo: String,
    entries_removed: usize,
}

/// Run the clear command.
pub fn run_clear(services: &MirrorServices, repo: &str, yes: bool, format: OutputFormat) -> Result<()> {
    if !yes {
        bail!("Refusing to delete all mirrored data for {repo}.\n  Re-run with --yes to confirm.");
    }
    let entries_removed = services.entries().clear_repo(repo)?;
    Formatter::new(format).print(&ClearOutput {
        repo: repo.to_string(),
        entries_removed,
    })
}
