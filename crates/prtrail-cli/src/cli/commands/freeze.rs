//! Implementation of `prtrail freeze`, `unfreeze`, and `frozen`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use prtrail_core::core::MirrorServices;

use crate::output::{Formatter, OutputFormat};

#[derive(Serialize)]
struct FreezeOutput {
    repo: String,
    pr: u64,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    frozen_at: Option<DateTime<Utc>>,
    /// Stored entries the cutoff hides right now.
    hidden: usize,
}

/// Run the freeze command.
pub fn run_freeze(services: &MirrorServices, repo: &str, pr: u64, format: OutputFormat) -> Result<()> {
    let freeze = services.freeze();
    let cutoff = freeze.freeze(repo, pr)?;
    let output = FreezeOutput {
        repo: repo.to_string(),
        pr,
        action: "frozen",
        frozen_at: Some(cutoff),
        hidden: freeze.count_hidden(repo, pr)?,
    };
    Formatter::new(format).print(&output)
}

/// Run the unfreeze command. Reports how many entries become visible.
pub fn run_unfreeze(
    services: &MirrorServices,
    repo: &str,
    pr: u64,
    format: OutputFormat,
) -> Result<()> {
    let freeze = services.freeze();
    let hidden = freeze.count_hidden(repo, pr)?;
    freeze.unfreeze(repo, pr)?;
    let output = FreezeOutput {
        repo: repo.to_string(),
        pr,
        action: "unfrozen",
        frozen_at: None,
        hidden,
    };
    Formatter::new(format).print(&output)
}

/// Run the frozen command.
pub fn run_frozen(services: &MirrorServices, repo: Option<&str>, format: OutputFormat) -> Result<()> {
    let frozen = services.freeze().list_frozen(repo)?;
    Formatter::new(format).print_list(&frozen, "No frozen PRs.", "frozen")
}
