//! Implementation of `prtrail query`, `count`, `worklist`, and `show`.

use anyhow::Result;
use serde::Serialize;

use prtrail_core::core::MirrorServices;
use prtrail_core::store::EntryFilter;

use crate::output::{Formatter, OutputFormat};

#[derive(Serialize)]
struct CountOutput {
    count: usize,
}

/// Run the query command.
#[tracing::instrument(skip(services, format))]
pub fn run_query(services: &MirrorServices, filter: &EntryFilter, format: OutputFormat) -> Result<()> {
    let entries = services.entries().query(filter)?;
    Formatter::new(format).print_list(&entries, "No matching entries.", "entries")
}

/// Run the count command.
#[tracing::instrument(skip(services, format))]
pub fn run_count(services: &MirrorServices, filter: &EntryFilter, format: OutputFormat) -> Result<()> {
    let count = services.entries().count(filter)?;
    Formatter::new(format).print(&CountOutput { count })
}

/// Run the worklist command.
#[tracing::instrument(skip(services, format))]
pub fn run_worklist(
    services: &MirrorServices,
    filter: &EntryFilter,
    format: OutputFormat,
) -> Result<()> {
    let worklist = services.entries().worklist(filter)?;
    Formatter::new(format).print_list(&worklist, "Nothing to do.", "worklist")
}

/// Run the show command.
pub fn run_show(services: &MirrorServices, id: &str, repo: &str, format: OutputFormat) -> Result<()> {
    let entry = services.entries().get(id, repo)?;
    Formatter::new(format).print(&entry)
}
