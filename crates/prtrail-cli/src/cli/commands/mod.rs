//! Command implementations for the prtrail CLI.

mod entries;
mod freeze;
mod maintenance;

pub use entries::{run_count, run_query, run_show, run_worklist};
pub use freeze::{run_freeze, run_frozen, run_unfreeze};
pub use maintenance::{run_check, run_clear, run_status};
