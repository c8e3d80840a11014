//! prtrail-core: a local, queryable mirror of pull-request activity.
//!
//! This crate owns the mirror schema and migrations, the incremental sync
//! engine, the entry query compiler, the freeze overlay, the file-activity
//! staleness detector, and the per-PR worklist aggregator.

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod enrich;
pub mod model;
pub mod remote;
pub mod store;
pub mod worklist;
