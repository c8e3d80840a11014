//! prtrail - offline queries over a local mirror of pull-request activity

mod cli;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use prtrail_core::config::MirrorConfig;
use prtrail_core::core::MirrorContext;

use cli::commands::{
    run_check, run_clear, run_count, run_freeze, run_frozen, run_query, run_show, run_status,
    run_unfreeze, run_worklist,
};
use cli::{Cli, Commands};

/// Environment variable holding the log filter directive.
const ENV_LOG: &str = "PRTRAIL_LOG";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = MirrorConfig::default().with_env_overrides();
    if let Some(db) = &cli.db {
        config.db_path.clone_from(db);
    }
    let services = MirrorContext::new(config).services()?;
    let format = cli.output_format();

    match cli.command {
        Commands::Query {
            filter,
            limit,
            offset,
        } => {
            let mut filter = filter.to_filter();
            filter.limit = limit;
            filter.offset = offset;
            run_query(&services, &filter, format)?;
        }

        Commands::Count { filter } => {
            run_count(&services, &filter.to_filter(), format)?;
        }

        Commands::Worklist { filter } => {
            run_worklist(&services, &filter.to_filter(), format)?;
        }

        Commands::Show { id, repo } => {
            run_show(&services, &id, &repo, format)?;
        }

        Commands::Freeze { repo, pr } => {
            run_freeze(&services, &repo, pr, format)?;
        }

        Commands::Unfreeze { repo, pr } => {
            run_unfreeze(&services, &repo, pr, format)?;
        }

        Commands::Frozen { repo } => {
            run_frozen(&services, repo.as_deref(), format)?;
        }

        Commands::Check { repo, commit_files } => {
            run_check(&services, &repo, commit_files.as_deref(), format)?;
        }

        Commands::Status { repo } => {
            run_status(&services, repo.as_deref(), format)?;
        }

        Commands::Clear { repo, yes } => {
            run_clear(&services, &repo, yes, format)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| default_level.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
