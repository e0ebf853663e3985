//! `changed` - run tasks only on the files that changed since their last run
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use std::env;
use std::path::{self, Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Parser as _;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use cli::{Cli, Commands};

mod cli;
mod handlers;
mod runner;
mod tasks_file;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("changed=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("changed=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

/// Make the tasks file's directory the working directory so relative paths
/// in it resolve there. Returns the absolute tasks file path.
fn enter_project(file: &Path) -> Result<PathBuf> {
    let file = path::absolute(file)
        .with_context(|| format!("Failed to resolve {}", file.display()))?;
    if let Some(dir) = file.parent() {
        env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter {}", dir.display()))?;
    }
    Ok(file)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cache = cli.cache.as_deref().map(path::absolute).transpose()?;
    let file = enter_project(&cli.file)?;

    match cli.command {
        Commands::Run {
            task,
            target,
            force,
            args,
        } => {
            handlers::handle_run(&file, cache, &task, target.as_deref(), force, &args).await?;
        }
        Commands::Status { task, target } => {
            handlers::handle_status(&file, cache, &task, &target).await?;
        }
        Commands::Clean { task, target } => {
            handlers::handle_clean(&file, cache, task.as_deref(), target.as_deref()).await?;
        }
    }

    Ok(())
}
