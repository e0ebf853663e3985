use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the `changed` binary
#[derive(Parser)]
#[command(name = "changed")]
#[command(about = "Run tasks only on the files that changed since their last run", long_about = None)]
pub struct Cli {
    /// Tasks file; relative paths inside it resolve against its directory
    #[arg(short = 'f', long = "file", default_value = "changed.toml", global = true)]
    pub file: PathBuf,

    /// Cache directory, overriding `[options].cache`
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Log per-file change decisions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a task target on its changed files")]
    Run {
        #[arg(help = "Task name")]
        task: String,

        #[arg(help = "Target name; every runnable target when omitted")]
        target: Option<String>,

        #[arg(long, help = "Treat a failing command as non-fatal and commit hashes anyway")]
        force: bool,

        #[arg(last = true, help = "Arguments passed to the command before the changed files")]
        args: Vec<String>,
    },

    #[command(about = "List the files the next run would process")]
    Status {
        #[arg(help = "Task name")]
        task: String,

        #[arg(help = "Target name")]
        target: String,
    },

    #[command(about = "Delete cached hashes")]
    Clean {
        #[arg(help = "Task name; everything when omitted")]
        task: Option<String>,

        #[arg(help = "Target name; the whole task when omitted")]
        target: Option<String>,
    },
}
