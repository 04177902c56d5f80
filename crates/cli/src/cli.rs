use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retest")]
#[command(about = "Inspect and maintain the cached test results of a workspace")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'w',
        long,
        global = true,
        help = "Workspace root that relative file paths resolve against",
        default_value = "."
    )]
    pub workspace: PathBuf,

    #[arg(long, global = true, help = "Settings file (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Snapshot file to use instead of the default location")]
    pub snapshot: Option<PathBuf>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Show cache statistics")]
    Stats {
        #[arg(long, help = "Print statistics as JSON")]
        json: bool,
    },
    #[command(about = "Remove every cached result")]
    Clear,
    #[command(about = "Remove cached results for one project")]
    Invalidate {
        #[arg(help = "Project name")]
        project: String,
    },
    #[command(about = "Remove expired cached results")]
    Prune,
    #[command(about = "Check whether a cached result is still valid")]
    Check {
        #[arg(help = "Project name")]
        project: String,
        #[arg(help = "Affected files (globs are ignored)", required = true)]
        files: Vec<String>,
        #[arg(long, help = "Test command", default_value = "test")]
        command: String,
        #[arg(long, help = "Test mode")]
        mode: Option<String>,
    },
}
