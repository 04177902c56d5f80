mod cli;
mod commands;
mod errors;
mod tracing;

use crate::cli::Cli;
use crate::tracing::{TracingConfig, init_tracing};
use clap::Parser;
use retest_cache::TestResultCache;

#[allow(clippy::print_stdout)]
fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    })?;

    let settings = commands::settings_from_cli(&cli)?;
    let cache = TestResultCache::new(&settings);
    ::tracing::debug!(
        workspace = %cache.workspace_root().display(),
        snapshot = ?cache.snapshot_path(),
        "Opened test cache"
    );

    let output = commands::execute(&cache, &cli.command)?;
    cache.dispose();

    println!("{output}");
    Ok(())
}
