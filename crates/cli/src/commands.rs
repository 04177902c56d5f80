//! Subcommand implementations
//!
//! Each command returns the text to print so it can be tested without
//! capturing stdout.

use crate::cli::{Cli, Commands};
use crate::errors::CliError;
use chrono::{DateTime, Utc};
use retest_cache::{CacheSettings, CacheStats, TestConfig, TestResultCache};

/// Build cache settings from global flags
pub fn settings_from_cli(cli: &Cli) -> Result<CacheSettings, CliError> {
    let mut settings = match &cli.config {
        Some(path) => {
            CacheSettings::from_json_file(path).map_err(|source| CliError::Settings {
                path: path.clone(),
                source,
            })?
        }
        None => CacheSettings::default(),
    };
    if cli.config.is_none() || cli.workspace.as_os_str() != "." {
        settings.workspace_root.clone_from(&cli.workspace);
    }
    if let Some(snapshot) = &cli.snapshot {
        settings.snapshot_path = Some(snapshot.clone());
    }
    Ok(settings)
}

/// Run one subcommand against an open cache
pub fn execute(cache: &TestResultCache, command: &Commands) -> Result<String, CliError> {
    let output = match command {
        Commands::Stats { json } => {
            let stats = cache.get_cache_stats();
            if *json {
                serde_json::to_string_pretty(&stats).map_err(|source| CliError::Output { source })?
            } else {
                render_stats(&stats)
            }
        }
        Commands::Clear => {
            cache.clear_cache();
            "Cache cleared".to_string()
        }
        Commands::Invalidate { project } => {
            let removed = cache.invalidate_project(project);
            format!("Removed {removed} cached result(s) for {project}")
        }
        Commands::Prune => {
            let removed = cache.prune();
            format!("Removed {removed} expired result(s)")
        }
        Commands::Check {
            project,
            files,
            command,
            mode,
        } => {
            let mut config = TestConfig::new(command.clone());
            config.mode.clone_from(mode);
            let cacheable = cache.would_be_cached(project, files, &config);
            let cached = cache.get_cached_value(project, files, &config);
            match cached {
                Some(result) => format!(
                    "hit: {project}\n{}",
                    serde_json::to_string_pretty(&result)
                        .map_err(|source| CliError::Output { source })?
                ),
                None if cacheable => format!("miss: {project} (cacheable)"),
                None => format!("miss: {project} (no fingerprintable files)"),
            }
        }
    };
    Ok(output)
}

fn render_stats(stats: &CacheStats) -> String {
    let fmt_time = |t: Option<DateTime<Utc>>| t.map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
    format!(
        "entries:  {}\nhit rate: {:.1}% ({} hits, {} misses)\nsize:     {:.3} MB\noldest:   {}\nnewest:   {}",
        stats.total_entries,
        stats.hit_rate * 100.0,
        stats.hits,
        stats.misses,
        stats.size_mb,
        fmt_time(stats.oldest_entry),
        fmt_time(stats.newest_entry),
    )
}
