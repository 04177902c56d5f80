//! CLI error types with miette diagnostics

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Could not load settings from {}", path.display())]
    #[diagnostic(
        code(retest::cli::settings),
        help("The settings file must be a JSON object, e.g. {{\"maxEntries\": 200}}")
    )]
    Settings {
        path: PathBuf,
        #[source]
        source: retest_cache::Error,
    },

    #[error("Failed to render output")]
    #[diagnostic(code(retest::cli::output))]
    Output {
        #[source]
        source: serde_json::Error,
    },
}
