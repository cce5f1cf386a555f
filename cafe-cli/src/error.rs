//! Error types emitted by the café CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use cafe_data::gemini::GeminiBuildError;
use cafe_data::{LedgerOpenError, SnapshotError};
use cafe_engine::{FeedbackError, RecommenderConfigError};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors emitted by the café CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// Only one of `--lat` and `--lng` was given, or they are out of range.
    #[error("--lat and --lng must be given together as a valid coordinate")]
    InvalidLocation,
    /// The feedback action is not one the CLI records.
    #[error("unknown action {action:?}; expected yes, keep, no, unkeep, or unblock")]
    UnknownAction {
        /// Text that was given.
        action: String,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was given.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was given.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Path that was given.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A venue, review, or gazetteer snapshot failed to load.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// The scoring configuration file could not be read.
    #[error("failed to read scoring config at {path:?}: {source}")]
    ReadScoringConfig {
        /// Path that was given.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The scoring configuration file was not valid JSON.
    #[error("failed to parse scoring config at {path:?}: {source}")]
    ParseScoringConfig {
        /// Path that was given.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The merged engine configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] RecommenderConfigError),
    /// The feedback ledger could not be opened.
    #[error("failed to open ledger at {path:?}: {source}")]
    OpenLedger {
        /// Ledger path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: LedgerOpenError,
    },
    /// A Gemini client could not be built.
    #[error(transparent)]
    BuildGemini(#[from] GeminiBuildError),
    /// The async runtime could not be started.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Recording feedback failed.
    #[error(transparent)]
    Feedback(#[from] FeedbackError),
    /// Serialising the command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
