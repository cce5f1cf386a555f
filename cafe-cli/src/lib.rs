//! Command-line interface for the café recommendation engine.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod error;
mod feedback;
mod recommend;

pub use error::CliError;

use feedback::FeedbackArgs;
use recommend::RecommendArgs;

pub(crate) const ARG_VENUES: &str = "venues";
pub(crate) const ARG_REVIEWS: &str = "reviews";
pub(crate) const ARG_GAZETTEER: &str = "gazetteer";
pub(crate) const ARG_LEDGER: &str = "ledger";
pub(crate) const ARG_USER: &str = "user";
pub(crate) const ARG_PLACE: &str = "place";
pub(crate) const ARG_ACTION: &str = "action";
pub(crate) const ARG_SCORING_CONFIG: &str = "scoring-config";
pub(crate) const ENV_RECOMMEND_VENUES: &str = "CAFE_CMDS_RECOMMEND_VENUES";
pub(crate) const ENV_RECOMMEND_USER: &str = "CAFE_CMDS_RECOMMEND_USER";
pub(crate) const ENV_FEEDBACK_USER: &str = "CAFE_CMDS_FEEDBACK_USER";
pub(crate) const ENV_FEEDBACK_PLACE: &str = "CAFE_CMDS_FEEDBACK_PLACE";
pub(crate) const ENV_FEEDBACK_ACTION: &str = "CAFE_CMDS_FEEDBACK_ACTION";
pub(crate) const DEFAULT_LEDGER: &str = "cafe.db";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when arguments are invalid, inputs cannot be
/// loaded, or the result cannot be written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Recommend(args) => recommend::run_recommend(args, &mut stdout),
        Command::Feedback(args) => feedback::run_feedback(args, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "cafe",
    about = "Recommend cafés near a place and record how users react",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recommend cafés for one request.
    Recommend(RecommendArgs),
    /// Record a reaction to a recommended café.
    Feedback(FeedbackArgs),
}

/// Write `value` as pretty JSON followed by a newline.
pub(crate) fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
