//! Feedback command implementation for the café CLI.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use cafe_core::UserList;
use cafe_data::SqliteLedger;
use cafe_engine::FeedbackLoop;
use cafe_engine::feedback::reason_from_reply;
use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ACTION, ARG_LEDGER, ARG_PLACE, ARG_USER, CliError, DEFAULT_LEDGER, ENV_FEEDBACK_ACTION,
    ENV_FEEDBACK_PLACE, ENV_FEEDBACK_USER, write_json,
};

/// CLI arguments for the `feedback` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Record how a user reacted to a recommended café. `no` \
                 runs the whole rejection dialogue at once: the optional \
                 reason is logged, the venue is blacklisted only with \
                 --blacklist, and the follow-up search parameters are \
                 printed as JSON.",
    about = "Record a reaction to a recommended café"
)]
#[ortho_config(prefix = "CAFE")]
pub(crate) struct FeedbackArgs {
    /// Path to the SQLite feedback ledger; created when missing.
    #[arg(long = ARG_LEDGER, value_name = "path")]
    #[serde(default)]
    pub(crate) ledger: Option<Utf8PathBuf>,
    /// Identifier of the reacting user.
    #[arg(long = ARG_USER, value_name = "id")]
    #[serde(default)]
    pub(crate) user: Option<String>,
    /// One of yes, keep, no, unkeep, or unblock.
    #[arg(long = ARG_ACTION, value_name = "action")]
    #[serde(default)]
    pub(crate) action: Option<String>,
    /// Venue the reaction is about.
    #[arg(long = ARG_PLACE, value_name = "id")]
    #[serde(default)]
    pub(crate) place: Option<String>,
    /// Why the venue was rejected: a preset code or free text.
    #[arg(long, value_name = "reply")]
    #[serde(default)]
    pub(crate) reason: Option<String>,
    /// Blacklist the rejected venue.
    #[arg(long)]
    #[serde(default)]
    pub(crate) blacklist: bool,
}

impl FeedbackArgs {
    pub(crate) fn into_config(self) -> Result<FeedbackConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        FeedbackConfig::try_from(merged)
    }
}

/// Reactions the CLI records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FeedbackAction {
    Yes,
    Keep,
    No,
    Unkeep,
    Unblock,
}

impl FromStr for FeedbackAction {
    type Err = CliError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "keep" => Ok(Self::Keep),
            "no" => Ok(Self::No),
            "unkeep" => Ok(Self::Unkeep),
            "unblock" => Ok(Self::Unblock),
            _ => Err(CliError::UnknownAction {
                action: text.to_owned(),
            }),
        }
    }
}

/// Resolved `feedback` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedbackConfig {
    pub(crate) ledger: Utf8PathBuf,
    pub(crate) user: String,
    pub(crate) action: FeedbackAction,
    pub(crate) place: String,
    pub(crate) reason: Option<String>,
    pub(crate) blacklist: bool,
}

impl TryFrom<FeedbackArgs> for FeedbackConfig {
    type Error = CliError;

    fn try_from(args: FeedbackArgs) -> Result<Self, Self::Error> {
        let user = args.user.ok_or(CliError::MissingArgument {
            field: ARG_USER,
            env: ENV_FEEDBACK_USER,
        })?;
        let action = args.action.ok_or(CliError::MissingArgument {
            field: ARG_ACTION,
            env: ENV_FEEDBACK_ACTION,
        })?;
        let place = args.place.ok_or(CliError::MissingArgument {
            field: ARG_PLACE,
            env: ENV_FEEDBACK_PLACE,
        })?;
        Ok(Self {
            ledger: args
                .ledger
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_LEDGER)),
            user,
            action: action.parse()?,
            place,
            reason: args.reason.as_deref().and_then(reason_from_reply),
            blacklist: args.blacklist,
        })
    }
}

/// What was recorded, printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FeedbackReport {
    pub(crate) action: FeedbackAction,
    pub(crate) place_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) follow_up: Option<FollowUpReport>,
}

/// Parameters for the search that should run after a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FollowUpReport {
    pub(crate) rejected_place_id: String,
    pub(crate) negative_reason: Option<String>,
    pub(crate) blacklisted: bool,
}

/// Apply `config` to `feedback`.
pub(crate) fn record(
    feedback: &FeedbackLoop,
    config: &FeedbackConfig,
) -> Result<FeedbackReport, CliError> {
    let (user, place) = (config.user.as_str(), config.place.as_str());
    let mut follow_up = None;
    match config.action {
        FeedbackAction::Yes => feedback.accept(user, place)?,
        FeedbackAction::Keep => feedback.keep(user, place)?,
        FeedbackAction::Unkeep => feedback.remove_from_list(user, UserList::Bookmarks, place)?,
        FeedbackAction::Unblock => feedback.remove_from_list(user, UserList::Blacklist, place)?,
        FeedbackAction::No => {
            feedback.reset(user)?;
            feedback.reject(user, place)?;
            feedback.give_reason(user, config.reason.clone())?;
            let next = feedback.confirm_blacklist(user, config.blacklist)?;
            follow_up = Some(FollowUpReport {
                rejected_place_id: next.rejected_place_id,
                negative_reason: next.negative_reason,
                blacklisted: config.blacklist,
            });
        }
    }
    Ok(FeedbackReport {
        action: config.action,
        place_id: config.place.clone(),
        follow_up,
    })
}

pub(crate) fn run_feedback(args: FeedbackArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let ledger = SqliteLedger::open(&config.ledger).map_err(|source| CliError::OpenLedger {
        path: config.ledger.clone(),
        source,
    })?;
    let shared = Arc::new(ledger);
    let feedback = FeedbackLoop::new(shared.clone(), shared);
    let report = record(&feedback, &config)?;
    write_json(writer, &report)
}
