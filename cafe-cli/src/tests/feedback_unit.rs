//! Focused unit tests covering feedback configuration and recording.

use std::sync::Arc;

use crate::feedback::{FeedbackAction, FeedbackArgs, FeedbackConfig, record};
use crate::{ARG_ACTION, ARG_PLACE, CliError};
use cafe_core::FeedbackLedger;
use cafe_data::SqliteLedger;
use cafe_engine::FeedbackLoop;
use rstest::{fixture, rstest};

fn args(action: &str) -> FeedbackArgs {
    FeedbackArgs {
        user: Some("U1".to_owned()),
        action: Some(action.to_owned()),
        place: Some("p1".to_owned()),
        ..FeedbackArgs::default()
    }
}

#[fixture]
fn ledger() -> Arc<SqliteLedger> {
    Arc::new(SqliteLedger::open_in_memory().expect("in-memory ledger"))
}

fn feedback(ledger: &Arc<SqliteLedger>) -> FeedbackLoop {
    FeedbackLoop::new(ledger.clone(), ledger.clone())
}

#[rstest]
#[case("yes", FeedbackAction::Yes)]
#[case("KEEP", FeedbackAction::Keep)]
#[case(" no ", FeedbackAction::No)]
#[case("unkeep", FeedbackAction::Unkeep)]
#[case("unblock", FeedbackAction::Unblock)]
fn actions_parse_case_insensitively(#[case] text: &str, #[case] expected: FeedbackAction) {
    let config = FeedbackConfig::try_from(args(text)).expect("config should build");
    assert_eq!(config.action, expected);
}

#[rstest]
fn unknown_action_is_rejected() {
    let err = FeedbackConfig::try_from(args("maybe")).expect_err("unknown action");
    assert!(matches!(err, CliError::UnknownAction { action } if action == "maybe"));
}

#[rstest]
#[case::action(FeedbackArgs { action: None, ..args("yes") }, ARG_ACTION)]
#[case::place(FeedbackArgs { place: None, ..args("yes") }, ARG_PLACE)]
fn missing_fields_are_reported(#[case] input: FeedbackArgs, #[case] expected: &'static str) {
    let err = FeedbackConfig::try_from(input).expect_err("missing field");
    match err {
        CliError::MissingArgument { field, .. } => assert_eq!(field, expected),
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn rejection_with_blacklist_records_the_reason(ledger: Arc<SqliteLedger>) {
    let config = FeedbackConfig::try_from(FeedbackArgs {
        reason: Some("noisy".to_owned()),
        blacklist: true,
        ..args("no")
    })
    .expect("config should build");

    let report = record(&feedback(&ledger), &config).expect("record rejection");

    let follow_up = report.follow_up.expect("follow-up");
    assert_eq!(follow_up.rejected_place_id, "p1");
    assert_eq!(follow_up.negative_reason.as_deref(), Some("too noisy"));
    assert!(ledger.blacklist("U1").expect("blacklist").contains("p1"));
}

#[rstest]
fn rejection_without_blacklist_leaves_the_venue_available(ledger: Arc<SqliteLedger>) {
    let config = FeedbackConfig::try_from(args("no")).expect("config should build");

    let report = record(&feedback(&ledger), &config).expect("record rejection");

    let json = serde_json::to_value(&report).expect("serialise");
    assert_eq!(json["action"], "no");
    assert_eq!(json["follow_up"]["blacklisted"], false);
    assert!(ledger.blacklist("U1").expect("blacklist").is_empty());
}

#[rstest]
fn unblock_reverses_a_blacklist(ledger: Arc<SqliteLedger>) {
    let dialogue = feedback(&ledger);
    let blacklist = FeedbackConfig::try_from(FeedbackArgs {
        blacklist: true,
        ..args("no")
    })
    .expect("config should build");
    record(&dialogue, &blacklist).expect("blacklist");

    let unblock = FeedbackConfig::try_from(args("unblock")).expect("config should build");
    let report = record(&dialogue, &unblock).expect("unblock");

    assert!(report.follow_up.is_none());
    assert!(ledger.blacklist("U1").expect("blacklist").is_empty());
}

#[rstest]
fn keep_then_unkeep_round_trips_bookmarks(ledger: Arc<SqliteLedger>) {
    let dialogue = feedback(&ledger);
    record(&dialogue, &FeedbackConfig::try_from(args("keep")).expect("keep")).expect("keep");
    assert!(ledger.bookmarks("U1").expect("bookmarks").contains("p1"));

    record(&dialogue, &FeedbackConfig::try_from(args("unkeep")).expect("unkeep")).expect("unkeep");
    assert!(ledger.bookmarks("U1").expect("bookmarks").is_empty());
}
