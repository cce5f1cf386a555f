//! Unit coverage for the `SQLite` ledger.

use camino::Utf8PathBuf;
use chrono::TimeZone;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

#[fixture]
fn ledger() -> SqliteLedger {
    SqliteLedger::open_in_memory().expect("open in-memory ledger")
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 10, hour, 0, 0)
        .single()
        .expect("valid instant")
}

fn act(user: &str, action: Action, place: &str) -> Interaction {
    Interaction::new(user, action, at(12)).with_place(place)
}

#[rstest]
fn keep_and_no_update_their_lists(ledger: SqliteLedger) {
    ledger.record(&act("u1", Action::Keep, "a")).expect("keep");
    ledger.record(&act("u1", Action::Keep, "a")).expect("keep twice");
    ledger.record(&act("u1", Action::No, "b")).expect("no");

    assert_eq!(
        ledger.bookmarks("u1").expect("bookmarks"),
        BTreeSet::from(["a".to_owned()])
    );
    assert_eq!(
        ledger.blacklist("u1").expect("blacklist"),
        BTreeSet::from(["b".to_owned()])
    );
    assert!(ledger.blacklist("u2").expect("other user").is_empty());
}

#[rstest]
fn blacklist_includes_logged_rejections(ledger: SqliteLedger) {
    {
        let connection = ledger.lock("seed").expect("lock");
        connection
            .execute(
                "INSERT INTO interaction_logs (user_id, action, place_id, created_at)
                 VALUES ('u1', 'NO', 'legacy', 0)",
                [],
            )
            .expect("seed legacy rejection");
    }
    assert!(ledger.blacklist("u1").expect("blacklist").contains("legacy"));
}

#[rstest]
fn reason_only_rejection_does_not_blacklist(ledger: SqliteLedger) {
    ledger
        .record(&act("u1", Action::NoReason, "b").with_reason(Some("too noisy".into())))
        .expect("no with reason");
    assert!(ledger.blacklist("u1").expect("blacklist").is_empty());
    assert_eq!(ledger.behavior_counts("b").expect("counts").dislikes, 1);
}

#[rstest]
fn removing_from_a_list_deletes_matching_log_rows(ledger: SqliteLedger) {
    ledger.record(&act("u1", Action::No, "b")).expect("no");
    ledger.record(&act("u1", Action::Yes, "b")).expect("yes");

    ledger
        .remove_from_list("u1", UserList::Blacklist, "b")
        .expect("unblock");

    assert!(ledger.blacklist("u1").expect("blacklist").is_empty());
    let counts = ledger.behavior_counts("b").expect("counts");
    assert_eq!(counts.dislikes, 0);
    assert_eq!(counts.clicks, 1);
}

#[rstest]
fn behaviour_counts_aggregate_across_users(ledger: SqliteLedger) {
    for (user, action) in [
        ("u1", Action::Yes),
        ("u2", Action::Yes),
        ("u1", Action::Keep),
        ("u3", Action::No),
        ("u4", Action::NoReason),
        ("u4", Action::Search),
    ] {
        ledger.record(&act(user, action, "p")).expect("record");
    }
    assert_eq!(
        ledger.behavior_counts("p").expect("counts"),
        BehaviorCounts {
            clicks: 2,
            keeps: 1,
            dislikes: 2,
        }
    );
    let batch = ledger
        .behavior_counts_for(&["p".to_owned(), "unseen".to_owned()])
        .expect("batch counts");
    assert_eq!(batch.len(), 1);
}

#[rstest]
fn location_updates_are_last_writer_wins(ledger: SqliteLedger) {
    assert!(!ledger.is_returning_user("u1").expect("returning"));
    ledger
        .update_location("u1", Point::new(121.50, 25.04), at(9))
        .expect("first update");
    ledger
        .update_location("u1", Point::new(121.53, 25.01), at(10))
        .expect("second update");

    assert_eq!(
        ledger.last_known_location("u1").expect("location"),
        Some(Point::new(121.53, 25.01))
    );
    assert!(ledger.is_returning_user("u1").expect("returning"));
    let history = ledger.history("u1").expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|row| row.action == Action::UpdateLocation));
}

#[rstest]
fn last_shown_reports_latest_impression(ledger: SqliteLedger) {
    let places = ["a".to_owned(), "b".to_owned()];
    ledger
        .record_impressions("u1", &places, at(8))
        .expect("first impressions");
    ledger
        .record_impressions("u1", &places[..1], at(11))
        .expect("second impressions");

    let shown = ledger
        .last_shown("u1", &["a".to_owned(), "b".to_owned(), "c".to_owned()])
        .expect("last shown");
    assert_eq!(shown.get("a"), Some(&at(11)));
    assert_eq!(shown.get("b"), Some(&at(8)));
    assert!(!shown.contains_key("c"));
    assert!(ledger.last_shown("u2", &places).expect("other").is_empty());
}

#[rstest]
#[case(SessionState::Idle)]
#[case(SessionState::AwaitingRejectReason { place_id: "b".into() })]
#[case(SessionState::AwaitingBlacklistConfirm { place_id: "b".into(), reason: Some("too noisy".into()) })]
fn sessions_round_trip(ledger: SqliteLedger, #[case] state: SessionState) {
    ledger.save_session("u1", &state, at(12)).expect("save");
    assert_eq!(ledger.load_session("u1").expect("load"), state);
}

#[rstest]
fn missing_session_is_idle(ledger: SqliteLedger) {
    assert_eq!(ledger.load_session("nobody").expect("load"), SessionState::Idle);
}

#[rstest]
fn corrupt_session_label_is_reported(ledger: SqliteLedger) {
    {
        let connection = ledger.lock("seed").expect("lock");
        connection
            .execute(
                "INSERT INTO conversation_sessions (user_id, state, updated_at)
                 VALUES ('u1', 'LIMBO', 0)",
                [],
            )
            .expect("seed corrupt session");
    }
    assert!(matches!(
        ledger.load_session("u1"),
        Err(LedgerError::Session(_))
    ));
}

#[rstest]
fn file_ledger_survives_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("ledger.db")).expect("utf8 path");
    {
        let ledger = SqliteLedger::open(&path).expect("open");
        ledger
            .save_session(
                "u1",
                &SessionState::AwaitingRejectReason {
                    place_id: "b".into(),
                },
                at(12),
            )
            .expect("save");
    }
    let reopened = SqliteLedger::open(&path).expect("reopen");
    assert_eq!(
        reopened.load_session("u1").expect("load").place_id(),
        Some("b")
    );
}
