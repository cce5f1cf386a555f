#![expect(
    clippy::expect_used,
    reason = "tests should fail fast when setup breaks"
)]
//! Behavioural coverage for the `SQLite` feedback ledger.

use std::cell::RefCell;

use cafe_core::{
    Action, FeedbackLedger, Interaction, SessionEvent, SessionState, SessionStore, UserList,
};
use cafe_data::SqliteLedger;
use camino::Utf8PathBuf;
use chrono::Utc;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

/// Ledger under test together with the directory holding its file.
pub struct TestContext {
    dir: TempDir,
    ledger: RefCell<Option<SqliteLedger>>,
}

#[fixture]
/// Build a fresh `TestContext` for each scenario run.
pub fn context() -> TestContext {
    TestContext {
        dir: TempDir::new().expect("create temp dir"),
        ledger: RefCell::new(None),
    }
}

impl TestContext {
    fn path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("ledger.sqlite"))
            .expect("temp path should be UTF-8")
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&SqliteLedger) -> T) -> T {
        let ledger = self.ledger.borrow();
        f(ledger.as_ref().expect("ledger should be open"))
    }

    fn record(&self, user: &str, action: Action, place: &str) {
        let interaction = Interaction::new(user, action, Utc::now()).with_place(place);
        self.with_ledger(|ledger| ledger.record(&interaction))
            .expect("record interaction");
    }
}

#[given("an empty ledger")]
fn empty_ledger(context: &TestContext) {
    let ledger = SqliteLedger::open(&context.path()).expect("open ledger");
    context.ledger.replace(Some(ledger));
}

#[when("user {user:word} keeps venue {place:word}")]
fn user_keeps(context: &TestContext, user: String, place: String) {
    context.record(&user, Action::Keep, &place);
}

#[when("user {user:word} rejects venue {place:word}")]
fn user_rejects(context: &TestContext, user: String, place: String) {
    context.record(&user, Action::No, &place);
}

#[when("user {user:word} skips venue {place:word} without a reason")]
fn user_skips(context: &TestContext, user: String, place: String) {
    context.record(&user, Action::NoReason, &place);
}

#[when("user {user:word} removes venue {place:word} from their bookmarks")]
fn user_unkeeps(context: &TestContext, user: String, place: String) {
    context
        .with_ledger(|ledger| ledger.remove_from_list(&user, UserList::Bookmarks, &place))
        .expect("remove bookmark");
}

#[when("user {user:word} starts rejecting venue {place:word}")]
fn user_starts_rejecting(context: &TestContext, user: String, place: String) {
    let (next, _) = SessionState::Idle
        .apply(SessionEvent::Reject { place_id: place })
        .expect("reject applies from idle");
    context
        .with_ledger(|ledger| ledger.save_session(&user, &next, Utc::now()))
        .expect("save session");
}

#[when("the ledger is reopened")]
fn reopen(context: &TestContext) {
    context.ledger.replace(None);
    let ledger = SqliteLedger::open(&context.path()).expect("reopen ledger");
    context.ledger.replace(Some(ledger));
}

#[then("venue {place:word} is in the bookmarks of user {user:word}")]
fn is_bookmarked(context: &TestContext, place: String, user: String) {
    let bookmarks = context
        .with_ledger(|ledger| ledger.bookmarks(&user))
        .expect("read bookmarks");
    assert!(bookmarks.contains(&place), "bookmarks were {bookmarks:?}");
}

#[then("the bookmarks of user {user:word} are empty")]
fn bookmarks_empty(context: &TestContext, user: String) {
    let bookmarks = context
        .with_ledger(|ledger| ledger.bookmarks(&user))
        .expect("read bookmarks");
    assert!(bookmarks.is_empty(), "bookmarks were {bookmarks:?}");
}

#[then("the history of user {user:word} has no KEEP rows")]
fn no_keep_rows(context: &TestContext, user: String) {
    let history = context
        .with_ledger(|ledger| ledger.history(&user))
        .expect("read history");
    assert!(history.iter().all(|row| row.action != Action::Keep));
}

#[then("venue {place:word} has 2 dislikes")]
fn two_dislikes(context: &TestContext, place: String) {
    let counts = context
        .with_ledger(|ledger| ledger.behavior_counts(&place))
        .expect("read counts");
    assert_eq!(counts.dislikes, 2);
}

#[then("venue {place:word} is blacklisted for user {user:word}")]
fn is_blacklisted(context: &TestContext, place: String, user: String) {
    let blacklist = context
        .with_ledger(|ledger| ledger.blacklist(&user))
        .expect("read blacklist");
    assert!(blacklist.contains(&place), "blacklist was {blacklist:?}");
}

#[then("the blacklist of user {user:word} is empty")]
fn blacklist_empty(context: &TestContext, user: String) {
    let blacklist = context
        .with_ledger(|ledger| ledger.blacklist(&user))
        .expect("read blacklist");
    assert!(blacklist.is_empty(), "blacklist was {blacklist:?}");
}

#[then("user {user:word} is still asked why they rejected venue {place:word}")]
fn still_awaiting_reason(context: &TestContext, user: String, place: String) {
    let state = context
        .with_ledger(|ledger| ledger.load_session(&user))
        .expect("load session");
    assert_eq!(state, SessionState::AwaitingRejectReason { place_id: place });
}

#[scenario(path = "tests/features/ledger.feature", index = 0)]
fn removing_a_bookmark(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/ledger.feature", index = 1)]
fn dislikes_and_blacklist(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/ledger.feature", index = 2)]
fn rejection_survives_restart(context: TestContext) {
    let _ = context;
}
