//! Unit tests for the café CLI.

use super::*;
use rstest::rstest;

mod feedback_unit;
mod helpers;

#[rstest]
fn recommend_flags_parse() {
    let cli = Cli::try_parse_from([
        "cafe",
        "recommend",
        "quiet study spot",
        "--venues",
        "venues.json",
        "--user",
        "U1",
        "--lat",
        "25.04",
        "--lng",
        "121.51",
        "--tag",
        "插座",
        "--tag",
        "安靜",
    ])
    .expect("arguments should parse");
    let Command::Recommend(args) = cli.command else {
        panic!("expected the recommend subcommand");
    };
    assert_eq!(args.query.as_deref(), Some("quiet study spot"));
    assert_eq!(args.tags, vec!["插座".to_owned(), "安靜".to_owned()]);
    assert_eq!(args.lat, Some(25.04));
}

#[rstest]
fn avoid_requires_a_rejected_place() {
    let err = Cli::try_parse_from(["cafe", "recommend", "--avoid", "too noisy"])
        .expect_err("--avoid alone should fail");
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

#[rstest]
fn feedback_flags_parse() {
    let cli = Cli::try_parse_from([
        "cafe", "feedback", "--user", "U1", "--action", "no", "--place", "p1", "--reason",
        "noisy", "--blacklist",
    ])
    .expect("arguments should parse");
    let Command::Feedback(args) = cli.command else {
        panic!("expected the feedback subcommand");
    };
    assert!(args.blacklist);
    assert_eq!(args.reason.as_deref(), Some("noisy"));
}
