//! Behavioural coverage for end-to-end recommendations.
#![expect(
    clippy::expect_used,
    reason = "tests should fail fast when setup breaks"
)]
#![expect(
    clippy::float_arithmetic,
    reason = "fixtures place venues by offsetting coordinates"
)]

use std::cell::RefCell;
use std::sync::Arc;

use cafe_core::store::MemoryVenueStore;
use cafe_core::test_support::{MemoryLedger, StubClassifier, StubEmbedder, unit_vector};
use cafe_core::{
    Action, FeedbackLedger, FixedClock, Gazetteer, GazetteerEntry, Intent, Interaction,
    MatchType, OpeningHours, Period, PlaceKind, TimeFilter, Venue,
};
use cafe_engine::feedback::reason_from_reply;
use cafe_engine::{
    FeedbackLoop, FollowUp, Outcome, RecommendRequest, Recommendation, Recommender, Response,
};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use geo::Point;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const XIMEN: (f64, f64) = (121.5081, 25.0421);
const MAIN_STATION: (f64, f64) = (121.5170, 25.0478);
const METRES_PER_DEGREE_LNG: f64 = 100_900.0;

/// Collaborators and results shared by the steps of one scenario.
pub struct TestContext {
    now: RefCell<Option<DateTime<FixedOffset>>>,
    venues: RefCell<Vec<Venue>>,
    ledger: Arc<MemoryLedger>,
    classifier: RefCell<Option<StubClassifier>>,
    embedder: RefCell<Option<Arc<StubEmbedder>>>,
    follow_up: RefCell<Option<FollowUp>>,
    response: RefCell<Option<Response>>,
}

#[fixture]
/// Build a fresh `TestContext` for each scenario run.
pub fn context() -> TestContext {
    TestContext {
        now: RefCell::new(None),
        venues: RefCell::new(Vec::new()),
        ledger: Arc::new(MemoryLedger::default()),
        classifier: RefCell::new(None),
        embedder: RefCell::new(None),
        follow_up: RefCell::new(None),
        response: RefCell::new(None),
    }
}

fn ximen() -> Point<f64> {
    Point::new(XIMEN.0, XIMEN.1)
}

fn east_of_ximen(metres: f64) -> Point<f64> {
    Point::new(XIMEN.0 + metres / METRES_PER_DEGREE_LNG, XIMEN.1)
}

fn all_night(id: &str, name: &str, metres: f64) -> Venue {
    Venue::new(id, name, east_of_ximen(metres))
        .expect("valid venue")
        .with_opening_hours(OpeningHours::always_open())
}

fn gazetteer() -> Gazetteer {
    Gazetteer::new(vec![
        GazetteerEntry::new("Ximen", ximen(), PlaceKind::Station),
        GazetteerEntry::new(
            "Taipei Main Station",
            Point::new(MAIN_STATION.0, MAIN_STATION.1),
            PlaceKind::Station,
        ),
    ])
}

impl TestContext {
    fn clock(&self) -> FixedClock {
        FixedClock(self.now.borrow().expect("scenario sets the time"))
    }

    fn add(&self, venue: Venue) {
        self.venues.borrow_mut().push(venue);
    }

    fn recommender(&self) -> Recommender {
        let store = MemoryVenueStore::with_venues(self.venues.borrow().clone());
        let mut recommender =
            Recommender::new(Arc::new(store), self.ledger.clone(), Arc::new(gazetteer()))
                .with_clock(Arc::new(self.clock()));
        if let Some(classifier) = self.classifier.borrow().clone() {
            recommender = recommender.with_classifier(Arc::new(classifier));
        }
        if let Some(embedder) = self.embedder.borrow().clone() {
            recommender = recommender.with_embedder(embedder);
        }
        recommender
    }

    fn run(&self, request: &RecommendRequest) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        let response = runtime.block_on(self.recommender().respond(request));
        self.response.replace(Some(response));
    }

    fn recommendation(&self) -> Recommendation {
        match self.response.borrow().clone().expect("a request was made") {
            Response::Ready(recommendation) => recommendation,
            Response::TryAgain { message } => panic!("request failed: {message}"),
        }
    }

    fn recommended_names(&self) -> Vec<String> {
        self.recommendation()
            .records()
            .iter()
            .map(|record| record.display_name.clone())
            .collect()
    }

    fn recommended_ids(&self) -> Vec<String> {
        self.recommendation()
            .records()
            .iter()
            .map(|record| record.place_id.clone())
            .collect()
    }
}

#[given("it is Saturday 23:30 in Taipei")]
fn saturday_night(context: &TestContext) {
    let now = FixedOffset::east_opt(8 * 3600)
        .and_then(|offset| offset.with_ymd_and_hms(2026, 1, 10, 23, 30, 0).single())
        .expect("valid instant");
    context.now.replace(Some(now));
}

#[given("a 24-hour venue Moonlight 800 metres from Ximen")]
fn moonlight(context: &TestContext) {
    context.add(all_night("moonlight", "Moonlight", 800.0).with_ratings(4.4, 230));
}

#[given("a venue Early Bird 500 metres from Ximen that closes at 22:00")]
fn early_bird(context: &TestContext) {
    let hours = OpeningHours::new(
        (0..7)
            .map(|day| Period::daytime(day, 8 * 60, 22 * 60).expect("valid period"))
            .collect(),
    );
    context.add(
        Venue::new("early-bird", "Early Bird", east_of_ximen(500.0))
            .expect("valid venue")
            .with_ratings(4.8, 900)
            .with_opening_hours(hours),
    );
}

#[given("the classifier reads the request as open now")]
fn open_now_intent(context: &TestContext) {
    let intent = Intent {
        time_filter: TimeFilter {
            filter_open_now: true,
            target: None,
        },
        extracted_keywords: vec!["insomnia".to_owned()],
        tags: Vec::new(),
    };
    context
        .classifier
        .replace(Some(StubClassifier::with_intent(intent)));
}

#[given("three 24-hour venues near Ximen where place_A is closest and best rated")]
fn three_venues(context: &TestContext) {
    context.add(all_night("place_A", "Alpha", 100.0).with_ratings(4.9, 800));
    context.add(all_night("place_C", "Gamma", 600.0).with_ratings(4.0, 100));
    context.add(all_night("place_D", "Delta", 900.0).with_ratings(4.1, 120));
}

#[given("the user has blacklisted place_A")]
fn blacklisted(context: &TestContext) {
    let interaction = Interaction::new("U1", Action::No, Utc::now()).with_place("place_A");
    context
        .ledger
        .record(&interaction)
        .expect("record rejection");
}

#[given("a quiet venue and a lively venue near Ximen with embeddings")]
fn quiet_and_lively(context: &TestContext) {
    let quiet = all_night("place_quiet", "Still Water", 400.0)
        .with_ratings(4.5, 300)
        .with_embedding(unit_vector(0))
        .expect("embedding");
    let lively = all_night("place_lively", "Party Hall", 400.0)
        .with_ratings(4.5, 300)
        .with_tags(["熱鬧"])
        .with_embedding(unit_vector(1))
        .expect("embedding");
    let rejected = all_night("place_B", "Loud House", 300.0)
        .with_ratings(4.5, 300)
        .with_embedding(unit_vector(0))
        .expect("embedding");
    context.add(quiet);
    context.add(lively);
    context.add(rejected);
}

#[given("the embedder understands the phrase too noisy")]
fn noisy_embedder(context: &TestContext) {
    let embedder = StubEmbedder::default().with_rule("too noisy", unit_vector(0));
    context.embedder.replace(Some(Arc::new(embedder)));
}

#[given("the user rejected place_B as too noisy without blacklisting it")]
fn rejected_place_b(context: &TestContext) {
    let feedback = FeedbackLoop::new(context.ledger.clone(), context.ledger.clone())
        .with_clock(Arc::new(context.clock()));
    feedback.reject("U2", "place_B").expect("reject");
    feedback
        .give_reason("U2", reason_from_reply("noisy"))
        .expect("give reason");
    let follow_up = feedback.confirm_blacklist("U2", false).expect("decline");
    context.follow_up.replace(Some(follow_up));
}

#[given("ten 24-hour venues within 3000 metres of Ximen")]
fn ten_venues(context: &TestContext) {
    for step in 1..=10_u32 {
        let metres = f64::from(step) * 250.0;
        context.add(
            all_night(&format!("near-{step}"), &format!("Corner {step}"), metres)
                .with_ratings(4.6, 400),
        );
    }
}

#[given("a 24-hour venue Fong Da Coffee 15 kilometres from Ximen")]
fn fong_da(context: &TestContext) {
    context.add(all_night("fong-da", "Fong Da Coffee", 15_000.0).with_ratings(4.2, 1500));
}

#[when("a user asks for an insomnia-friendly café near Ximen open right now")]
fn late_night_request(context: &TestContext) {
    let request = RecommendRequest::new("U9")
        .with_location(Point::new(MAIN_STATION.0, MAIN_STATION.1))
        .with_query("insomnia-friendly café near Ximen open right now");
    context.run(&request);
}

#[when("the user searches near Ximen without a query")]
fn plain_search(context: &TestContext) {
    context.run(&RecommendRequest::new("U1").with_location(ximen()));
}

#[when("the user follows up asking for a quiet study café near Ximen")]
fn follow_up_search(context: &TestContext) {
    let follow_up = context.follow_up.borrow().clone().expect("a rejection");
    let request = RecommendRequest::new("U2")
        .with_location(ximen())
        .with_query("quiet study café near Ximen")
        .with_follow_up(follow_up);
    context.run(&request);
}

#[when("the user asks for Fong Da Coffee near Ximen")]
fn name_search(context: &TestContext) {
    let request = RecommendRequest::new("U3")
        .with_location(ximen())
        .with_query("Fong Da Coffee");
    context.run(&request);
}

#[when("the user asks for coffee near Ximen")]
fn generic_word_search(context: &TestContext) {
    let request = RecommendRequest::new("U4")
        .with_location(ximen())
        .with_query("coffee near Ximen");
    context.run(&request);
}

#[then("Moonlight is recommended")]
fn moonlight_recommended(context: &TestContext) {
    let names = context.recommended_names();
    assert!(names.contains(&"Moonlight".to_owned()), "got {names:?}");
    let center = context.recommendation().center;
    assert!((center.lng - XIMEN.0).abs() < 1e-9, "searched around {center:?}");
}

#[then("Early Bird is not recommended")]
fn early_bird_excluded(context: &TestContext) {
    let names = context.recommended_names();
    assert!(!names.contains(&"Early Bird".to_owned()), "got {names:?}");
}

#[then("Fong Da Coffee is not recommended")]
fn fong_da_excluded(context: &TestContext) {
    let names = context.recommended_names();
    assert!(!names.contains(&"Fong Da Coffee".to_owned()), "got {names:?}");
}

#[then("the recommendations came from the tag path")]
fn from_tag_path(context: &TestContext) {
    assert!(matches!(
        context.recommendation().outcome,
        Outcome::Matches {
            match_type: MatchType::Tag,
            ..
        }
    ));
}

#[then("the recommendations came from the name path")]
fn from_name_path(context: &TestContext) {
    assert!(matches!(
        context.recommendation().outcome,
        Outcome::Matches {
            match_type: MatchType::Name,
            ..
        }
    ));
}

#[then("place_A is not recommended")]
fn place_a_excluded(context: &TestContext) {
    let ids = context.recommended_ids();
    assert!(!ids.contains(&"place_A".to_owned()), "got {ids:?}");
}

#[then("place_B is not recommended")]
fn place_b_excluded(context: &TestContext) {
    let ids = context.recommended_ids();
    assert!(!ids.contains(&"place_B".to_owned()), "got {ids:?}");
}

#[then("2 venues are recommended")]
fn two_recommended(context: &TestContext) {
    assert_eq!(context.recommended_ids().len(), 2);
}

#[then("the embedded query asks to avoid too noisy")]
fn embedded_with_reason(context: &TestContext) {
    let embedder = context.embedder.borrow().clone().expect("embedder");
    let seen = embedder.seen();
    assert!(
        seen.iter()
            .any(|text| text.contains("strictly avoid features like \"too noisy\"")),
        "embedded {seen:?}"
    );
}

#[then("the quiet venue ranks above the lively venue")]
fn quiet_first(context: &TestContext) {
    let ids = context.recommended_ids();
    let position = |id: &str| ids.iter().position(|seen| seen == id);
    let quiet = position("place_quiet").expect("quiet venue returned");
    let lively = position("place_lively").expect("lively venue returned");
    assert!(quiet < lively, "got {ids:?}");
}

#[then("Fong Da Coffee is ranked first")]
fn fong_da_first(context: &TestContext) {
    let recommendation = context.recommendation();
    let first = recommendation.records().first().expect("a record");
    assert_eq!(first.display_name, "Fong Da Coffee");
    assert!(first.dist_meters > 14_000.0);
}

#[then("the answer is ready with no matches")]
fn no_matches(context: &TestContext) {
    assert_eq!(context.recommendation().outcome, Outcome::NoMatches);
}

#[scenario(path = "tests/features/recommend.feature", index = 0)]
fn late_night_search(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/recommend.feature", index = 1)]
fn blacklist_exclusion(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/recommend.feature", index = 2)]
fn rejection_follow_up(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/recommend.feature", index = 3)]
fn exact_name_match(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/recommend.feature", index = 4)]
fn empty_answer(context: TestContext) {
    let _ = context;
}

#[scenario(path = "tests/features/recommend.feature", index = 5)]
fn generic_word_stays_local(context: TestContext) {
    let _ = context;
}
