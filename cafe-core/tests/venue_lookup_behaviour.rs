//! Behavioural tests for place resolution and venue lookup using rstest-bdd.

use std::cell::RefCell;

use cafe_core::store::MemoryVenueStore;
use cafe_core::{Gazetteer, GazetteerEntry, PlaceKind, Resolution, TagFilter, Venue, VenueStore};
use geo::Point;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const XIMEN: (f64, f64) = (121.5081, 25.0421);
const GONGGUAN: (f64, f64) = (121.5343, 25.0147);
const METRES_PER_DEGREE_LNG: f64 = 100_900.0;

/// Gazetteer, store, and lookup results shared by one scenario.
pub struct LookupWorld {
    gazetteer: RefCell<Gazetteer>,
    store: RefCell<MemoryVenueStore>,
    resolution: RefCell<Option<Resolution>>,
    found: RefCell<Vec<Venue>>,
}

#[fixture]
/// Build a fresh `LookupWorld` for each scenario run.
pub fn world() -> LookupWorld {
    LookupWorld {
        gazetteer: RefCell::new(Gazetteer::default()),
        store: RefCell::new(MemoryVenueStore::default()),
        resolution: RefCell::new(None),
        found: RefCell::new(Vec::new()),
    }
}

fn ximen() -> Point<f64> {
    Point::new(XIMEN.0, XIMEN.1)
}

fn east_of_ximen(metres: f64) -> Point<f64> {
    Point::new(XIMEN.0 + metres / METRES_PER_DEGREE_LNG, XIMEN.1)
}

fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime")
        .block_on(future)
}

impl LookupWorld {
    fn search_by_name(&self, name: &str) {
        let store = self.store.borrow();
        let found = block_on(store.find_by_name(name, ximen(), 30_000.0)).expect("name search");
        self.found.replace(found);
    }

    fn found_ids(&self) -> Vec<String> {
        self.found
            .borrow()
            .iter()
            .map(|venue| venue.place_id.clone())
            .collect()
    }
}

#[given("a gazetteer with Ximen and Gongguan")]
fn two_stations(world: &LookupWorld) {
    world.gazetteer.replace(Gazetteer::new(vec![
        GazetteerEntry::new("Ximen", ximen(), PlaceKind::Station),
        GazetteerEntry::new(
            "Gongguan",
            Point::new(GONGGUAN.0, GONGGUAN.1),
            PlaceKind::Station,
        ),
    ]));
}

#[given("a store with Fong Da Coffee 15 kilometres from Ximen")]
fn far_named_venue(world: &LookupWorld) {
    let fong_da = Venue::new("fong-da", "Fong Da Coffee", east_of_ximen(15_000.0))
        .expect("valid venue");
    let nearby = Venue::new("moonlight", "Moonlight", east_of_ximen(200.0)).expect("valid venue");
    world
        .store
        .replace(MemoryVenueStore::with_venues([fong_da, nearby]));
}

#[given("a store with cat cafés 500 metres and 4 kilometres from Ximen")]
fn cat_cafes(world: &LookupWorld) {
    let near = Venue::new("near-cat", "Near Cat", east_of_ximen(500.0))
        .expect("valid venue")
        .with_tags(["店貓"]);
    let far = Venue::new("far-cat", "Far Cat", east_of_ximen(4000.0))
        .expect("valid venue")
        .with_tags(["店貓"]);
    let untagged = Venue::new("plain", "Plain", east_of_ximen(300.0)).expect("valid venue");
    world
        .store
        .replace(MemoryVenueStore::with_venues([near, far, untagged]));
}

#[when("a user writes between Ximen and Gongguan")]
fn resolve_between(world: &LookupWorld) {
    let resolution = world
        .gazetteer
        .borrow()
        .resolve("between Ximen and Gongguan", Point::new(0.0, 0.0));
    world.resolution.replace(Some(resolution));
}

#[when("the store is searched by name for take me to Fong Da Coffee")]
fn search_full_name(world: &LookupWorld) {
    world.search_by_name("take me to Fong Da Coffee");
}

#[when("the store is searched by name for coffee")]
fn search_generic_word(world: &LookupWorld) {
    world.search_by_name("coffee");
}

#[when("the store is searched for cat cafés within 3000 metres of Ximen")]
fn search_cat_cafes(world: &LookupWorld) {
    let store = world.store.borrow();
    let filter = TagFilter::all_of(["店貓"]);
    let found = block_on(store.geo_near(ximen(), 3000.0, &filter, 50)).expect("geo search");
    world.found.replace(found);
}

#[then("the search origin is midway between the stations")]
fn midway(world: &LookupWorld) {
    let resolution = world.resolution.borrow().clone().expect("resolved");
    let expected_lng = f64::midpoint(XIMEN.0, GONGGUAN.0);
    let expected_lat = f64::midpoint(XIMEN.1, GONGGUAN.1);
    assert!((resolution.origin.x() - expected_lng).abs() < 1e-9);
    assert!((resolution.origin.y() - expected_lat).abs() < 1e-9);
    assert_eq!(resolution.matched, vec!["Ximen", "Gongguan"]);
}

#[then("no query text remains")]
fn no_residual(world: &LookupWorld) {
    let resolution = world.resolution.borrow().clone().expect("resolved");
    assert_eq!(resolution.residual, None);
}

#[then("Fong Da Coffee is found")]
fn fong_da_found(world: &LookupWorld) {
    assert_eq!(world.found_ids(), vec!["fong-da"]);
}

#[then("no venue is found")]
fn nothing_found(world: &LookupWorld) {
    let ids = world.found_ids();
    assert!(ids.is_empty(), "got {ids:?}");
}

#[then("only the nearer cat café is found")]
fn nearer_cat_found(world: &LookupWorld) {
    assert_eq!(world.found_ids(), vec!["near-cat"]);
}

#[scenario(path = "tests/features/venue_lookup.feature", index = 0)]
fn midpoint_of_two_places(world: LookupWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/venue_lookup.feature", index = 1)]
fn whole_name_lookup(world: LookupWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/venue_lookup.feature", index = 2)]
fn generic_word_lookup(world: LookupWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/venue_lookup.feature", index = 3)]
fn tagged_proximity_lookup(world: LookupWorld) {
    let _ = world;
}
