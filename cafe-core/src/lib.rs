//! Core domain types for the café recommendation engine.
//!
//! The crate holds the venue model, opening-hours evaluation, the place-name
//! gazetteer, and the contracts that storage, embedding, intent
//! classification, and feedback adapters implement. Constructors validate
//! their input so downstream components can trust the typed records.

mod candidate;
mod clock;
pub mod gazetteer;
mod hours;
mod interaction;
mod ledger;
mod names;
mod ports;
pub mod session;
pub mod store;
mod venue;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use candidate::{Candidate, MatchType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use gazetteer::{Gazetteer, GazetteerEntry, PlaceKind, Resolution};
pub use hours::{
    MINUTES_PER_DAY, NEUTRAL_HOURS_UNTIL_CLOSE, OpeningHours, OpeningHoursError, OpeningStatus,
    Period, is_open,
};
pub use interaction::{Action, BehaviorCounts, Interaction, ParseActionError, UserList};
pub use ledger::{FeedbackLedger, LedgerError, SessionStore};
pub use names::{names_match, normalise_name};
pub use ports::{
    EmbeddingError, EmbeddingTask, Embedder, Intent, IntentClassifier, IntentError, TimeFilter,
    Unconfigured,
};
pub use session::{SessionEffect, SessionError, SessionEvent, SessionState};
pub use store::{StoreError, TagFilter, VectorChannel, VectorHit, VenueStore};
pub use venue::{
    Attributes, Contact, EMBEDDING_DIMENSIONS, Ratings, Review, Venue, VenueError, distance_m,
};
