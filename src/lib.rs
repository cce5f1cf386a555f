//! Facade crate for the café recommendation engine.
//!
//! This crate re-exports the core domain types and exposes the scoring
//! funnel, request orchestration, and adapters behind feature flags.

#![forbid(unsafe_code)]

pub use cafe_core::{
    Action, Candidate, Clock, Embedder, FeedbackLedger, Gazetteer, Intent, IntentClassifier,
    MatchType, OpeningHours, SessionState, SessionStore, StoreError, TagFilter, Venue, VenueStore,
};

#[cfg(feature = "engine")]
pub use cafe_engine::{
    FeedbackLoop, FollowUp, Outcome, RecommendRequest, Recommendation, RecommendationRecord,
    Recommender, RecommenderConfig, Response, TagTaxonomy,
};
#[cfg(feature = "engine")]
pub use cafe_scorer::{ScoringConfig, ScoringContext, ScoringFunnel};

#[cfg(feature = "data")]
pub use cafe_data::{ResilientEmbedder, SqliteLedger, load_gazetteer, load_store};
