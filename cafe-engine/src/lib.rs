//! Request orchestration for the café recommendation engine.
//!
//! A [`Recommender`] resolves where the user wants to search, interprets
//! their request, decides when venues must be open, and hands candidates
//! from the first productive sourcing path to the scoring funnel. The
//! [`FeedbackLoop`] records reactions and runs the rejection dialogue
//! whose [`FollowUp`] steers the next search.
//!
//! Upstream failures degrade rather than fail: a missing classifier falls
//! back to an open-now search on the raw text, a failing embedder skips
//! semantic search, and an empty result is [`Outcome::NoMatches`].

#![forbid(unsafe_code)]

mod config;
pub mod feedback;
pub mod presentation;
mod recommender;
pub mod sourcer;
pub mod time_context;

pub use config::{
    LatLng, RecommenderConfig, RecommenderConfigError, SourcingConfig, SourcingConfigError,
};
pub use feedback::{FeedbackError, FeedbackLoop, FollowUp, NegativeConstraint};
pub use presentation::{RecommendationRecord, TagTaxonomy};
pub use recommender::{
    Outcome, RecommendError, RecommendRequest, Recommendation, Recommender, Response,
};
pub use sourcer::{CandidateSourcer, SourceRequest, Sourced};
pub use time_context::{LateNightVocabulary, TimeContext};
