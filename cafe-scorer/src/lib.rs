//! Ranking for café recommendations.
//!
//! Every sourcing path (name, vector, tag) hands its candidates to the same
//! [`ScoringFunnel`], which blends four signals:
//! - **vector**: semantic confidence from the sourcing path;
//! - **quality**: a Bayesian-shrunk rating plus how long the venue stays
//!   open;
//! - **location**: exponential decay over distance from the origin and to
//!   the nearest transit station;
//! - **behaviour**: a saturating tally of keeps, clicks, and dislikes.
//!
//! The blend is then adjusted for under-reviewed venues, tags the user just
//! rejected, and recent repeat recommendations. Name matches are lifted
//! above everything else. All constants live in [`ScoringConfig`].

#![forbid(unsafe_code)]

pub mod components;
mod config;
mod funnel;

pub use config::{
    BehaviorConfig, BlendWeights, CooldownConfig, LocationConfig, QualityConfig, ScoringConfig,
    ScoringConfigError,
};
pub use funnel::{ScoringContext, ScoringFunnel};
