//! Tunable settings for sourcing and request orchestration.

use std::time::Duration;

use cafe_scorer::{ScoringConfig, ScoringConfigError};
use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time_context::DEFAULT_LATE_NIGHT_TERMS;

/// Limits and fusion weights for the three sourcing paths.
///
/// # Examples
///
/// ```
/// use cafe_engine::SourcingConfig;
///
/// let config: SourcingConfig = serde_json::from_str(r#"{"vector_k": 30}"#).expect("valid JSON");
/// assert_eq!(config.vector_k, 30);
/// assert_eq!(config.tag_limit, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcingConfig {
    /// Search radius for literal name matches.
    pub name_radius_m: f64,
    /// Proximity bound for vector and tag matches.
    pub max_distance_m: f64,
    /// Nearest neighbours requested from each vector channel.
    pub vector_k: usize,
    /// Weight of the venue-level ("macro") similarity.
    pub macro_weight: f64,
    /// Weight of the review-level ("micro") similarity.
    pub micro_weight: f64,
    /// Venues requested from the geo-proximity search.
    pub tag_limit: usize,
    /// Semantic confidence assigned to tag-path candidates.
    pub tag_vector_score: f64,
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            name_radius_m: 30_000.0,
            max_distance_m: 3000.0,
            vector_k: 50,
            macro_weight: 0.4,
            micro_weight: 0.6,
            tag_limit: 50,
            tag_vector_score: 0.8,
        }
    }
}

/// Errors raised by [`SourcingConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum SourcingConfigError {
    /// A distance or weight was negative, zero where it must not be, or
    /// not finite.
    #[error("{field} is out of range (got {value})")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A result limit was zero.
    #[error("{field} must be at least 1")]
    ZeroLimit {
        /// Offending field.
        field: &'static str,
    },
    /// Both channel weights were zero.
    #[error("macro_weight and micro_weight must not both be zero")]
    ZeroFusion,
}

fn check(field: &'static str, value: f64, valid: bool) -> Result<(), SourcingConfigError> {
    if value.is_finite() && valid {
        Ok(())
    } else {
        Err(SourcingConfigError::OutOfRange { field, value })
    }
}

impl SourcingConfig {
    /// Validate the configuration and return it.
    ///
    /// # Errors
    /// Returns [`SourcingConfigError`] naming the first invalid field.
    pub fn validate(self) -> Result<Self, SourcingConfigError> {
        check("name_radius_m", self.name_radius_m, self.name_radius_m > 0.0)?;
        check("max_distance_m", self.max_distance_m, self.max_distance_m > 0.0)?;
        check("macro_weight", self.macro_weight, self.macro_weight >= 0.0)?;
        check("micro_weight", self.micro_weight, self.micro_weight >= 0.0)?;
        check(
            "tag_vector_score",
            self.tag_vector_score,
            (0.0..=1.0).contains(&self.tag_vector_score),
        )?;
        if self.macro_weight == 0.0 && self.micro_weight == 0.0 {
            return Err(SourcingConfigError::ZeroFusion);
        }
        if self.vector_k == 0 {
            return Err(SourcingConfigError::ZeroLimit { field: "vector_k" });
        }
        if self.tag_limit == 0 {
            return Err(SourcingConfigError::ZeroLimit { field: "tag_limit" });
        }
        Ok(self)
    }
}

/// Latitude and longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl LatLng {
    /// Taipei Main Station.
    pub const TAIPEI_MAIN_STATION: Self = Self {
        lat: 25.0478,
        lng: 121.5170,
    };

    /// As a `geo` point with `x = longitude`.
    #[must_use]
    pub fn point(self) -> Point<f64> {
        Point::new(self.lng, self.lat)
    }

    fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Everything a [`crate::Recommender`] can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Sourcing limits and fusion weights.
    pub sourcing: SourcingConfig,
    /// Ranking constants.
    pub scoring: ScoringConfig,
    /// Origin used when a request carries no location and the user has
    /// none on record.
    pub default_origin: LatLng,
    /// Upper bound on one request before answering "try again".
    pub request_timeout_secs: u64,
    /// Words and tags that mark a late-night request.
    pub late_night_terms: Vec<String>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            sourcing: SourcingConfig::default(),
            scoring: ScoringConfig::default(),
            default_origin: LatLng::TAIPEI_MAIN_STATION,
            request_timeout_secs: 10,
            late_night_terms: DEFAULT_LATE_NIGHT_TERMS
                .iter()
                .map(|term| (*term).to_owned())
                .collect(),
        }
    }
}

/// Errors raised by [`RecommenderConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum RecommenderConfigError {
    /// Sourcing settings were invalid.
    #[error("invalid sourcing config: {0}")]
    Sourcing(#[from] SourcingConfigError),
    /// Scoring settings were invalid.
    #[error("invalid scoring config: {0}")]
    Scoring(#[from] ScoringConfigError),
    /// The default origin was not a valid coordinate.
    #[error("default origin ({lat}, {lng}) is not a valid coordinate")]
    InvalidOrigin {
        /// Latitude.
        lat: f64,
        /// Longitude.
        lng: f64,
    },
    /// The request timeout was zero.
    #[error("request_timeout_secs must be at least 1")]
    ZeroTimeout,
}

impl RecommenderConfig {
    /// Validate every section and return the configuration.
    ///
    /// # Errors
    /// Returns [`RecommenderConfigError`] for the first invalid section.
    pub fn validate(self) -> Result<Self, RecommenderConfigError> {
        let Self {
            sourcing,
            scoring,
            default_origin,
            request_timeout_secs,
            late_night_terms,
        } = self;
        if !default_origin.is_valid() {
            return Err(RecommenderConfigError::InvalidOrigin {
                lat: default_origin.lat,
                lng: default_origin.lng,
            });
        }
        if request_timeout_secs == 0 {
            return Err(RecommenderConfigError::ZeroTimeout);
        }
        Ok(Self {
            sourcing: sourcing.validate()?,
            scoring: scoring.validate()?,
            default_origin,
            request_timeout_secs,
            late_night_terms,
        })
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
