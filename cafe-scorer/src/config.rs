//! Tunable constants for the scoring funnel.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Linear blend of the four ranking signals.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Semantic match confidence.
    pub vector: f64,
    /// Rating and time-sufficiency quality.
    pub quality: f64,
    /// Distance and transit proximity.
    pub location: f64,
    /// Aggregate user behaviour.
    pub behavior: f64,
}

impl BlendWeights {
    /// Weights for first-time users, who have no behaviour signal yet.
    pub const NEW_USER: Self = Self {
        vector: 0.40,
        quality: 0.40,
        location: 0.20,
        behavior: 0.00,
    };

    /// Weights for returning users.
    pub const RETURNING_USER: Self = Self {
        vector: 0.35,
        quality: 0.30,
        location: 0.15,
        behavior: 0.20,
    };

    const fn values(self) -> [f64; 4] {
        [self.vector, self.quality, self.location, self.behavior]
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "score blending requires weighted sums"
    )]
    pub(crate) fn blend(self, vector: f64, quality: f64, location: f64, behavior: f64) -> f64 {
        self.vector * vector
            + self.quality * quality
            + self.location * location
            + self.behavior * behavior
    }
}

/// Quality = `rating * rating_share + time * time_share`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Share of the Bayesian rating.
    pub rating_share: f64,
    /// Share of the time-sufficiency term.
    pub time_share: f64,
    /// Population mean rating the shrinkage pulls toward.
    pub prior_rating: f64,
    /// Review count at which the observed rating and prior weigh equally.
    pub prior_weight: f64,
    /// Top of the rating scale, used for normalisation.
    pub rating_scale: f64,
    /// Hours before closing that earn full time credit.
    pub sufficient_hours: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            rating_share: 0.7,
            time_share: 0.3,
            prior_rating: 4.2,
            prior_weight: 50.0,
            rating_scale: 5.0,
            sufficient_hours: 3.0,
        }
    }
}

/// Location = `distance_share * exp(-d / distance_decay_m) +
/// transit_share * exp(-t / transit_decay_m)`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Share of the distance-decay term.
    pub distance_share: f64,
    /// Share of the transit-decay term.
    pub transit_share: f64,
    /// Decay constant for distance from the search origin.
    pub distance_decay_m: f64,
    /// Decay constant for distance to the nearest station.
    pub transit_decay_m: f64,
    /// Station distance assumed when nothing is known.
    pub default_transit_m: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            distance_share: 0.6,
            transit_share: 0.4,
            distance_decay_m: 1500.0,
            transit_decay_m: 500.0,
            default_transit_m: 800.0,
        }
    }
}

/// Behaviour = `sign(r) * (1 - exp(-|r| / saturation))` with
/// `r = keep * keeps + click * clicks - dislike * dislikes`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Weight per bookmark.
    pub keep: f64,
    /// Weight per click.
    pub click: f64,
    /// Penalty per dislike.
    pub dislike: f64,
    /// Saturation constant.
    pub saturation: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            keep: 3.0,
            click: 1.0,
            dislike: 2.0,
            saturation: 10.0,
        }
    }
}

/// Multipliers for venues shown to the same user recently.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Window for near-total suppression.
    pub strong_hours: i64,
    /// Multiplier inside the strong window.
    pub strong_multiplier: f64,
    /// Outer window for partial suppression.
    pub soft_hours: i64,
    /// Multiplier inside the soft window.
    pub soft_multiplier: f64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            strong_hours: 24,
            strong_multiplier: 0.1,
            soft_hours: 48,
            soft_multiplier: 0.5,
        }
    }
}

/// Every constant used by [`ScoringFunnel`](crate::ScoringFunnel).
///
/// # Examples
///
/// ```
/// use cafe_scorer::ScoringConfig;
///
/// let config = ScoringConfig::default().validate().expect("defaults are valid");
/// assert_eq!(config.top_n, 10);
/// assert!((config.max_distance_m - 3000.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidates farther than this are dropped unless they matched by name.
    pub max_distance_m: f64,
    /// Hours-until-close used when time penalties are suppressed.
    pub neutral_hours: f64,
    /// Quality term settings.
    pub quality: QualityConfig,
    /// Location term settings.
    pub location: LocationConfig,
    /// Behaviour term settings.
    pub behavior: BehaviorConfig,
    /// Flat bonus for under-reviewed venues.
    pub cold_start_bonus: f64,
    /// Venues with fewer reviews than this get the bonus.
    pub cold_start_reviews: u32,
    /// Blend for first-time users.
    pub new_user: BlendWeights,
    /// Blend for returning users.
    pub returning_user: BlendWeights,
    /// Multiplier for venues sharing a tag with a just-rejected venue.
    pub rejected_tag_multiplier: f64,
    /// Repeat-recommendation cooldown.
    pub cooldown: CooldownConfig,
    /// Added to literal name matches after clamping.
    pub name_match_bonus: f64,
    /// Number of candidates returned.
    pub top_n: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 3000.0,
            neutral_hours: cafe_core::NEUTRAL_HOURS_UNTIL_CLOSE,
            quality: QualityConfig::default(),
            location: LocationConfig::default(),
            behavior: BehaviorConfig::default(),
            cold_start_bonus: 0.05,
            cold_start_reviews: 10,
            new_user: BlendWeights::NEW_USER,
            returning_user: BlendWeights::RETURNING_USER,
            rejected_tag_multiplier: 0.8,
            cooldown: CooldownConfig::default(),
            name_match_bonus: 1000.0,
            top_n: 10,
        }
    }
}

/// Errors raised by [`ScoringConfig::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum ScoringConfigError {
    /// A value was negative, NaN, or infinite.
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A decay constant, scale, or saturation was zero.
    #[error("{field} must be strictly positive")]
    NonPositive {
        /// Offending field.
        field: &'static str,
    },
    /// A multiplier would increase scores.
    #[error("{field} must lie in 0.0..=1.0 (got {value})")]
    MultiplierOutOfRange {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A blend's weights sum to zero.
    #[error("{field} weights must not all be zero")]
    ZeroBlend {
        /// Offending blend.
        field: &'static str,
    },
    /// The strong cooldown window is not inside the soft one.
    #[error("cooldown windows must satisfy 0 <= strong_hours <= soft_hours")]
    CooldownWindows,
    /// `top_n` was zero.
    #[error("top_n must be at least 1")]
    EmptyResult,
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ScoringConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScoringConfigError::InvalidValue { field, value })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ScoringConfigError> {
    non_negative(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ScoringConfigError::NonPositive { field })
    }
}

fn multiplier(field: &'static str, value: f64) -> Result<(), ScoringConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ScoringConfigError::MultiplierOutOfRange { field, value })
    }
}

fn blend(field: &'static str, weights: BlendWeights) -> Result<(), ScoringConfigError> {
    for value in weights.values() {
        non_negative(field, value)?;
    }
    if weights.values().iter().all(|value| *value == 0.0) {
        return Err(ScoringConfigError::ZeroBlend { field });
    }
    Ok(())
}

impl ScoringConfig {
    /// Validate the configuration and return it.
    ///
    /// # Errors
    /// Returns [`ScoringConfigError`] naming the first invalid field.
    pub fn validate(self) -> Result<Self, ScoringConfigError> {
        non_negative("max_distance_m", self.max_distance_m)?;
        non_negative("neutral_hours", self.neutral_hours)?;
        non_negative("quality.rating_share", self.quality.rating_share)?;
        non_negative("quality.time_share", self.quality.time_share)?;
        non_negative("quality.prior_rating", self.quality.prior_rating)?;
        non_negative("quality.prior_weight", self.quality.prior_weight)?;
        positive("quality.rating_scale", self.quality.rating_scale)?;
        positive("quality.sufficient_hours", self.quality.sufficient_hours)?;
        non_negative("location.distance_share", self.location.distance_share)?;
        non_negative("location.transit_share", self.location.transit_share)?;
        positive("location.distance_decay_m", self.location.distance_decay_m)?;
        positive("location.transit_decay_m", self.location.transit_decay_m)?;
        non_negative("location.default_transit_m", self.location.default_transit_m)?;
        non_negative("behavior.keep", self.behavior.keep)?;
        non_negative("behavior.click", self.behavior.click)?;
        non_negative("behavior.dislike", self.behavior.dislike)?;
        positive("behavior.saturation", self.behavior.saturation)?;
        non_negative("cold_start_bonus", self.cold_start_bonus)?;
        blend("new_user", self.new_user)?;
        blend("returning_user", self.returning_user)?;
        multiplier("rejected_tag_multiplier", self.rejected_tag_multiplier)?;
        multiplier("cooldown.strong_multiplier", self.cooldown.strong_multiplier)?;
        multiplier("cooldown.soft_multiplier", self.cooldown.soft_multiplier)?;
        if self.cooldown.strong_hours < 0 || self.cooldown.strong_hours > self.cooldown.soft_hours {
            return Err(ScoringConfigError::CooldownWindows);
        }
        non_negative("name_match_bonus", self.name_match_bonus)?;
        if self.top_n == 0 {
            return Err(ScoringConfigError::EmptyResult);
        }
        Ok(self)
    }

    /// Blend for the requester.
    #[must_use]
    pub const fn weights_for(&self, returning_user: bool) -> BlendWeights {
        if returning_user {
            self.returning_user
        } else {
            self.new_user
        }
    }
}
