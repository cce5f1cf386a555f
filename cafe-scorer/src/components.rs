//! Pure per-candidate scoring terms.
//!
//! Each function maps one signal into `0.0..=1.0` (behaviour into
//! `-1.0..=1.0`) so the funnel can blend them linearly.

use cafe_core::{BehaviorCounts, Venue, distance_m};
use chrono::{DateTime, TimeDelta, Utc};
use geo::Point;

use crate::config::{BehaviorConfig, CooldownConfig, LocationConfig, QualityConfig};

/// Bayesian-shrunk rating normalised by the rating scale.
///
/// `(n * rating + m * prior) / (n + m) / scale`, so a handful of perfect
/// reviews cannot outrank hundreds of good ones.
#[must_use]
#[expect(
    clippy::float_arithmetic,
    reason = "Bayesian averaging is a weighted mean"
)]
pub fn bayesian_rating(rating: f64, review_amount: u32, config: &QualityConfig) -> f64 {
    let observed = if rating.is_finite() { rating } else { config.prior_rating };
    let n = f64::from(review_amount);
    let denominator = n + config.prior_weight;
    let shrunk = if denominator > 0.0 {
        (n * observed + config.prior_weight * config.prior_rating) / denominator
    } else {
        config.prior_rating
    };
    (shrunk / config.rating_scale).clamp(0.0, 1.0)
}

/// Full credit at `sufficient_hours` or more before closing, linear below,
/// zero when closed.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "linear ramp")]
pub fn time_sufficiency(hours_until_close: f64, config: &QualityConfig) -> f64 {
    if hours_until_close <= 0.0 || hours_until_close.is_nan() {
        return 0.0;
    }
    (hours_until_close / config.sufficient_hours).min(1.0)
}

/// Rating and time sufficiency blended into one quality term.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "weighted sum")]
pub fn quality_score(venue: &Venue, hours_until_close: f64, config: &QualityConfig) -> f64 {
    let rating = bayesian_rating(venue.ratings.rating, venue.ratings.review_amount, config);
    config.rating_share * rating + config.time_share * time_sufficiency(hours_until_close, config)
}

/// Distance to the nearest transit station.
///
/// Prefers the venue's precomputed value, then the closest of `stations`,
/// then `config.default_transit_m`.
#[must_use]
pub fn transit_distance(venue: &Venue, stations: &[Point<f64>], config: &LocationConfig) -> f64 {
    if let Some(metres) = venue.transit_distance_m.filter(|value| value.is_finite()) {
        return metres.max(0.0);
    }
    stations
        .iter()
        .map(|station| distance_m(venue.location, *station))
        .min_by(f64::total_cmp)
        .unwrap_or(config.default_transit_m)
}

/// Exponential proximity decay for origin and transit distance.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "exponential distance decay")]
pub fn location_score(dist_meters: f64, transit_meters: f64, config: &LocationConfig) -> f64 {
    let near_origin = (-dist_meters.max(0.0) / config.distance_decay_m).exp();
    let near_transit = (-transit_meters.max(0.0) / config.transit_decay_m).exp();
    config.distance_share * near_origin + config.transit_share * near_transit
}

/// Saturating aggregate of keeps, clicks, and dislikes in `-1.0..=1.0`.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "saturating exponential")]
pub fn behavior_score(counts: BehaviorCounts, config: &BehaviorConfig) -> f64 {
    let raw = config.keep * f64::from(counts.keeps) + config.click * f64::from(counts.clicks)
        - config.dislike * f64::from(counts.dislikes);
    if raw == 0.0 {
        return 0.0;
    }
    raw.signum() * (1.0 - (-raw.abs() / config.saturation).exp())
}

/// Multiplier for a venue last shown at `last_shown`.
#[must_use]
pub fn cooldown_multiplier(
    last_shown: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &CooldownConfig,
) -> f64 {
    let Some(shown) = last_shown else {
        return 1.0;
    };
    let elapsed = now.signed_duration_since(shown);
    if elapsed < TimeDelta::hours(config.strong_hours) {
        config.strong_multiplier
    } else if elapsed < TimeDelta::hours(config.soft_hours) {
        config.soft_multiplier
    } else {
        1.0
    }
}
