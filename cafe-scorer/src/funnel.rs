//! The unified scoring funnel every sourcing path feeds.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use cafe_core::{BehaviorCounts, Candidate, MatchType, Venue};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use geo::Point;
use log::{debug, info};

use crate::components::{
    behavior_score, cooldown_multiplier, location_score, quality_score, transit_distance,
};
use crate::config::{ScoringConfig, ScoringConfigError};

/// Per-request facts the funnel needs beyond the candidates themselves.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    /// Search origin the candidate distances were measured from.
    pub origin: Point<f64>,
    /// Local wall-clock instant of the request.
    pub now: DateTime<FixedOffset>,
    /// Whether the requester has any logged interaction.
    pub returning_user: bool,
    /// Tags of a venue the requester just rejected without a reason.
    pub rejected_tags: BTreeSet<String>,
    /// Instant used for hours-until-close; `None` means the request time.
    pub check_time: Option<NaiveDateTime>,
    /// Skip the closing-time penalty, as for late-night requests.
    pub ignore_time_penalty: bool,
    /// Aggregate behaviour per venue.
    pub behavior: HashMap<String, BehaviorCounts>,
    /// When each venue was last shown to the requester.
    pub last_shown: HashMap<String, DateTime<Utc>>,
    /// Transit stations for venues without a precomputed distance.
    pub stations: Vec<Point<f64>>,
}

impl ScoringContext {
    /// Context for a first-time user with no history.
    #[must_use]
    pub fn new(origin: Point<f64>, now: DateTime<FixedOffset>) -> Self {
        Self {
            origin,
            now,
            returning_user: false,
            rejected_tags: BTreeSet::new(),
            check_time: None,
            ignore_time_penalty: false,
            behavior: HashMap::new(),
            last_shown: HashMap::new(),
            stations: Vec::new(),
        }
    }

    /// Mark the requester as returning.
    #[must_use]
    pub const fn with_returning_user(mut self, returning_user: bool) -> Self {
        self.returning_user = returning_user;
        self
    }

    /// Tags to penalise.
    #[must_use]
    pub fn with_rejected_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.rejected_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Time handling resolved for the request.
    #[must_use]
    pub const fn with_time(
        mut self,
        check_time: Option<NaiveDateTime>,
        ignore_time_penalty: bool,
    ) -> Self {
        self.check_time = check_time;
        self.ignore_time_penalty = ignore_time_penalty;
        self
    }

    /// Behaviour tallies keyed by place id.
    #[must_use]
    pub fn with_behavior(mut self, behavior: HashMap<String, BehaviorCounts>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Last-shown timestamps keyed by place id.
    #[must_use]
    pub fn with_last_shown(mut self, last_shown: HashMap<String, DateTime<Utc>>) -> Self {
        self.last_shown = last_shown;
        self
    }

    /// Transit stations.
    #[must_use]
    pub fn with_stations(mut self, stations: Vec<Point<f64>>) -> Self {
        self.stations = stations;
        self
    }

    fn hours_until_close(&self, venue: &Venue, neutral: f64) -> f64 {
        if self.ignore_time_penalty {
            return neutral;
        }
        let at = self.check_time.unwrap_or_else(|| self.now.naive_local());
        venue
            .opening_hours
            .as_ref()
            .map_or(neutral, |hours| hours.hours_until_close(at))
    }
}

/// Scores candidates from any sourcing path and keeps the best.
///
/// # Examples
///
/// ```
/// use cafe_core::{Candidate, MatchType, Venue};
/// use cafe_scorer::{ScoringContext, ScoringFunnel};
/// use chrono::{FixedOffset, TimeZone};
/// use geo::Point;
///
/// let origin = Point::new(121.5170, 25.0478);
/// let now = FixedOffset::east_opt(8 * 3600)
///     .expect("offset")
///     .with_ymd_and_hms(2026, 1, 10, 15, 0, 0)
///     .single()
///     .expect("instant");
/// let venue = Venue::new("p1", "Near", origin).expect("venue").with_ratings(4.5, 80);
/// let candidates = vec![Candidate::new(venue, 120.0, MatchType::Tag, 0.8)];
///
/// let ranked = ScoringFunnel::default()
///     .score_and_rank(candidates, &ScoringContext::new(origin, now));
/// assert_eq!(ranked.len(), 1);
/// assert!(ranked[0].search_score <= 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScoringFunnel {
    config: ScoringConfig,
}

impl ScoringFunnel {
    /// Funnel with a validated configuration.
    ///
    /// # Errors
    /// Returns [`ScoringConfigError`] when `config` is invalid.
    pub fn with_config(config: ScoringConfig) -> Result<Self, ScoringConfigError> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a single candidate.
    ///
    /// Returns `None` when the candidate lies beyond the distance cut-off
    /// and did not match by name.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "penalties and bonuses are applied multiplicatively and additively"
    )]
    pub fn score(&self, candidate: &Candidate, context: &ScoringContext) -> Option<f64> {
        let config = &self.config;
        let is_name = candidate.match_type == MatchType::Name;
        if candidate.dist_meters > config.max_distance_m && !is_name {
            return None;
        }
        let venue = &candidate.venue;
        let hours = context.hours_until_close(venue, config.neutral_hours);
        let quality = quality_score(venue, hours, &config.quality);
        let transit = transit_distance(venue, &context.stations, &config.location);
        let location = location_score(candidate.dist_meters, transit, &config.location);
        let behavior = context
            .behavior
            .get(candidate.place_id())
            .map_or(0.0, |counts| behavior_score(*counts, &config.behavior));
        let vector = if is_name {
            1.0
        } else {
            candidate.vector_score.clamp(0.0, 1.0)
        };
        let weights = config.weights_for(context.returning_user);
        let mut score = weights.blend(vector, quality, location, behavior);
        if venue.ratings.review_amount < config.cold_start_reviews {
            score += config.cold_start_bonus;
        }
        if !venue.tags.is_disjoint(&context.rejected_tags) {
            score *= config.rejected_tag_multiplier;
        }
        score *= cooldown_multiplier(
            context.last_shown.get(candidate.place_id()).copied(),
            context.now.with_timezone(&Utc),
            &config.cooldown,
        );
        let mut clamped = score.clamp(0.0, 1.0);
        if is_name {
            clamped += config.name_match_bonus;
        }
        debug!(
            "scored {}: vector={vector:.3} quality={quality:.3} location={location:.3} behavior={behavior:.3} final={clamped:.3}",
            candidate.place_id()
        );
        Some(clamped)
    }

    /// Score every candidate, drop distant non-name matches, and return the
    /// top results ordered by descending score then ascending distance.
    ///
    /// The sort is stable, so fully tied candidates keep their input order.
    #[must_use]
    pub fn score_and_rank(
        &self,
        candidates: Vec<Candidate>,
        context: &ScoringContext,
    ) -> Vec<Candidate> {
        let received = candidates.len();
        let mut scored: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                self.score(&candidate, context).map(|score| {
                    candidate.search_score = score;
                    candidate
                })
            })
            .collect();
        scored.sort_by(rank_order);
        let kept = scored.len();
        scored.truncate(self.config.top_n);
        info!(
            "scoring funnel kept {kept} of {received} candidates; returning {}",
            scored.len()
        );
        scored
    }
}

fn rank_order(left: &Candidate, right: &Candidate) -> Ordering {
    right
        .search_score
        .total_cmp(&left.search_score)
        .then_with(|| left.dist_meters.total_cmp(&right.dist_meters))
}
