//! One recommendation request, end to end.

use std::sync::Arc;
use std::time::Duration;

use cafe_core::{
    Action, Clock, Embedder, FeedbackLedger, Gazetteer, Intent, IntentClassifier, Interaction,
    LedgerError, MatchType, StoreError, SystemClock, TagFilter, Unconfigured, VenueStore,
};
use cafe_scorer::{ScoringContext, ScoringFunnel};
use chrono::{DateTime, FixedOffset, Utc};
use geo::Point;
use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::{LatLng, RecommenderConfig, RecommenderConfigError};
use crate::feedback::{FollowUp, NegativeConstraint, inject_reason, rejected_features};
use crate::presentation::{RecommendationRecord, RenderContext, TagTaxonomy};
use crate::sourcer::{CandidateSourcer, SourceRequest};
use crate::time_context::{LateNightVocabulary, TimeContext};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecommendRequest {
    /// Requesting user.
    pub user_id: String,
    /// Shared location, if any.
    pub location: Option<Point<f64>>,
    /// Free-text request.
    pub query: Option<String>,
    /// Canonical tags from buttons or flags, primary first.
    pub tags: Vec<String>,
    /// Rejection this request follows up on.
    pub follow_up: Option<FollowUp>,
}

impl RecommendRequest {
    /// Request on behalf of `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Search around `location`.
    #[must_use]
    pub const fn with_location(mut self, location: Point<f64>) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach free text; blank text is ignored.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let text = query.into();
        self.query = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Require `tags`.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Follow up on a completed rejection.
    #[must_use]
    pub fn with_follow_up(mut self, follow_up: FollowUp) -> Self {
        self.follow_up = Some(follow_up);
        self
    }
}

/// Result of a request that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Ranked recommendations, best first.
    Matches {
        /// Path that produced the candidates.
        match_type: MatchType,
        /// The records.
        records: Vec<RecommendationRecord>,
    },
    /// Every path came up empty.
    NoMatches,
}

/// A completed recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Origin the search ran around.
    pub center: LatLng,
    /// Ranked records or the empty outcome.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Recommendation {
    /// The records, empty for [`Outcome::NoMatches`].
    #[must_use]
    pub fn records(&self) -> &[RecommendationRecord] {
        match &self.outcome {
            Outcome::Matches { records, .. } => records,
            Outcome::NoMatches => &[],
        }
    }
}

/// What the caller always gets back from [`Recommender::respond`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The request completed.
    Ready(Recommendation),
    /// Something unexpected went wrong; ask the user to retry.
    TryAgain {
        /// Message suitable for the user.
        message: String,
    },
}

/// Errors that abort a recommendation.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// The venue store returned data that violates the venue schema.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Reading or writing user state failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// The request ran past its deadline.
    #[error("recommendation timed out after {0:?}")]
    TimedOut(Duration),
}

const TRY_AGAIN: &str = "Something went wrong while searching. Please try again.";

/// Ties geo resolution, intent, sourcing, scoring, and presentation
/// together.
#[derive(Clone)]
pub struct Recommender {
    store: Arc<dyn VenueStore>,
    ledger: Arc<dyn FeedbackLedger>,
    gazetteer: Arc<Gazetteer>,
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn IntentClassifier>,
    clock: Arc<dyn Clock>,
    config: RecommenderConfig,
    funnel: ScoringFunnel,
    vocabulary: LateNightVocabulary,
    taxonomy: TagTaxonomy,
}

impl Recommender {
    /// Recommend from `store`, reading and writing user state in `ledger`.
    ///
    /// Language services start unconfigured, so only the name and tag
    /// paths run until [`Self::with_embedder`] is called.
    #[must_use]
    pub fn new(
        store: Arc<dyn VenueStore>,
        ledger: Arc<dyn FeedbackLedger>,
        gazetteer: Arc<Gazetteer>,
    ) -> Self {
        Self {
            store,
            ledger,
            gazetteer,
            embedder: Arc::new(Unconfigured),
            classifier: Arc::new(Unconfigured),
            clock: Arc::new(SystemClock::default()),
            config: RecommenderConfig::default(),
            funnel: ScoringFunnel::default(),
            vocabulary: LateNightVocabulary::default(),
            taxonomy: TagTaxonomy::default(),
        }
    }

    /// Embed queries with `embedder`.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Classify free text with `classifier`.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Read the current time from `clock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the tag taxonomy used for display tags.
    #[must_use]
    pub fn with_taxonomy(mut self, taxonomy: TagTaxonomy) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    /// Apply a validated configuration.
    ///
    /// # Errors
    /// Returns [`RecommenderConfigError`] when any section is invalid.
    pub fn with_config(mut self, config: RecommenderConfig) -> Result<Self, RecommenderConfigError> {
        let valid = config.validate()?;
        self.funnel = ScoringFunnel::with_config(valid.scoring.clone())?;
        self.vocabulary = LateNightVocabulary::new(&valid.late_night_terms);
        self.config = valid;
        Ok(self)
    }

    /// The configuration in force.
    #[must_use]
    pub const fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    fn sourcer(&self) -> CandidateSourcer {
        CandidateSourcer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.sourcing.clone(),
        )
    }

    async fn intent(&self, query: Option<&str>, now: DateTime<FixedOffset>) -> Intent {
        let Some(text) = query else {
            return Intent::default();
        };
        match self.classifier.classify(text, now).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!("intent classification failed, searching open-now with raw text: {err}");
                Intent::fallback(text)
            }
        }
    }

    /// Search origin and residual query for `query`.
    fn locate(&self, query: Option<&str>, fallback: Point<f64>) -> (Point<f64>, Option<String>) {
        let Some(text) = query else {
            return (fallback, None);
        };
        let resolution = self.gazetteer.resolve(text, fallback);
        if resolution.overrides_location() {
            info!("query names {:?}; searching around them", resolution.matched);
        }
        (resolution.origin, resolution.residual)
    }

    fn origin(&self, request: &RecommendRequest) -> Result<Point<f64>, LedgerError> {
        if let Some(location) = request.location {
            return Ok(location);
        }
        Ok(self
            .ledger
            .last_known_location(&request.user_id)?
            .unwrap_or_else(|| self.config.default_origin.point()))
    }

    /// Run one request to completion.
    ///
    /// # Errors
    /// Returns [`RecommendError`] when the store returns malformed data or
    /// user state cannot be read or written. Degraded collaborators and
    /// empty results are not errors.
    pub async fn recommend(
        &self,
        request: &RecommendRequest,
    ) -> Result<Recommendation, RecommendError> {
        let now = self.clock.now();
        let now_utc = now.with_timezone(&Utc);
        let user_id = request.user_id.as_str();
        let query = request.query.as_deref();

        let returning_user = self.ledger.is_returning_user(user_id)?;
        let fallback = self.origin(request)?;
        let (origin, residual) = self.locate(query, fallback);
        if request.location.is_some() || origin != fallback {
            self.ledger.update_location(user_id, origin, now_utc)?;
        }

        let intent = self.intent(query, now).await;
        let tags = merged_tags(&request.tags, &intent.tags);
        let time = TimeContext::resolve(&intent, query, &tags, now.naive_local(), &self.vocabulary);

        let mut blacklist = self.ledger.blacklist(user_id)?;
        let follow_up = request.follow_up.as_ref();
        if let Some(rejected) = follow_up {
            blacklist.insert(rejected.rejected_place_id.clone());
        }

        let constraint = rejected_features(
            self.store.as_ref(),
            follow_up.map(|rejected| rejected.rejected_place_id.as_str()),
            follow_up.and_then(|rejected| rejected.negative_reason.as_deref()),
        )
        .await?;
        let search_text = match &constraint {
            NegativeConstraint::Reason(reason) => inject_reason(residual.as_deref(), reason),
            NegativeConstraint::None | NegativeConstraint::AvoidTags(_) => residual,
        };
        let rejected_tags = constraint.avoid_tags();

        let filter = TagFilter::all_of(tags.iter().map(String::as_str));
        let sourced = self
            .sourcer()
            .source(&SourceRequest {
                origin,
                query: search_text.as_deref(),
                tags: &filter,
                blacklist: &blacklist,
                check_time: time.check_time,
            })
            .await?;

        let Some(match_type) = sourced.match_type else {
            info!("no candidates for {user_id}");
            self.log_request(user_id, returning_user, query, &tags, origin, now_utc)?;
            return Ok(Recommendation {
                center: to_lat_lng(origin),
                outcome: Outcome::NoMatches,
            });
        };

        let place_ids: Vec<String> = sourced
            .candidates
            .iter()
            .map(|candidate| candidate.place_id().to_owned())
            .collect();
        let context = ScoringContext::new(origin, now)
            .with_returning_user(returning_user)
            .with_rejected_tags(rejected_tags)
            .with_time(time.check_time, time.ignore_time_penalty)
            .with_behavior(self.ledger.behavior_counts_for(&place_ids)?)
            .with_last_shown(self.ledger.last_shown(user_id, &place_ids)?)
            .with_stations(self.gazetteer.stations());
        let ranked = self.funnel.score_and_rank(sourced.candidates, &context);

        let shown: Vec<String> = ranked
            .iter()
            .map(|candidate| candidate.place_id().to_owned())
            .collect();
        self.ledger.record_impressions(user_id, &shown, now_utc)?;
        self.log_request(user_id, returning_user, query, &tags, origin, now_utc)?;

        if ranked.is_empty() {
            return Ok(Recommendation {
                center: to_lat_lng(origin),
                outcome: Outcome::NoMatches,
            });
        }
        let render = RenderContext {
            query,
            requested_tags: &tags,
            at: time.check_time.unwrap_or_else(|| now.naive_local()),
        };
        let records = ranked
            .iter()
            .map(|candidate| RecommendationRecord::render(candidate, &self.taxonomy, &render))
            .collect();
        info!("returning {} {match_type} matches to {user_id}", shown.len());
        Ok(Recommendation {
            center: to_lat_lng(origin),
            outcome: Outcome::Matches {
                match_type,
                records,
            },
        })
    }

    fn log_request(
        &self,
        user_id: &str,
        returning_user: bool,
        query: Option<&str>,
        tags: &[String],
        origin: Point<f64>,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let action = if returning_user {
            Action::Search
        } else {
            Action::InitPref
        };
        let detail = query.map(str::to_owned).or_else(|| tags.first().cloned());
        let interaction = Interaction::new(user_id, action, at)
            .with_reason(detail)
            .with_location(origin);
        self.ledger.record(&interaction)
    }

    /// Run `request` within the configured deadline and always answer.
    ///
    /// Errors and timeouts are logged and turned into
    /// [`Response::TryAgain`]. A timeout drops the in-flight request, so
    /// nothing it had not yet written is persisted.
    pub async fn respond(&self, request: &RecommendRequest) -> Response {
        let deadline = self.config.request_timeout();
        let result = tokio::time::timeout(deadline, self.recommend(request))
            .await
            .unwrap_or(Err(RecommendError::TimedOut(deadline)));
        match result {
            Ok(recommendation) => Response::Ready(recommendation),
            Err(err) => {
                error!("recommendation for {} failed: {err}", request.user_id);
                Response::TryAgain {
                    message: TRY_AGAIN.to_owned(),
                }
            }
        }
    }
}

/// Requested tags first, then classifier tags not already present.
fn merged_tags(requested: &[String], classified: &[String]) -> Vec<String> {
    let mut tags = requested.to_vec();
    for tag in classified {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags
}

fn to_lat_lng(point: Point<f64>) -> LatLng {
    LatLng {
        lat: point.y(),
        lng: point.x(),
    }
}
