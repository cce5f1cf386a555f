//! Candidate sourcing: literal name, then semantic, then tag search.
//!
//! Paths run strictly in order and the first one that yields candidates
//! wins. Every path drops blacklisted venues and, when a check time is
//! set, venues that are not open then. A store that reports
//! [`StoreError::Unavailable`] or an embedder that fails degrades to the
//! next path; a malformed store response is returned as an error.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use cafe_core::{
    Candidate, EmbeddingTask, Embedder, MatchType, StoreError, TagFilter, VectorChannel,
    VectorHit, Venue, VenueStore, is_open,
};
use chrono::NaiveDateTime;
use geo::Point;
use log::{debug, info, warn};

use crate::config::SourcingConfig;

/// Inputs for one sourcing run.
#[derive(Debug, Clone, Copy)]
pub struct SourceRequest<'a> {
    /// Search origin.
    pub origin: Point<f64>,
    /// Residual query text after place names and filler are removed.
    pub query: Option<&'a str>,
    /// Tags every tag-path venue must carry.
    pub tags: &'a TagFilter,
    /// Venues never to return.
    pub blacklist: &'a BTreeSet<String>,
    /// Local instant candidates must be open at; `None` skips the check.
    pub check_time: Option<NaiveDateTime>,
}

/// Candidates from the first productive path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sourced {
    /// Path that produced the candidates; `None` when every path came up
    /// empty.
    pub match_type: Option<MatchType>,
    /// The candidates, unscored.
    pub candidates: Vec<Candidate>,
}

impl Sourced {
    fn from_path(match_type: MatchType, candidates: Vec<Candidate>) -> Option<Self> {
        if candidates.is_empty() {
            None
        } else {
            Some(Self {
                match_type: Some(match_type),
                candidates,
            })
        }
    }
}

#[derive(Debug, Default)]
struct Fused {
    macro_score: f64,
    micro_score: f64,
    review: Option<String>,
}

impl Fused {
    #[expect(clippy::float_arithmetic, reason = "weighted channel fusion")]
    fn score(&self, config: &SourcingConfig) -> f64 {
        (config.macro_weight * self.macro_score + config.micro_weight * self.micro_score)
            .clamp(0.0, 1.0)
    }
}

/// Merge macro and micro hits by venue. The best micro hit keeps its
/// review text; a channel that did not return a venue contributes zero.
fn fuse(macro_hits: Vec<VectorHit>, micro_hits: Vec<VectorHit>) -> HashMap<String, Fused> {
    let mut fused: HashMap<String, Fused> = HashMap::new();
    for hit in macro_hits {
        let entry = fused.entry(hit.place_id).or_default();
        entry.macro_score = entry.macro_score.max(hit.score);
    }
    for hit in micro_hits {
        let entry = fused.entry(hit.place_id).or_default();
        if hit.score > entry.micro_score {
            entry.micro_score = hit.score;
            entry.review = hit.text;
        }
    }
    fused
}

/// Tries the name, vector, and tag paths in order.
#[derive(Clone)]
pub struct CandidateSourcer {
    store: Arc<dyn VenueStore>,
    embedder: Arc<dyn Embedder>,
    config: SourcingConfig,
}

impl CandidateSourcer {
    /// Source from `store`, embedding queries with `embedder`.
    #[must_use]
    pub fn new(
        store: Arc<dyn VenueStore>,
        embedder: Arc<dyn Embedder>,
        config: SourcingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// The sourcing limits in force.
    #[must_use]
    pub const fn config(&self) -> &SourcingConfig {
        &self.config
    }

    /// Run the paths in order and return the first non-empty result.
    ///
    /// # Errors
    /// Returns [`StoreError::Malformed`] when the store answers with data
    /// that violates the venue schema.
    pub async fn source(&self, request: &SourceRequest<'_>) -> Result<Sourced, StoreError> {
        if let Some(query) = request.query {
            if let Some(found) = self.name_path(request, query).await? {
                return Ok(found);
            }
            if let Some(found) = self.vector_path(request, query).await? {
                return Ok(found);
            }
        }
        Ok(self.tag_path(request).await?.unwrap_or_default())
    }

    fn admissible(&self, venue: &Venue, request: &SourceRequest<'_>) -> bool {
        if request.blacklist.contains(&venue.place_id) {
            debug!("dropping blacklisted venue {}", venue.place_id);
            return false;
        }
        request
            .check_time
            .is_none_or(|at| is_open(venue.opening_hours.as_ref(), at))
    }

    async fn name_path(
        &self,
        request: &SourceRequest<'_>,
        query: &str,
    ) -> Result<Option<Sourced>, StoreError> {
        let venues = match self
            .store
            .find_by_name(query, request.origin, self.config.name_radius_m)
            .await
        {
            Ok(venues) => venues,
            Err(StoreError::Unavailable { message }) => {
                warn!("name search unavailable, trying semantic search: {message}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let found = venues.len();
        let candidates: Vec<Candidate> = venues
            .into_iter()
            .filter(|venue| self.admissible(venue, request))
            .map(|venue| {
                let distance = venue.distance_from(request.origin);
                Candidate::new(venue, distance, MatchType::Name, 1.0)
            })
            .collect();
        info!("name path matched {found} venues; {} admissible", candidates.len());
        Ok(Sourced::from_path(MatchType::Name, candidates))
    }

    async fn channel(
        &self,
        channel: VectorChannel,
        vector: &[f32],
    ) -> Result<Vec<VectorHit>, StoreError> {
        self.store
            .vector_search(channel, vector, self.config.vector_k)
            .await
    }

    async fn vector_path(
        &self,
        request: &SourceRequest<'_>,
        query: &str,
    ) -> Result<Option<Sourced>, StoreError> {
        let vector = match self.embedder.embed(query, EmbeddingTask::Query).await {
            Ok(vector) => vector,
            Err(err) => {
                warn!("embedding failed, skipping semantic search: {err}");
                return Ok(None);
            }
        };
        let (macro_result, micro_result) = tokio::join!(
            self.channel(VectorChannel::Venue, &vector),
            self.channel(VectorChannel::Review, &vector)
        );
        let (macro_hits, micro_hits) = match (macro_result, micro_result) {
            (Err(StoreError::Unavailable { message }), Err(StoreError::Unavailable { .. })) => {
                warn!("vector index unavailable, trying tag search: {message}");
                return Ok(None);
            }
            (Err(err @ StoreError::Malformed { .. }), _)
            | (_, Err(err @ StoreError::Malformed { .. })) => return Err(err),
            (macro_found, micro_found) => (
                macro_found.unwrap_or_else(|err| {
                    warn!("macro channel unavailable: {err}");
                    Vec::new()
                }),
                micro_found.unwrap_or_else(|err| {
                    warn!("micro channel unavailable: {err}");
                    Vec::new()
                }),
            ),
        };
        info!(
            "vector path: {} macro and {} micro hits",
            macro_hits.len(),
            micro_hits.len()
        );
        let mut fused = fuse(macro_hits, micro_hits);
        let mut ids: Vec<String> = fused.keys().cloned().collect();
        ids.sort();
        let venues = match self.store.get_many(&ids).await {
            Ok(venues) => venues,
            Err(StoreError::Unavailable { message }) => {
                warn!("venue lookup unavailable, trying tag search: {message}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let mut candidates: Vec<Candidate> = venues
            .into_iter()
            .filter(|venue| self.admissible(venue, request))
            .filter_map(|venue| {
                let distance = venue.distance_from(request.origin);
                if distance > self.config.max_distance_m {
                    debug!("dropping {} at {distance:.0} m", venue.place_id);
                    return None;
                }
                let hit = fused.remove(&venue.place_id)?;
                let score = hit.score(&self.config);
                Some(
                    Candidate::new(venue, distance, MatchType::Vector, score)
                        .with_matched_review(hit.review),
                )
            })
            .collect();
        candidates.sort_by(|a, b| b.vector_score.total_cmp(&a.vector_score));
        info!(
            "vector path kept {} of {} venues",
            candidates.len(),
            ids.len()
        );
        Ok(Sourced::from_path(MatchType::Vector, candidates))
    }

    async fn geo_candidates(
        &self,
        request: &SourceRequest<'_>,
        filter: &TagFilter,
    ) -> Result<Vec<Candidate>, StoreError> {
        let venues = self
            .store
            .geo_near(
                request.origin,
                self.config.max_distance_m,
                filter,
                self.config.tag_limit.saturating_add(request.blacklist.len()),
            )
            .await?;
        Ok(venues
            .into_iter()
            .filter(|venue| !request.blacklist.contains(&venue.place_id))
            .take(self.config.tag_limit)
            .filter(|venue| self.admissible(venue, request))
            .map(|venue| {
                let distance = venue.distance_from(request.origin);
                Candidate::new(venue, distance, MatchType::Tag, self.config.tag_vector_score)
            })
            .collect())
    }

    async fn tag_path(&self, request: &SourceRequest<'_>) -> Result<Option<Sourced>, StoreError> {
        let mut candidates = match self.geo_candidates(request, request.tags).await {
            Ok(found) => found,
            Err(StoreError::Unavailable { message }) => {
                warn!("geo search unavailable: {message}");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        if candidates.is_empty() {
            if let Some(primary) = request.tags.primary_only() {
                info!(
                    "no venue carries all of {:?}; retrying with {:?}",
                    request.tags.required(),
                    primary.required()
                );
                candidates = match self.geo_candidates(request, &primary).await {
                    Ok(found) => found,
                    Err(StoreError::Unavailable { message }) => {
                        warn!("geo search unavailable: {message}");
                        return Ok(None);
                    }
                    Err(err) => return Err(err),
                };
            }
        }
        info!("tag path found {} candidates", candidates.len());
        Ok(Sourced::from_path(MatchType::Tag, candidates))
    }
}
