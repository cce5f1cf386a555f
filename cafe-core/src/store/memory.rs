//! In-memory [`VenueStore`] backed by an R\*-tree.
//!
//! Geo queries prefilter with a bounding box in degrees and then apply the
//! exact great-circle distance. Vector search is a linear cosine scan,
//! adequate for city-scale snapshots.

use std::collections::HashMap;

use async_trait::async_trait;
use geo::Point;
use rstar::{AABB, RTree, primitives::GeomWithData};

use super::{StoreError, TagFilter, VectorChannel, VectorHit, VenueStore};
use crate::{Review, Venue, names_match};

const METRES_PER_DEGREE: f64 = 111_320.0;
const MIN_LATITUDE_COSINE: f64 = 0.01;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Venue and review snapshot held in memory.
#[derive(Debug)]
pub struct MemoryVenueStore {
    venues: Vec<Venue>,
    by_id: HashMap<String, usize>,
    reviews: Vec<Review>,
    index: RTree<IndexedPoint>,
}

impl Default for MemoryVenueStore {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl MemoryVenueStore {
    /// Index `venues` and `reviews`. Later duplicates of a `place_id`
    /// replace earlier ones.
    #[must_use]
    pub fn new(venues: Vec<Venue>, reviews: Vec<Review>) -> Self {
        let mut unique: Vec<Venue> = Vec::with_capacity(venues.len());
        let mut by_id: HashMap<String, usize> = HashMap::with_capacity(venues.len());
        for venue in venues {
            if let Some(&slot) = by_id.get(&venue.place_id) {
                if let Some(existing) = unique.get_mut(slot) {
                    *existing = venue;
                }
            } else {
                by_id.insert(venue.place_id.clone(), unique.len());
                unique.push(venue);
            }
        }
        let points = unique
            .iter()
            .enumerate()
            .map(|(slot, venue)| GeomWithData::new([venue.location.x(), venue.location.y()], slot))
            .collect();
        Self {
            venues: unique,
            by_id,
            reviews,
            index: RTree::bulk_load(points),
        }
    }

    /// Create a store containing a single venue.
    #[must_use]
    pub fn with_venue(venue: Venue) -> Self {
        Self::with_venues(std::iter::once(venue))
    }

    /// Create a store from venues with no reviews.
    pub fn with_venues<I>(venues: I) -> Self
    where
        I: IntoIterator<Item = Venue>,
    {
        Self::new(venues.into_iter().collect(), Vec::new())
    }

    /// Number of distinct venues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.venues.len()
    }

    /// Whether the store holds no venues.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }

    /// Number of reviews.
    #[must_use]
    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }

    fn venue(&self, place_id: &str) -> Option<&Venue> {
        self.by_id.get(place_id).and_then(|&slot| self.venues.get(slot))
    }

    /// Venues within `radius_m` of `origin`, nearest first.
    fn within(&self, origin: Point<f64>, radius_m: f64) -> Vec<(f64, &Venue)> {
        let envelope = envelope_around(origin, radius_m);
        let mut found: Vec<(f64, &Venue)> = self
            .index
            .locate_in_envelope(&envelope)
            .filter_map(|point| self.venues.get(point.data))
            .map(|venue| (venue.distance_from(origin), venue))
            .filter(|(distance, _)| *distance <= radius_m)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.place_id.cmp(&b.1.place_id)));
        found
    }
}

/// Degree-space box that contains every point within `radius_m`.
fn envelope_around(origin: Point<f64>, radius_m: f64) -> AABB<[f64; 2]> {
    let padded = radius_m.max(0.0) * 1.01;
    let lat_span = padded / METRES_PER_DEGREE;
    let cosine = origin.y().to_radians().cos().abs().max(MIN_LATITUDE_COSINE);
    let lng_span = padded / (METRES_PER_DEGREE * cosine);
    AABB::from_corners(
        [origin.x() - lng_span, origin.y() - lat_span],
        [origin.x() + lng_span, origin.y() + lat_span],
    )
}

/// Cosine similarity mapped onto `0.0..=1.0`.
fn similarity(query: &[f32], candidate: &[f32]) -> Option<f64> {
    if query.len() != candidate.len() || query.is_empty() {
        return None;
    }
    let (mut dot, mut query_norm, mut candidate_norm) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (a, b) in query.iter().zip(candidate) {
        let (x, y) = (f64::from(*a), f64::from(*b));
        dot += x * y;
        query_norm += x * x;
        candidate_norm += y * y;
    }
    let denominator = query_norm.sqrt() * candidate_norm.sqrt();
    if denominator == 0.0 {
        return None;
    }
    Some(((1.0 + dot / denominator) / 2.0).clamp(0.0, 1.0))
}

fn best_first(hits: &mut Vec<VectorHit>, limit: usize) {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.place_id.cmp(&b.place_id))
    });
    hits.truncate(limit);
}

#[async_trait]
impl VenueStore for MemoryVenueStore {
    async fn get_many(&self, place_ids: &[String]) -> Result<Vec<Venue>, StoreError> {
        Ok(place_ids
            .iter()
            .filter_map(|id| self.venue(id))
            .cloned()
            .collect())
    }

    async fn find_by_name(
        &self,
        name: &str,
        origin: Point<f64>,
        radius_m: f64,
    ) -> Result<Vec<Venue>, StoreError> {
        Ok(self
            .within(origin, radius_m)
            .into_iter()
            .filter(|(_, venue)| {
                names_match(name, &venue.display_name) || names_match(name, &venue.original_name)
            })
            .map(|(_, venue)| venue.clone())
            .collect())
    }

    async fn vector_search(
        &self,
        channel: VectorChannel,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, StoreError> {
        let mut hits: Vec<VectorHit> = match channel {
            VectorChannel::Venue => self
                .venues
                .iter()
                .filter_map(|venue| {
                    let embedding = venue.embedding.as_deref()?;
                    Some(VectorHit {
                        place_id: venue.place_id.clone(),
                        score: similarity(vector, embedding)?,
                        text: None,
                    })
                })
                .collect(),
            VectorChannel::Review => self
                .reviews
                .iter()
                .filter_map(|review| {
                    Some(VectorHit {
                        place_id: review.place_id.clone(),
                        score: similarity(vector, &review.embedding)?,
                        text: Some(review.content.clone()),
                    })
                })
                .collect(),
        };
        best_first(&mut hits, limit);
        Ok(hits)
    }

    async fn geo_near(
        &self,
        origin: Point<f64>,
        max_m: f64,
        filter: &TagFilter,
        limit: usize,
    ) -> Result<Vec<Venue>, StoreError> {
        Ok(self
            .within(origin, max_m)
            .into_iter()
            .filter(|(_, venue)| filter.matches(&venue.tags))
            .take(limit)
            .map(|(_, venue)| venue.clone())
            .collect())
    }
}
