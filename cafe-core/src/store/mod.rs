//! Data access traits for venues and reviews.
//!
//! The [`VenueStore`] trait is the read-only capability the sourcing paths
//! need: literal name lookup, nearest-neighbour vector search over two
//! embedding channels, and geo-proximity search with a tag filter.

use std::collections::BTreeSet;

use async_trait::async_trait;
use geo::Point;
use thiserror::Error;

use crate::Venue;

#[cfg(feature = "serde")]
mod document;
mod memory;

#[cfg(feature = "serde")]
pub use document::{
    AiTagDocument, AttributesDocument, ContactDocument, GeoJsonPoint, OpeningHoursDocument,
    PeriodDocument, RatingsDocument, ReviewDocument, VenueDocument, VenueDocumentError,
};
pub use memory::MemoryVenueStore;

/// Embedding channel searched by [`VenueStore::vector_search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorChannel {
    /// Venue-level summary vectors ("macro").
    Venue,
    /// Review-level vectors ("micro").
    Review,
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Venue the hit belongs to.
    pub place_id: String,
    /// Similarity in `0.0..=1.0`.
    pub score: f64,
    /// Review text for micro hits.
    pub text: Option<String>,
}

/// Tag constraint for geo-proximity search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagFilter {
    required: Vec<String>,
}

impl TagFilter {
    /// No constraint.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            required: Vec::new(),
        }
    }

    /// Venues must carry every one of `tags`. Order is kept so the first
    /// tag can act as the primary tag.
    pub fn all_of<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut required: Vec<String> = Vec::new();
        for tag in tags.into_iter().map(Into::into) {
            let trimmed = tag.trim();
            if !trimmed.is_empty() && !required.iter().any(|seen| seen == trimmed) {
                required.push(trimmed.to_owned());
            }
        }
        Self { required }
    }

    /// Required tags in priority order.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Filter requiring only the first tag, if there is more than one.
    #[must_use]
    pub fn primary_only(&self) -> Option<Self> {
        match self.required.as_slice() {
            [first, _, ..] => Some(Self {
                required: vec![first.clone()],
            }),
            _ => None,
        }
    }

    /// Whether `tags` satisfies the filter.
    #[must_use]
    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.required.iter().all(|tag| tags.contains(tag))
    }
}

/// Errors raised by a [`VenueStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing service or index cannot answer right now. Callers
    /// degrade to the next sourcing path.
    #[error("venue store unavailable: {message}")]
    Unavailable {
        /// Detail.
        message: String,
    },
    /// The store answered with data that violates the venue schema.
    #[error("venue store returned malformed data: {message}")]
    Malformed {
        /// Detail.
        message: String,
    },
}

/// Read-only access to venues and reviews.
///
/// Coordinates use WGS84 with `x = longitude`, `y = latitude`; distances
/// are great-circle metres.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use cafe_core::{TagFilter, Venue, VenueStore, store::MemoryVenueStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let venue = Venue::new("p1", "Fong Da Coffee", Point::new(121.5065, 25.0433))?;
/// let store = MemoryVenueStore::new(vec![venue], Vec::new());
/// let origin = Point::new(121.5081, 25.0421);
/// let found = store.geo_near(origin, 3000.0, &TagFilter::any(), 50).await?;
/// assert_eq!(found.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait VenueStore: Send + Sync {
    /// Fetch venues by identifier. Unknown identifiers are skipped.
    async fn get_many(&self, place_ids: &[String]) -> Result<Vec<Venue>, StoreError>;

    /// Venues whose display or original name matches `name` within
    /// `radius_m` of `origin`.
    async fn find_by_name(
        &self,
        name: &str,
        origin: Point<f64>,
        radius_m: f64,
    ) -> Result<Vec<Venue>, StoreError>;

    /// Up to `limit` nearest neighbours of `vector` in `channel`, best first.
    async fn vector_search(
        &self,
        channel: VectorChannel,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<VectorHit>, StoreError>;

    /// Up to `limit` venues within `max_m` of `origin` that satisfy
    /// `filter`, nearest first.
    async fn geo_near(
        &self,
        origin: Point<f64>,
        max_m: f64,
        filter: &TagFilter,
        limit: usize,
    ) -> Result<Vec<Venue>, StoreError>;
}
