//! Request-scoped venue annotations.

use std::fmt;

use crate::Venue;

/// Which sourcing path produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatchType {
    /// Literal venue-name match.
    Name,
    /// Semantic nearest-neighbour match.
    Vector,
    /// Geo-proximity match with optional tag filter.
    Tag,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Vector => "vector",
            Self::Tag => "tag",
        })
    }
}

/// A venue annotated for one recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The venue.
    pub venue: Venue,
    /// Distance from the search origin in metres.
    pub dist_meters: f64,
    /// Path that produced the candidate.
    pub match_type: MatchType,
    /// Semantic confidence in `0.0..=1.0`.
    pub vector_score: f64,
    /// Review text that drove a micro vector match.
    pub matched_review: Option<String>,
    /// Final ranking score; zero until scored.
    pub search_score: f64,
}

impl Candidate {
    /// Annotate `venue` with its distance and sourcing path.
    #[must_use]
    pub const fn new(venue: Venue, dist_meters: f64, match_type: MatchType, vector_score: f64) -> Self {
        Self {
            venue,
            dist_meters,
            match_type,
            vector_score,
            matched_review: None,
            search_score: 0.0,
        }
    }

    /// Attach the supporting review text.
    #[must_use]
    pub fn with_matched_review(mut self, review: Option<String>) -> Self {
        self.matched_review = review;
        self
    }

    /// Identifier of the underlying venue.
    #[must_use]
    pub fn place_id(&self) -> &str {
        &self.venue.place_id
    }
}
