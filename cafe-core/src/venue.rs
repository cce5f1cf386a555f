//! Venue records and the geodesic helpers used to compare them.

use std::collections::BTreeSet;

use geo::{Distance, Haversine, Point};
use thiserror::Error;

use crate::OpeningHours;

/// Dimensionality of venue and review embeddings.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Great-circle distance in metres between two WGS84 points.
///
/// Points use `x = longitude` and `y = latitude`.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use cafe_core::distance_m;
///
/// let ximen = Point::new(121.5070, 25.0421);
/// assert!(distance_m(ximen, ximen).abs() < f64::EPSILON);
/// ```
#[must_use]
pub fn distance_m(from: Point<f64>, to: Point<f64>) -> f64 {
    Haversine.distance(from, to)
}

/// Star rating and the number of reviews behind it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ratings {
    /// Average rating on a 0–5 scale.
    pub rating: f64,
    /// Number of reviews the rating aggregates.
    pub review_amount: u32,
}

/// Structured facts about a venue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attributes {
    /// Price band, usually 1–4.
    pub price_level: Option<u8>,
    /// Operational status reported by the listing source.
    pub business_status: Option<String>,
    /// Listing categories.
    pub categories: Vec<String>,
}

/// Optional contact details.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contact {
    /// Phone number.
    pub phone: Option<String>,
    /// Website URL.
    pub website: Option<String>,
    /// Link to the venue on a map service.
    pub map_url: Option<String>,
}

/// A café record.
///
/// # Examples
///
/// ```
/// use geo::Point;
/// use cafe_core::Venue;
///
/// # fn main() -> Result<(), cafe_core::VenueError> {
/// let venue = Venue::new("p1", "Fong Da Coffee", Point::new(121.5065, 25.0433))?
///     .with_tags(["手沖精品"]);
/// assert!(venue.tags.contains("手沖精品"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Venue {
    /// Stable external identifier.
    pub place_id: String,
    /// Cleaned display name.
    pub display_name: String,
    /// Name as scraped from the listing source.
    pub original_name: String,
    /// Position with `x = longitude`, `y = latitude`.
    pub location: Point<f64>,
    /// Weekly schedule; `None` means unknown and is treated as closed.
    pub opening_hours: Option<OpeningHours>,
    /// Normalised feature tags.
    pub tags: BTreeSet<String>,
    /// Structured facts.
    pub attributes: Attributes,
    /// Rating summary.
    pub ratings: Ratings,
    /// Venue-level embedding used by macro vector search.
    pub embedding: Option<Vec<f32>>,
    /// Generated one-paragraph summary.
    pub summary: Option<String>,
    /// Contact details.
    pub contact: Contact,
    /// Precomputed distance to the nearest transit station, when known.
    pub transit_distance_m: Option<f64>,
}

/// Errors returned by [`Venue::new`] and the venue builders.
#[derive(Debug, Error, PartialEq)]
pub enum VenueError {
    /// The place identifier was blank.
    #[error("venue must have a non-empty place_id")]
    MissingPlaceId,
    /// Latitude or longitude was outside the WGS84 range.
    #[error("venue {place_id} has invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates {
        /// Offending venue.
        place_id: String,
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
    },
    /// The embedding had the wrong number of dimensions.
    #[error("venue {place_id} embedding has {found} dimensions, expected {EMBEDDING_DIMENSIONS}")]
    EmbeddingDimensions {
        /// Offending venue.
        place_id: String,
        /// Observed length.
        found: usize,
    },
}

pub(crate) fn valid_coordinates(location: Point<f64>) -> bool {
    let (lng, lat) = (location.x(), location.y());
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

impl Venue {
    /// Validates and constructs a [`Venue`] with empty optional fields.
    ///
    /// The display name doubles as the original name until
    /// [`Venue::with_original_name`] overrides it.
    ///
    /// # Errors
    /// Returns [`VenueError`] when the identifier is blank or the coordinates
    /// are not valid WGS84.
    pub fn new(
        place_id: impl Into<String>,
        display_name: impl Into<String>,
        location: Point<f64>,
    ) -> Result<Self, VenueError> {
        let id = place_id.into();
        if id.trim().is_empty() {
            return Err(VenueError::MissingPlaceId);
        }
        if !valid_coordinates(location) {
            return Err(VenueError::InvalidCoordinates {
                place_id: id,
                lat: location.y(),
                lng: location.x(),
            });
        }
        let name = display_name.into();
        Ok(Self {
            place_id: id,
            original_name: name.clone(),
            display_name: name,
            location,
            opening_hours: None,
            tags: BTreeSet::new(),
            attributes: Attributes::default(),
            ratings: Ratings::default(),
            embedding: None,
            summary: None,
            contact: Contact::default(),
            transit_distance_m: None,
        })
    }

    /// Replace the raw listing name.
    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = name.into();
        self
    }

    /// Replace the tag set.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a weekly schedule.
    #[must_use]
    pub fn with_opening_hours(mut self, hours: OpeningHours) -> Self {
        self.opening_hours = Some(hours);
        self
    }

    /// Set the rating summary.
    #[must_use]
    pub const fn with_ratings(mut self, rating: f64, review_amount: u32) -> Self {
        self.ratings = Ratings {
            rating,
            review_amount,
        };
        self
    }

    /// Attach a venue-level embedding.
    ///
    /// # Errors
    /// Returns [`VenueError::EmbeddingDimensions`] when the vector length is
    /// not [`EMBEDDING_DIMENSIONS`].
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Result<Self, VenueError> {
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(VenueError::EmbeddingDimensions {
                place_id: self.place_id,
                found: embedding.len(),
            });
        }
        self.embedding = Some(embedding);
        Ok(self)
    }

    /// Attach the generated summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Replace the contact details.
    #[must_use]
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contact = contact;
        self
    }

    /// Replace the structured attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Record the distance to the nearest transit station.
    #[must_use]
    pub const fn with_transit_distance(mut self, metres: f64) -> Self {
        self.transit_distance_m = Some(metres);
        self
    }

    /// Distance in metres from `origin` to this venue.
    #[must_use]
    pub fn distance_from(&self, origin: Point<f64>) -> f64 {
        distance_m(origin, self.location)
    }
}

/// A review excerpt with its own embedding, used by micro vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    /// Venue the review belongs to.
    pub place_id: String,
    /// Review text.
    pub content: String,
    /// Review-level embedding.
    pub embedding: Vec<f32>,
}
