//! Raw store documents and their conversion into typed records.
//!
//! Documents mirror what the ETL pipeline writes: every field is optional
//! and unknown fields are ignored. [`TryFrom`] conversions are the only way
//! from a document to a [`Venue`] or [`Review`], so invalid records are
//! rejected at the boundary instead of surfacing as missing keys later.

use std::collections::BTreeSet;

use geo::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    Attributes, Contact, EMBEDDING_DIMENSIONS, OpeningHours, OpeningHoursError, Period, Review,
    Venue, VenueError,
};

/// `GeoJSON` point with `[longitude, latitude]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    /// `[longitude, latitude]`.
    pub coordinates: Vec<f64>,
}

impl GeoJsonPoint {
    fn point(&self) -> Option<Point<f64>> {
        match self.coordinates.as_slice() {
            [lng, lat] => Some(Point::new(*lng, *lat)),
            _ => None,
        }
    }
}

/// One opening interval as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodDocument {
    /// Sunday-based day index.
    pub day: u8,
    /// Opening minute since midnight.
    pub open: u32,
    /// Closing minute since midnight.
    #[serde(default)]
    pub close: Option<u32>,
    /// Whether the period spans midnight.
    #[serde(default)]
    pub is_overnight: bool,
}

/// Weekly schedule as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpeningHoursDocument {
    /// Never closes.
    #[serde(default)]
    pub is_24_hours: bool,
    /// Opening intervals.
    #[serde(default)]
    pub periods: Vec<PeriodDocument>,
}

/// Rating summary as stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingsDocument {
    /// Average rating.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Review count.
    #[serde(default)]
    pub review_amount: Option<u32>,
}

/// Contact details as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactDocument {
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Website URL.
    #[serde(default)]
    pub website: Option<String>,
    /// Map link.
    #[serde(default, alias = "google_maps_url")]
    pub map_url: Option<String>,
}

/// Structured attributes as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributesDocument {
    /// Price band.
    #[serde(default)]
    pub price_level: Option<u8>,
    /// Operational status.
    #[serde(default)]
    pub business_status: Option<String>,
    /// Listing categories.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Weighted tag emitted by the tagging pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTagDocument {
    /// Canonical tag.
    pub tag: String,
}

/// A venue document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VenueDocument {
    /// Stable identifier.
    #[serde(default)]
    pub place_id: Option<String>,
    /// Cleaned name.
    #[serde(default, alias = "final_name")]
    pub display_name: Option<String>,
    /// Raw listing name.
    #[serde(default)]
    pub original_name: Option<String>,
    /// Position.
    #[serde(default)]
    pub location: Option<GeoJsonPoint>,
    /// Weekly schedule.
    #[serde(default)]
    pub opening_hours: Option<OpeningHoursDocument>,
    /// Plain tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pipeline tags; merged with `tags`.
    #[serde(default)]
    pub ai_tags: Vec<AiTagDocument>,
    /// Structured facts.
    #[serde(default)]
    pub attributes: Option<AttributesDocument>,
    /// Rating summary.
    #[serde(default)]
    pub ratings: Option<RatingsDocument>,
    /// Venue-level embedding.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Generated summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// Contact details.
    #[serde(default)]
    pub contact: Option<ContactDocument>,
    /// Distance to the nearest transit station in metres.
    #[serde(default)]
    pub transit_distance_m: Option<f64>,
}

/// A review document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewDocument {
    /// Venue the review belongs to.
    #[serde(default)]
    pub place_id: Option<String>,
    /// Review text.
    #[serde(default)]
    pub content: Option<String>,
    /// Review-level embedding.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// Reasons a document cannot become a typed record.
#[derive(Debug, Error, PartialEq)]
pub enum VenueDocumentError {
    /// No identifier.
    #[error("document has no place_id")]
    MissingPlaceId,
    /// No usable `[lng, lat]` pair.
    #[error("document {place_id} has no usable location")]
    MissingLocation {
        /// Offending document.
        place_id: String,
    },
    /// An opening period was out of range.
    #[error("document {place_id} has an invalid opening period")]
    InvalidPeriod {
        /// Offending document.
        place_id: String,
        /// Underlying validation error.
        #[source]
        source: OpeningHoursError,
    },
    /// The typed venue constructor rejected the document.
    #[error(transparent)]
    Venue(#[from] VenueError),
    /// A review had no text.
    #[error("review for {place_id} has no content")]
    MissingContent {
        /// Venue the review belongs to.
        place_id: String,
    },
    /// A review embedding was absent or had the wrong length.
    #[error("review for {place_id} has no {EMBEDDING_DIMENSIONS}-dimension embedding")]
    MissingEmbedding {
        /// Venue the review belongs to.
        place_id: String,
    },
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

impl OpeningHoursDocument {
    fn into_hours(self, place_id: &str) -> Result<OpeningHours, VenueDocumentError> {
        let periods = self
            .periods
            .into_iter()
            .map(|p| Period::new(p.day, p.open, p.close, p.is_overnight))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| VenueDocumentError::InvalidPeriod {
                place_id: place_id.to_owned(),
                source,
            })?;
        Ok(OpeningHours {
            periods,
            is_24_hours: self.is_24_hours,
        })
    }
}

impl TryFrom<VenueDocument> for Venue {
    type Error = VenueDocumentError;

    fn try_from(document: VenueDocument) -> Result<Self, Self::Error> {
        let place_id = non_blank(document.place_id).ok_or(VenueDocumentError::MissingPlaceId)?;
        let location = document
            .location
            .as_ref()
            .and_then(GeoJsonPoint::point)
            .ok_or_else(|| VenueDocumentError::MissingLocation {
                place_id: place_id.clone(),
            })?;
        let original_name = non_blank(document.original_name);
        let display_name = non_blank(document.display_name)
            .or_else(|| original_name.clone())
            .unwrap_or_else(|| place_id.clone());
        let opening_hours = document
            .opening_hours
            .map(|hours| hours.into_hours(&place_id))
            .transpose()?;
        let tags: BTreeSet<String> = document
            .tags
            .into_iter()
            .chain(document.ai_tags.into_iter().map(|t| t.tag))
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect();
        let ratings = document.ratings.unwrap_or_default();
        let attributes = document.attributes.unwrap_or_default();
        let contact = document.contact.unwrap_or_default();

        let mut venue = Self::new(place_id, display_name.clone(), location)?
            .with_original_name(original_name.unwrap_or(display_name))
            .with_tags(tags)
            .with_ratings(
                ratings.rating.filter(|r| r.is_finite()).unwrap_or_default().clamp(0.0, 5.0),
                ratings.review_amount.unwrap_or_default(),
            )
            .with_attributes(Attributes {
                price_level: attributes.price_level,
                business_status: attributes.business_status,
                categories: attributes.categories,
            })
            .with_contact(Contact {
                phone: non_blank(contact.phone),
                website: non_blank(contact.website),
                map_url: non_blank(contact.map_url),
            });
        venue.opening_hours = opening_hours;
        venue.summary = non_blank(document.summary);
        venue.transit_distance_m = document.transit_distance_m.filter(|m| m.is_finite() && *m >= 0.0);
        if let Some(embedding) = document.embedding {
            venue = venue.with_embedding(embedding)?;
        }
        Ok(venue)
    }
}

impl TryFrom<ReviewDocument> for Review {
    type Error = VenueDocumentError;

    fn try_from(document: ReviewDocument) -> Result<Self, Self::Error> {
        let place_id = non_blank(document.place_id).ok_or(VenueDocumentError::MissingPlaceId)?;
        let Some(content) = non_blank(document.content) else {
            return Err(VenueDocumentError::MissingContent { place_id });
        };
        let embedding = document
            .embedding
            .filter(|vector| vector.len() == EMBEDDING_DIMENSIONS)
            .ok_or_else(|| VenueDocumentError::MissingEmbedding {
                place_id: place_id.clone(),
            })?;
        Ok(Self {
            place_id,
            content,
            embedding,
        })
    }
}

impl super::MemoryVenueStore {
    /// Build a store from raw documents, skipping and logging any that fail
    /// validation.
    #[must_use]
    pub fn from_documents(venues: Vec<VenueDocument>, reviews: Vec<ReviewDocument>) -> Self {
        let typed_venues = venues
            .into_iter()
            .filter_map(|document| match Venue::try_from(document) {
                Ok(venue) => Some(venue),
                Err(err) => {
                    log::warn!("skipping malformed venue document: {err}");
                    None
                }
            })
            .collect();
        let typed_reviews = reviews
            .into_iter()
            .filter_map(|document| match Review::try_from(document) {
                Ok(review) => Some(review),
                Err(err) => {
                    log::warn!("skipping malformed review document: {err}");
                    None
                }
            })
            .collect();
        Self::new(typed_venues, typed_reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> VenueDocument {
        serde_json::from_value(value).expect("document shape")
    }

    #[rstest]
    fn converts_a_complete_document() {
        let document = parse(json!({
            "place_id": "p1",
            "final_name": "Fong Da Coffee",
            "original_name": "蜂大咖啡 Fong Da Coffee",
            "location": { "type": "Point", "coordinates": [121.5065, 25.0433] },
            "opening_hours": {
                "is_24_hours": false,
                "periods": [{ "day": 1, "open": 480, "close": 1320, "is_overnight": false }]
            },
            "tags": ["手沖精品"],
            "ai_tags": [{ "tag": "老宅", "score": 0.9 }],
            "ratings": { "rating": 4.4, "review_amount": 812 },
            "contact": { "phone": "02-2371-9577", "google_maps_url": "" }
        }));
        let venue = Venue::try_from(document).expect("valid document");
        assert_eq!(venue.display_name, "Fong Da Coffee");
        assert_eq!(venue.original_name, "蜂大咖啡 Fong Da Coffee");
        assert!(venue.tags.contains("老宅") && venue.tags.contains("手沖精品"));
        assert_eq!(venue.ratings.review_amount, 812);
        assert_eq!(venue.contact.map_url, None);
        assert_eq!(venue.opening_hours.map(|h| h.periods.len()), Some(1));
    }

    #[rstest]
    fn missing_hours_stay_unknown() {
        let document = parse(json!({
            "place_id": "p2",
            "location": { "coordinates": [121.5, 25.0] }
        }));
        let venue = Venue::try_from(document).expect("valid document");
        assert_eq!(venue.opening_hours, None);
        assert_eq!(venue.display_name, "p2");
    }

    #[rstest]
    #[case(json!({ "location": { "coordinates": [121.5, 25.0] } }), "no place_id")]
    #[case(json!({ "place_id": "p", "location": { "coordinates": [121.5] } }), "no usable location")]
    #[case(json!({ "place_id": "p", "location": { "coordinates": [121.5, 95.0] } }), "invalid coordinates")]
    #[case(
        json!({
            "place_id": "p",
            "location": { "coordinates": [121.5, 25.0] },
            "opening_hours": { "periods": [{ "day": 9, "open": 0 }] }
        }),
        "invalid opening period"
    )]
    fn rejects_invalid_documents(#[case] value: serde_json::Value, #[case] expected: &str) {
        let err = Venue::try_from(parse(value)).expect_err("invalid document");
        assert!(err.to_string().contains(expected), "got {err}");
    }

    #[rstest]
    fn store_skips_malformed_documents() {
        let good = parse(json!({ "place_id": "ok", "location": { "coordinates": [121.5, 25.0] } }));
        let bad = parse(json!({ "place_id": "bad" }));
        let review = ReviewDocument {
            place_id: Some("ok".into()),
            content: Some("great pour-over".into()),
            embedding: Some(vec![0.0; 4]),
        };
        let store = super::super::MemoryVenueStore::from_documents(vec![good, bad], vec![review]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.review_count(), 0);
    }
}
