//! Load venue, review, and gazetteer snapshots from JSON files.
//!
//! Venue and review files hold a JSON array of raw store documents. They
//! pass through the typed conversion in [`cafe_core::store`], so malformed
//! documents are skipped with a warning rather than failing the load. The
//! gazetteer file is an array of `{name, lat, lng, kind}` objects.

use std::io::{self, BufReader};

use cafe_core::store::{MemoryVenueStore, ReviewDocument, VenueDocument};
use cafe_core::{Gazetteer, GazetteerEntry, PlaceKind};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use geo::Point;
use log::{info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised while loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be opened.
    #[error("failed to open snapshot {path}: {source}")]
    Open {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file was not a JSON array of the expected documents.
    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// One gazetteer row as stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GazetteerDocument {
    /// Name as it appears in user text.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Category; defaults to a district.
    #[serde(default)]
    pub kind: PlaceKind,
}

impl GazetteerDocument {
    fn into_entry(self) -> Option<GazetteerEntry> {
        let valid = self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
            && !self.name.trim().is_empty();
        if !valid {
            warn!("skipping invalid gazetteer entry {:?}", self.name);
            return None;
        }
        Some(GazetteerEntry::new(
            self.name.trim(),
            Point::new(self.lng, self.lat),
            self.kind,
        ))
    }
}

fn read_array<T: DeserializeOwned>(path: &Utf8Path) -> Result<Vec<T>, SnapshotError> {
    let file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(|source| {
        SnapshotError::Open {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build an in-memory venue store from a venue file and an optional review
/// file.
///
/// # Errors
/// Returns [`SnapshotError`] when either file cannot be opened or parsed.
pub fn load_store(
    venues_path: &Utf8Path,
    reviews_path: Option<&Utf8Path>,
) -> Result<MemoryVenueStore, SnapshotError> {
    let venues: Vec<VenueDocument> = read_array(venues_path)?;
    let reviews: Vec<ReviewDocument> = match reviews_path {
        Some(path) => read_array(path)?,
        None => Vec::new(),
    };
    let (venue_documents, review_documents) = (venues.len(), reviews.len());
    let store = MemoryVenueStore::from_documents(venues, reviews);
    info!(
        "loaded {} of {venue_documents} venues and {} of {review_documents} reviews",
        store.len(),
        store.review_count()
    );
    Ok(store)
}

/// Load a gazetteer, skipping entries with blank names or out-of-range
/// coordinates.
///
/// # Errors
/// Returns [`SnapshotError`] when the file cannot be opened or parsed.
pub fn load_gazetteer(path: &Utf8Path) -> Result<Gazetteer, SnapshotError> {
    let documents: Vec<GazetteerDocument> = read_array(path)?;
    let entries: Vec<GazetteerEntry> = documents
        .into_iter()
        .filter_map(GazetteerDocument::into_entry)
        .collect();
    info!("loaded {} gazetteer entries from {path}", entries.len());
    Ok(Gazetteer::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn write(dir: &TempDir, name: &str, body: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 temp path");
        fs::write(&path, body).expect("write fixture");
        path
    }

    #[rstest]
    fn loads_venues_and_skips_malformed_documents(dir: TempDir) {
        let venues = write(
            &dir,
            "venues.json",
            r#"[
                {"place_id": "p1", "final_name": "Fong Da Coffee",
                 "location": {"type": "Point", "coordinates": [121.5065, 25.0433]}},
                {"place_id": "p2"}
            ]"#,
        );
        let store = load_store(&venues, None).expect("load store");
        assert_eq!(store.len(), 1);
        assert_eq!(store.review_count(), 0);
    }

    #[rstest]
    fn loads_reviews_alongside_venues(dir: TempDir) {
        let venues = write(
            &dir,
            "venues.json",
            r#"[{"place_id": "p1", "location": {"coordinates": [121.5, 25.0]}}]"#,
        );
        let embedding = serde_json::to_string(&vec![0.5_f32; cafe_core::EMBEDDING_DIMENSIONS])
            .expect("serialise embedding");
        let reviews = write(
            &dir,
            "reviews.json",
            &format!(
                r#"[{{"place_id": "p1", "content": "quiet with sockets", "embedding": {embedding}}},
                    {{"place_id": "p1", "content": "no vector"}}]"#
            ),
        );
        let store = load_store(&venues, Some(&reviews)).expect("load store");
        assert_eq!(store.review_count(), 1);
    }

    #[rstest]
    fn missing_file_is_an_open_error(dir: TempDir) {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.json")).expect("utf-8");
        let err = load_store(&path, None).expect_err("missing file");
        assert!(matches!(err, SnapshotError::Open { .. }));
    }

    #[rstest]
    fn non_array_is_a_parse_error(dir: TempDir) {
        let path = write(&dir, "venues.json", r#"{"place_id": "p1"}"#);
        let err = load_store(&path, None).expect_err("object instead of array");
        assert!(matches!(err, SnapshotError::Parse { .. }));
    }

    #[rstest]
    fn loads_gazetteer_with_kinds(dir: TempDir) {
        let path = write(
            &dir,
            "gazetteer.json",
            r#"[
                {"name": "Ximen", "lat": 25.0421, "lng": 121.5081, "kind": "station"},
                {"name": "Yongkang Street", "lat": 25.0330, "lng": 121.5297},
                {"name": " ", "lat": 25.0, "lng": 121.5},
                {"name": "Nowhere", "lat": 120.0, "lng": 121.5}
            ]"#,
        );
        let gazetteer = load_gazetteer(&path).expect("load gazetteer");
        assert_eq!(gazetteer.entries().len(), 2);
        assert_eq!(gazetteer.stations(), vec![Point::new(121.5081, 25.0421)]);
    }
}
