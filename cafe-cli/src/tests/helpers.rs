//! Fixture files shared by the CLI tests.

use std::fs;

use camino::Utf8PathBuf;
use tempfile::TempDir;

/// A temporary directory holding snapshot files.
pub(super) struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub(super) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name)).expect("utf-8 workspace")
    }

    pub(super) fn write(&self, name: &str, body: &str) -> Utf8PathBuf {
        let path = self.path(name);
        fs::write(&path, body).expect("write fixture");
        path
    }

    /// Two all-night venues near Ximen and one across the city.
    pub(super) fn venues(&self) -> Utf8PathBuf {
        self.write(
            "venues.json",
            r#"[
                {"place_id": "near", "final_name": "Night Owl",
                 "location": {"type": "Point", "coordinates": [121.5100, 25.0421]},
                 "opening_hours": {"is_24_hours": true},
                 "tags": ["插座", "深夜"],
                 "ratings": {"rating": 4.6, "review_amount": 320}},
                {"place_id": "close", "final_name": "Lamp Post",
                 "location": {"type": "Point", "coordinates": [121.5120, 25.0421]},
                 "opening_hours": {"is_24_hours": true},
                 "tags": ["安靜"],
                 "ratings": {"rating": 4.3, "review_amount": 80}},
                {"place_id": "far", "final_name": "Hilltop",
                 "location": {"type": "Point", "coordinates": [121.6500, 25.0421]},
                 "opening_hours": {"is_24_hours": true},
                 "ratings": {"rating": 4.9, "review_amount": 900}}
            ]"#,
        )
    }

    pub(super) fn gazetteer(&self) -> Utf8PathBuf {
        self.write(
            "gazetteer.json",
            r#"[{"name": "Ximen", "lat": 25.0421, "lng": 121.5081, "kind": "station"}]"#,
        )
    }
}
