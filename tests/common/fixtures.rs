//! Test fixtures: a temp data directory with a small municipality reference
//! set, plus record builders.

use std::path::PathBuf;
use std::sync::Arc;

use bandmap_refresh::config::RefreshSettings;
use bandmap_refresh::fetcher::RawGigRecord;
use bandmap_refresh::geodata::{load_municipalities, MunicipalityIndex};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

/// Three-municipality reference set: Zürich, Genève, Aarau.
const REFERENCE_GEOJSON: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"gemeinde.NAME": "Zürich", "kanton.KUERZEL": "ZH", "gemeinde.BFS_NUMMER": 261},
            "geometry": {"type": "Polygon", "coordinates": [[[8.4, 47.3], [8.6, 47.3], [8.6, 47.4], [8.4, 47.4], [8.4, 47.3]]]}
        },
        {
            "type": "Feature",
            "properties": {"gemeinde.NAME": "Genève", "kanton.KUERZEL": "GE", "gemeinde.BFS_NUMMER": 6621},
            "geometry": {"type": "Polygon", "coordinates": [[[6.1, 46.1], [6.2, 46.1], [6.2, 46.2], [6.1, 46.2], [6.1, 46.1]]]}
        },
        {
            "type": "Feature",
            "properties": {"gemeinde.NAME": "Aarau", "kanton.KUERZEL": "AG", "gemeinde.BFS_NUMMER": 4001},
            "geometry": {"type": "Polygon", "coordinates": [[[8.0, 47.3], [8.1, 47.3], [8.1, 47.4], [8.0, 47.4], [8.0, 47.3]]]}
        }
    ]
}"#;

/// One refresh pipeline under test: temp artifact directory, loaded
/// reference set, and settings tuned for fast tests (no real backoff).
pub struct TestHarness {
    pub dir: TempDir,
    pub index: Arc<MunicipalityIndex>,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let geodata_path = dir.path().join("gemeinden.geojson");
        std::fs::write(&geodata_path, REFERENCE_GEOJSON).unwrap();
        let index = Arc::new(load_municipalities(&geodata_path).unwrap());
        Self { dir, index }
    }

    pub fn settings(&self) -> RefreshSettings {
        RefreshSettings {
            data_dir: self.dir.path().to_path_buf(),
            staleness_hours: 24,
            fuzzy_threshold: 0.80,
            simplify_tolerance: 0.007,
            force: false,
            max_fetch_attempts: 3,
            initial_backoff_secs: 0,
            max_backoff_secs: 0,
            backoff_multiplier: 1.0,
        }
    }

    pub fn forced_settings(&self) -> RefreshSettings {
        RefreshSettings {
            force: true,
            ..self.settings()
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.settings().artifact_path()
    }

    pub fn artifact_bytes(&self) -> Vec<u8> {
        std::fs::read(self.artifact_path()).unwrap()
    }
}

/// Build a gig record the way the fetcher would after post-processing.
pub fn gig(location: &str, band: &str, day: u32) -> RawGigRecord {
    RawGigRecord {
        band_name: Some(band.to_string()),
        band_id: Some(4711),
        event_name: None,
        venue: Some("Roxy Bar".to_string()),
        location: location.to_string(),
        canton: "ZH".to_string(),
        date: Some(Utc.with_ymd_and_hms(2026, 9, day, 20, 30, 0).unwrap()),
        band_image_thumb: None,
        band_categories: vec!["Rock".to_string()],
        mx3_url: Some("https://mx3.ch/bands/4711".to_string()),
        venue_url: None,
    }
}
