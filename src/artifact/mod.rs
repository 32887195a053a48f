//! The refresh artifact: municipality-keyed aggregates plus summary
//! statistics and simplified boundary geometry, serialized as one JSON file
//! for the presentation layer.

mod writer;

pub use writer::{artifact_timestamp, load_artifact, write_artifact, ArtifactError};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use geo::Simplify;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::geodata::{Municipality, MunicipalityIndex};
use crate::reconcile::{MatchConfidence, MatchResult};

/// One matched gig inside a municipality aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GigEntry {
    pub date: Option<DateTime<Utc>>,
    pub band_name: Option<String>,
    pub event_name: Option<String>,
    pub venue: Option<String>,
    pub canton: String,
    pub location: String,
    pub band_image_thumb: Option<String>,
    pub band_categories: Vec<String>,
    pub mx3_url: Option<String>,
    pub venue_url: Option<String>,
    pub match_confidence: MatchConfidence,
    pub match_score: Option<f64>,
}

/// Per-municipality slice of the artifact. Emitted for every municipality in
/// the reference set, including those without gigs, so the map can render the
/// "no gigs" state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityAggregate {
    pub name: String,
    pub canton: Option<String>,
    pub bfs_number: Option<i64>,
    pub gig_count: usize,
    pub gigs: Vec<GigEntry>,
}

/// Match-quality statistics for operational monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub total_fetched: usize,
    pub total_matched: usize,
    pub matched_exact: usize,
    pub matched_fuzzy: usize,
    pub unmatched_count: usize,
    /// Unique non-empty location strings that failed to match, sorted.
    pub unmatched_locations: Vec<String>,
    pub municipalities_with_gigs: usize,
    pub total_municipalities: usize,
}

/// The durable output of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshArtifact {
    pub generated_at: DateTime<Utc>,
    pub aggregates: Vec<MunicipalityAggregate>,
    pub summary: ArtifactSummary,
    /// Simplified boundary geometry for municipalities with at least one
    /// gig, sized for web rendering.
    pub geo: geojson::FeatureCollection,
}

/// Group match results into the artifact.
///
/// Aggregates come out in canonical-name order with exactly one entry per
/// reference municipality; gigs within a municipality are ordered by event
/// date ascending (undated first), ties broken by band name.
pub fn aggregate(
    matches: Vec<MatchResult>,
    index: &MunicipalityIndex,
    generated_at: DateTime<Utc>,
    simplify_tolerance: f64,
) -> RefreshArtifact {
    let total_fetched = matches.len();
    let mut matched_exact = 0;
    let mut matched_fuzzy = 0;
    let mut unmatched_count = 0;
    let mut unmatched_locations: BTreeSet<String> = BTreeSet::new();
    let mut gigs_per_municipality: Vec<Vec<GigEntry>> = vec![Vec::new(); index.len()];

    for result in matches {
        match result.confidence {
            MatchConfidence::Exact => matched_exact += 1,
            MatchConfidence::Fuzzy => matched_fuzzy += 1,
            MatchConfidence::Unmatched => {
                unmatched_count += 1;
                if !result.record.location.trim().is_empty() {
                    unmatched_locations.insert(result.record.location.clone());
                }
                continue;
            }
        }
        let position = result
            .municipality
            .expect("matched result always carries a municipality");
        gigs_per_municipality[position].push(gig_entry(result));
    }

    for gigs in &mut gigs_per_municipality {
        gigs.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.band_name.cmp(&b.band_name)));
    }

    let features: Vec<geojson::Feature> = index
        .iter()
        .zip(&gigs_per_municipality)
        .filter(|(_, gigs)| !gigs.is_empty())
        .map(|(municipality, gigs)| simplified_feature(municipality, gigs.len(), simplify_tolerance))
        .collect();

    let municipalities_with_gigs = features.len();
    let aggregates: Vec<MunicipalityAggregate> = index
        .iter()
        .zip(gigs_per_municipality)
        .map(|(municipality, gigs)| MunicipalityAggregate {
            name: municipality.name.clone(),
            canton: municipality.canton.clone(),
            bfs_number: municipality.bfs_number,
            gig_count: gigs.len(),
            gigs,
        })
        .collect();

    let total_matched = matched_exact + matched_fuzzy;
    info!(
        "Aggregated {} gigs across {} municipalities ({} unmatched locations)",
        total_matched,
        municipalities_with_gigs,
        unmatched_locations.len()
    );

    RefreshArtifact {
        generated_at,
        aggregates,
        summary: ArtifactSummary {
            total_fetched,
            total_matched,
            matched_exact,
            matched_fuzzy,
            unmatched_count,
            unmatched_locations: unmatched_locations.into_iter().collect(),
            municipalities_with_gigs,
            total_municipalities: index.len(),
        },
        geo: geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        },
    }
}

fn gig_entry(result: MatchResult) -> GigEntry {
    let record = result.record;
    GigEntry {
        date: record.date,
        band_name: record.band_name,
        event_name: record.event_name,
        venue: record.venue,
        canton: record.canton,
        location: record.location,
        band_image_thumb: record.band_image_thumb,
        band_categories: record.band_categories,
        mx3_url: record.mx3_url,
        venue_url: record.venue_url,
        match_confidence: result.confidence,
        match_score: result.score,
    }
}

/// Simplify a municipality boundary for web rendering and wrap it as a
/// GeoJSON feature.
fn simplified_feature(
    municipality: &Municipality,
    gig_count: usize,
    tolerance: f64,
) -> geojson::Feature {
    let geometry = match &municipality.geometry {
        geo::Geometry::Polygon(polygon) => geo::Geometry::Polygon(polygon.simplify(&tolerance)),
        geo::Geometry::MultiPolygon(multi) => {
            geo::Geometry::MultiPolygon(multi.simplify(&tolerance))
        }
        // The loader only admits polygonal geometry.
        other => other.clone(),
    };

    let mut properties = geojson::JsonObject::new();
    properties.insert("name".to_string(), json!(municipality.name));
    properties.insert("canton".to_string(), json!(municipality.canton));
    properties.insert("bfs_number".to_string(), json!(municipality.bfs_number));
    properties.insert("gig_count".to_string(), json!(gig_count));

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
