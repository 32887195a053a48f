//! GeoJSON loader for the municipality reference set.
//!
//! The reference file is the federal Gemeinde boundary export; property names
//! vary between exports, so each property is probed under its known aliases.

use std::path::Path;

use geojson::{Feature, GeoJson};
use tracing::{info, warn};

use super::normalize::normalize_name;
use super::{Municipality, MunicipalityIndex, ReferenceLoadError};

const NAME_PROPERTIES: &[&str] = &["gemeinde.NAME", "NAME", "name"];
const CANTON_PROPERTIES: &[&str] = &["kanton.KUERZEL", "KANTON", "kanton"];
const BFS_PROPERTIES: &[&str] = &["gemeinde.BFS_NUMMER", "BFS_NUMMER", "bfs_nummer"];

/// Load the reference set from a GeoJSON file and build the index.
///
/// Features without a usable name or without a polygonal geometry are skipped
/// with a warning. The load fails only when the file is missing, unparsable,
/// not a FeatureCollection, or yields no usable features at all.
pub fn load_municipalities(path: &Path) -> Result<MunicipalityIndex, ReferenceLoadError> {
    let text = std::fs::read_to_string(path)?;
    let geojson = text.parse::<GeoJson>()?;
    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err(ReferenceLoadError::NotAFeatureCollection),
    };

    let feature_count = collection.features.len();
    let mut municipalities = Vec::with_capacity(feature_count);
    for feature in collection.features {
        let Some(name) = string_property(&feature, NAME_PROPERTIES) else {
            warn!("Skipping reference feature without a name property");
            continue;
        };
        let Some(geometry) = polygonal_geometry(&feature) else {
            warn!("Skipping reference feature {:?}: no polygonal geometry", name);
            continue;
        };
        let key = normalize_name(&name);
        if key.is_empty() {
            warn!("Skipping reference feature {:?}: name normalizes to nothing", name);
            continue;
        }
        municipalities.push(Municipality {
            canton: string_property(&feature, CANTON_PROPERTIES),
            bfs_number: integer_property(&feature, BFS_PROPERTIES),
            name,
            key,
            geometry,
        });
    }

    if municipalities.is_empty() {
        return Err(ReferenceLoadError::Empty);
    }

    let index = MunicipalityIndex::new(municipalities);
    info!(
        "Loaded {} municipalities from {:?} ({} features)",
        index.len(),
        path,
        feature_count
    );
    Ok(index)
}

fn string_property(feature: &Feature, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| feature.property(alias).and_then(|value| value.as_str()))
        .map(str::to_string)
}

fn integer_property(feature: &Feature, aliases: &[&str]) -> Option<i64> {
    aliases
        .iter()
        .find_map(|alias| feature.property(alias).and_then(|value| value.as_i64()))
}

fn polygonal_geometry(feature: &Feature) -> Option<geo::Geometry<f64>> {
    let geometry = feature.geometry.as_ref()?;
    match geo::Geometry::<f64>::try_from(geometry) {
        Ok(converted @ geo::Geometry::Polygon(_))
        | Ok(converted @ geo::Geometry::MultiPolygon(_)) => Some(converted),
        _ => None,
    }
}
