//! Authoritative Swiss municipality reference set.
//!
//! Loaded once at startup from the bundled GeoJSON and immutable afterwards.
//! The index offers O(1) exact lookup by normalized key plus token-count
//! buckets that bound the fuzzy candidate scan in the reconciler.

mod loader;
pub mod normalize;

pub use loader::load_municipalities;

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::warn;

/// Errors that make the reference set unusable. These are fatal: no
/// downstream component can compensate for missing reference data.
#[derive(Debug, Error)]
pub enum ReferenceLoadError {
    #[error("Failed to read reference geodata: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse reference geodata: {0}")]
    Parse(#[from] geojson::Error),

    #[error("Reference geodata root must be a FeatureCollection")]
    NotAFeatureCollection,

    #[error("Reference geodata contains no usable municipality features")]
    Empty,
}

/// One municipality from the reference set.
#[derive(Debug, Clone)]
pub struct Municipality {
    /// Canonical name as spelled in the reference data. Unique after
    /// normalized-key deduplication, so it doubles as the stable identifier.
    pub name: String,
    /// Two-letter canton code, when the reference data carries one.
    pub canton: Option<String>,
    /// Federal statistics office number, when present.
    pub bfs_number: Option<i64>,
    /// Normalized-name key, shared with location normalization.
    pub key: String,
    /// Boundary geometry. The loader only admits polygons and multipolygons.
    pub geometry: geo::Geometry<f64>,
}

/// Read-only lookup structure over the reference set.
pub struct MunicipalityIndex {
    /// Municipalities sorted by canonical name.
    municipalities: Vec<Municipality>,
    /// Normalized key -> position, for exact lookups.
    by_key: HashMap<String, usize>,
    /// Key token count -> positions, bounding the fuzzy candidate scan.
    /// BTreeMap so candidate iteration order is deterministic.
    by_token_count: BTreeMap<usize, Vec<usize>>,
}

impl MunicipalityIndex {
    /// Build the index. Municipalities whose normalized key collides with an
    /// earlier entry (in canonical-name order) are dropped with a warning, so
    /// key uniqueness holds by construction.
    pub fn new(mut municipalities: Vec<Municipality>) -> Self {
        municipalities.sort_by(|a, b| a.name.cmp(&b.name));

        let mut kept: Vec<Municipality> = Vec::with_capacity(municipalities.len());
        let mut by_key: HashMap<String, usize> = HashMap::with_capacity(municipalities.len());
        for municipality in municipalities {
            if let Some(&existing) = by_key.get(&municipality.key) {
                warn!(
                    "Duplicate normalized key {:?}: keeping {:?}, dropping {:?}",
                    municipality.key, kept[existing].name, municipality.name
                );
                continue;
            }
            by_key.insert(municipality.key.clone(), kept.len());
            kept.push(municipality);
        }

        let mut by_token_count: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (position, municipality) in kept.iter().enumerate() {
            let tokens = municipality.key.split(' ').count();
            by_token_count.entry(tokens).or_default().push(position);
        }

        Self {
            municipalities: kept,
            by_key,
            by_token_count,
        }
    }

    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// All municipalities in canonical-name order.
    pub fn iter(&self) -> impl Iterator<Item = &Municipality> + '_ {
        self.municipalities.iter()
    }

    pub fn municipality(&self, position: usize) -> &Municipality {
        &self.municipalities[position]
    }

    /// Exact lookup by normalized key.
    pub fn exact(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    /// Fuzzy candidate buckets: (key token count, positions), ascending by
    /// token count.
    pub fn fuzzy_buckets(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.by_token_count
            .iter()
            .map(|(count, positions)| (*count, positions.as_slice()))
    }
}
