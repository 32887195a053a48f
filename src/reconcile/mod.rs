//! Name reconciliation between fetched gig locations and the municipality
//! reference set.
//!
//! Matching is exact-first (normalized-key hash lookup), then fuzzy via
//! normalized Levenshtein similarity. The fuzzy pass scores the candidate key
//! against the full normalized location and against every contiguous token
//! window of the candidate's own token count, so "zurich roxy bar" still
//! resolves to Zürich. Everything here is pure and deterministic: identical
//! inputs always produce identical outputs.

use serde::{Deserialize, Serialize};

use crate::fetcher::RawGigRecord;
use crate::geodata::normalize::normalize_name;
use crate::geodata::MunicipalityIndex;

/// How a record was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Normalized location equals a normalized key. Similarity never consulted.
    Exact,
    /// Best similarity reached the acceptance threshold.
    Fuzzy,
    /// Nothing reached the threshold, or the location was empty.
    Unmatched,
}

/// Outcome of reconciling one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub record: RawGigRecord,
    /// Position in the [`MunicipalityIndex`], absent when unmatched.
    pub municipality: Option<usize>,
    pub confidence: MatchConfidence,
    /// Similarity score, present only on fuzzy matches.
    pub score: Option<f64>,
}

/// Reconcile fetched records against the reference set.
///
/// Never fails: malformed or unknown locations come back as
/// [`MatchConfidence::Unmatched`], which is a quality metric, not an error.
pub fn reconcile(
    records: Vec<RawGigRecord>,
    index: &MunicipalityIndex,
    threshold: f64,
) -> Vec<MatchResult> {
    records
        .into_iter()
        .map(|record| {
            let key = normalize_name(&record.location);
            if key.is_empty() {
                return MatchResult {
                    record,
                    municipality: None,
                    confidence: MatchConfidence::Unmatched,
                    score: None,
                };
            }
            if let Some(position) = index.exact(&key) {
                return MatchResult {
                    record,
                    municipality: Some(position),
                    confidence: MatchConfidence::Exact,
                    score: None,
                };
            }
            match fuzzy_best(&key, index, threshold) {
                Some(best) => MatchResult {
                    record,
                    municipality: Some(best.position),
                    confidence: MatchConfidence::Fuzzy,
                    score: Some(best.score),
                },
                None => MatchResult {
                    record,
                    municipality: None,
                    confidence: MatchConfidence::Unmatched,
                    score: None,
                },
            }
        })
        .collect()
}

struct Best {
    position: usize,
    score: f64,
    distance: usize,
}

/// Best fuzzy candidate at or above the threshold. Ties break by smaller raw
/// edit distance, then lexicographically-first canonical name.
fn fuzzy_best(key: &str, index: &MunicipalityIndex, threshold: f64) -> Option<Best> {
    let tokens: Vec<&str> = key.split(' ').collect();
    let mut best: Option<Best> = None;

    for (token_count, positions) in index.fuzzy_buckets() {
        // Contiguous token windows of the candidate's own token count, plus
        // the full string: a space-vs-no-space difference can make the full
        // string the better comparison.
        let mut windows: Vec<String> = if token_count < tokens.len() {
            tokens
                .windows(token_count)
                .map(|window| window.join(" "))
                .collect()
        } else {
            Vec::new()
        };
        windows.push(key.to_string());
        for &position in positions {
            let municipality = index.municipality(position);
            let Some((score, distance)) = best_window_score(&windows, &municipality.key, threshold)
            else {
                continue;
            };
            let better = match &best {
                None => true,
                Some(current) => {
                    score > current.score
                        || (score == current.score && distance < current.distance)
                        || (score == current.score
                            && distance == current.distance
                            && municipality.name < index.municipality(current.position).name)
                }
            };
            if better {
                best = Some(Best {
                    position,
                    score,
                    distance,
                });
            }
        }
    }
    best
}

/// Score a candidate key against every window, keeping the best score at or
/// above the threshold. Windows whose length makes the threshold unreachable
/// are skipped without computing a distance.
fn best_window_score(
    windows: &[String],
    candidate_key: &str,
    threshold: f64,
) -> Option<(f64, usize)> {
    let candidate_chars = candidate_key.chars().count();
    let mut best: Option<(f64, usize)> = None;
    for window in windows {
        if !length_compatible(window.chars().count(), candidate_chars, threshold) {
            continue;
        }
        let score = strsim::normalized_levenshtein(window, candidate_key);
        if score < threshold {
            continue;
        }
        let distance = strsim::levenshtein(window, candidate_key);
        match best {
            None => best = Some((score, distance)),
            Some((best_score, best_distance)) => {
                if score > best_score || (score == best_score && distance < best_distance) {
                    best = Some((score, distance));
                }
            }
        }
    }
    best
}

/// Normalized Levenshtein can only reach `t` when the length difference is at
/// most `(1 - t) * max(len)`, since every length difference costs an edit.
fn length_compatible(a: usize, b: usize, threshold: f64) -> bool {
    let longest = a.max(b);
    if longest == 0 {
        return false;
    }
    1.0 - (a.abs_diff(b) as f64 / longest as f64) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodata::normalize::normalize_name;
    use crate::geodata::Municipality;

    const THRESHOLD: f64 = 0.8;

    fn municipality(name: &str) -> Municipality {
        Municipality {
            name: name.to_string(),
            canton: None,
            bfs_number: None,
            key: normalize_name(name),
            geometry: geo::Geometry::Polygon(geo::Polygon::new(
                geo::LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
                vec![],
            )),
        }
    }

    fn index(names: &[&str]) -> MunicipalityIndex {
        MunicipalityIndex::new(names.iter().map(|name| municipality(name)).collect())
    }

    fn record(location: &str) -> RawGigRecord {
        RawGigRecord {
            band_name: Some("The Alpentones".to_string()),
            band_id: None,
            event_name: None,
            venue: None,
            location: location.to_string(),
            canton: "ZH".to_string(),
            date: None,
            band_image_thumb: None,
            band_categories: vec![],
            mx3_url: None,
            venue_url: None,
        }
    }

    fn matched_name<'a>(index: &'a MunicipalityIndex, result: &MatchResult) -> Option<&'a str> {
        result
            .municipality
            .map(|position| index.municipality(position).name.as_str())
    }

    #[test]
    fn test_reference_scenario() {
        let index = index(&["Zürich", "Genève"]);
        let records = vec![record("zurich"), record("Geneve"), record("Basel")];

        let results = reconcile(records, &index, THRESHOLD);

        // Diacritic folding is part of the normalized key, so both lookups
        // land on the exact path.
        assert_eq!(matched_name(&index, &results[0]), Some("Zürich"));
        assert_eq!(results[0].confidence, MatchConfidence::Exact);
        assert_eq!(results[0].score, None);

        assert_eq!(matched_name(&index, &results[1]), Some("Genève"));
        assert_eq!(results[1].confidence, MatchConfidence::Exact);

        assert_eq!(results[2].confidence, MatchConfidence::Unmatched);
        assert_eq!(results[2].municipality, None);
        assert_eq!(results[2].score, None);
    }

    #[test]
    fn test_fuzzy_match_above_threshold() {
        let index = index(&["Zürich", "Genève"]);

        // Common ASCII transliteration: one edit away from the key.
        let results = reconcile(vec![record("Zuerich")], &index, THRESHOLD);

        assert_eq!(matched_name(&index, &results[0]), Some("Zürich"));
        assert_eq!(results[0].confidence, MatchConfidence::Fuzzy);
        let score = results[0].score.unwrap();
        assert!(score >= THRESHOLD, "score {} below threshold", score);
        assert!(score < 1.0);
    }

    #[test]
    fn test_venue_noise_matches_through_token_window() {
        let index = index(&["Zürich", "Genève"]);

        let results = reconcile(vec![record("Zürich Roxy Bar")], &index, THRESHOLD);

        assert_eq!(matched_name(&index, &results[0]), Some("Zürich"));
        assert_eq!(results[0].confidence, MatchConfidence::Fuzzy);
        assert_eq!(results[0].score, Some(1.0));
    }

    #[test]
    fn test_multi_token_municipality_in_longer_location() {
        let index = index(&["La Chaux-de-Fonds", "Zürich"]);

        let results = reconcile(
            vec![record("Bikini Test, La Chaux-de-Fonds")],
            &index,
            THRESHOLD,
        );

        assert_eq!(matched_name(&index, &results[0]), Some("La Chaux-de-Fonds"));
        assert_eq!(results[0].confidence, MatchConfidence::Fuzzy);
    }

    #[test]
    fn test_empty_location_is_unmatched() {
        let index = index(&["Zürich"]);
        let results = reconcile(vec![record(""), record("   ")], &index, THRESHOLD);

        assert!(results
            .iter()
            .all(|result| result.confidence == MatchConfidence::Unmatched));
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let index = index(&["Zürich"]);
        let results = reconcile(vec![record("Lausanne")], &index, THRESHOLD);

        assert_eq!(results[0].confidence, MatchConfidence::Unmatched);
    }

    #[test]
    fn test_tie_breaks_on_canonical_name() {
        // Same score, same distance against both candidates.
        let index = index(&["Testhausenb", "Testhausena"]);
        let results = reconcile(vec![record("Testhausenc")], &index, THRESHOLD);

        assert_eq!(results[0].confidence, MatchConfidence::Fuzzy);
        assert_eq!(matched_name(&index, &results[0]), Some("Testhausena"));
    }

    #[test]
    fn test_deterministic_across_runs() {
        let index = index(&["Zürich", "Genève", "La Chaux-de-Fonds", "Basel"]);
        let records = vec![
            record("zurich"),
            record("Zuerich"),
            record("Roxy Bar Geneve"),
            record("nowhere special"),
            record(""),
        ];

        let first = reconcile(records.clone(), &index, THRESHOLD);
        let second = reconcile(records, &index, THRESHOLD);
        assert_eq!(first, second);
    }
}
