//! Wire types for the MX3 gigs API and the processed record handed on to the
//! reconciler.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// OAuth token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds. The API hands out 7-day tokens but may omit
    /// the field.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    604_800
}

/// Outer envelope of every gigs response.
#[derive(Debug, Deserialize)]
pub struct GigsEnvelope {
    pub response: GigsResponse,
}

#[derive(Debug, Deserialize)]
pub struct GigsResponse {
    pub status: String,
    #[serde(default)]
    pub performances: Vec<ApiPerformance>,
}

/// One performance as returned by the API. Every field is optional; the API
/// is not shy about leaving things out.
#[derive(Debug, Deserialize)]
pub struct ApiPerformance {
    pub date: Option<String>,
    pub band_name: Option<String>,
    /// Event name.
    pub name: Option<String>,
    pub stage_name: Option<String>,
    pub location: Option<String>,
    pub location_url: Option<String>,
    pub band: Option<ApiBand>,
}

#[derive(Debug, Deserialize)]
pub struct ApiBand {
    pub id: Option<i64>,
    pub url_for_image_thumb: Option<String>,
    #[serde(default)]
    pub categories: Vec<ApiCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCategory {
    pub name: Option<String>,
}

/// One gig listing after post-processing, ready for reconciliation.
///
/// The location string may be empty or reference a locality outside the
/// reference set; that is expected input, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGigRecord {
    pub band_name: Option<String>,
    pub band_id: Option<i64>,
    pub event_name: Option<String>,
    /// Venue / stage name.
    pub venue: Option<String>,
    /// Free-text location string, as sent by the API.
    pub location: String,
    /// Canton code the gig was fetched under.
    pub canton: String,
    pub date: Option<DateTime<Utc>>,
    pub band_image_thumb: Option<String>,
    pub band_categories: Vec<String>,
    /// Synthesized band profile URL, when the band id is known.
    pub mx3_url: Option<String>,
    pub venue_url: Option<String>,
}

impl RawGigRecord {
    /// Convert an API performance into a processed record, tagging it with
    /// the canton it was fetched under. Unparsable dates become `None`.
    pub fn from_api(performance: ApiPerformance, canton: &str) -> Self {
        let band = performance.band;
        let band_id = band.as_ref().and_then(|b| b.id);
        let date = performance
            .date
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        Self {
            band_name: performance.band_name,
            band_id,
            event_name: performance.name,
            venue: performance.stage_name,
            location: performance.location.unwrap_or_default(),
            canton: canton.to_string(),
            date,
            band_image_thumb: band.as_ref().and_then(|b| b.url_for_image_thumb.clone()),
            band_categories: band
                .map(|b| b.categories.into_iter().filter_map(|c| c.name).collect())
                .unwrap_or_default(),
            mx3_url: band_id.map(|id| format!("https://mx3.ch/bands/{}", id)),
            venue_url: performance.location_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_gigs_envelope() {
        let body = r#"{
            "response": {
                "status": "Ok",
                "performances": [
                    {
                        "date": "2026-08-21T20:30:00Z",
                        "band_name": "The Alpentones",
                        "name": "Sommerfest",
                        "stage_name": "Roxy Bar",
                        "location": "Zürich",
                        "location_url": "https://roxy.example/program",
                        "band": {
                            "id": 4711,
                            "url_for_image_thumb": "https://mx3.ch/thumbs/4711.jpg",
                            "categories": [{"name": "Rock"}, {"name": "Indie"}]
                        }
                    },
                    {"location": null}
                ]
            }
        }"#;

        let envelope: GigsEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.response.status, "Ok");
        assert_eq!(envelope.response.performances.len(), 2);
    }

    #[test]
    fn test_from_api_full_record() {
        let performance = ApiPerformance {
            date: Some("2026-08-21T20:30:00Z".to_string()),
            band_name: Some("The Alpentones".to_string()),
            name: Some("Sommerfest".to_string()),
            stage_name: Some("Roxy Bar".to_string()),
            location: Some("Zürich".to_string()),
            location_url: Some("https://roxy.example/program".to_string()),
            band: Some(ApiBand {
                id: Some(4711),
                url_for_image_thumb: Some("https://mx3.ch/thumbs/4711.jpg".to_string()),
                categories: vec![
                    ApiCategory { name: Some("Rock".to_string()) },
                    ApiCategory { name: None },
                ],
            }),
        };

        let record = RawGigRecord::from_api(performance, "ZH");
        assert_eq!(record.canton, "ZH");
        assert_eq!(record.location, "Zürich");
        assert_eq!(record.mx3_url.as_deref(), Some("https://mx3.ch/bands/4711"));
        assert_eq!(record.band_categories, vec!["Rock"]);
        assert_eq!(
            record.date,
            Some(Utc.with_ymd_and_hms(2026, 8, 21, 20, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_from_api_sparse_record() {
        let performance = ApiPerformance {
            date: Some("not a date".to_string()),
            band_name: None,
            name: None,
            stage_name: None,
            location: None,
            location_url: None,
            band: None,
        };

        let record = RawGigRecord::from_api(performance, "GE");
        assert_eq!(record.location, "");
        assert_eq!(record.date, None);
        assert_eq!(record.mx3_url, None);
        assert!(record.band_categories.is_empty());
    }
}
