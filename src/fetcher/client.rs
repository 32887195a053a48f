//! HTTP client for the SRG SSR MX3 API.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ApiSettings, Credentials};

use super::models::{ApiPerformance, GigsEnvelope, RawGigRecord, TokenResponse};
use super::{FetchError, FetchOutcome, GigFetcher};

/// Renew the OAuth token this long before it actually expires.
const TOKEN_RENEWAL_BUFFER_SECS: u64 = 3600;

/// Hard cap on pages per canton, in case the API ignores the page parameter.
const MAX_PAGES: u32 = 50;

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Client for the MX3 gigs API: OAuth client-credentials token (cached until
/// shortly before expiry) plus paginated per-canton gig retrieval.
pub struct Mx3Client {
    client: reqwest::Client,
    settings: ApiSettings,
    credentials: Credentials,
    token: Mutex<Option<CachedToken>>,
}

impl Mx3Client {
    pub fn new(settings: ApiSettings, credentials: Credentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_sec))
            .build()?;

        Ok(Self {
            client,
            settings,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Get a valid access token, requesting a fresh one when the cached token
    /// is missing or inside the renewal buffer.
    async fn access_token(&self) -> Result<String, FetchError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.consumer_key, self.credentials.consumer_secret
        ));
        let url = format!("{}?grant_type=client_credentials", self.settings.oauth_url);
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Basic {}", basic))
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response.status(), "token endpoint")?;

        let token: TokenResponse = response.json().await.map_err(transport_error)?;
        let usable_secs = token
            .expires_in
            .saturating_sub(TOKEN_RENEWAL_BUFFER_SECS)
            .max(60);
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(usable_secs as i64),
        });
        info!("Obtained MX3 access token (usable for {}s)", usable_secs);
        Ok(token.access_token)
    }

    async fn fetch_page(
        &self,
        token: &str,
        canton: &str,
        page: u32,
    ) -> Result<Vec<ApiPerformance>, FetchError> {
        let url = format!("{}/gigs", self.settings.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .query(&[
                ("state_code", canton.to_string()),
                ("page", page.to_string()),
                ("limit", self.settings.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response.status(), "gigs endpoint")?;

        let envelope: GigsEnvelope = response.json().await.map_err(transport_error)?;
        if envelope.response.status != "Ok" {
            // The provider signals "nothing here" through the envelope status.
            warn!("No gigs found for canton {} (status {:?})", canton, envelope.response.status);
            return Ok(Vec::new());
        }
        Ok(envelope.response.performances)
    }

    /// Fetch all pages for one canton, concatenating until a short page
    /// signals completion.
    async fn fetch_canton(&self, canton: &str) -> Result<Vec<RawGigRecord>, FetchError> {
        let token = self.access_token().await?;
        let mut records = Vec::new();
        for page in 1..=MAX_PAGES {
            let performances = self.fetch_page(&token, canton, page).await?;
            let page_len = performances.len() as u32;
            debug!("Canton {} page {}: {} performances", canton, page, page_len);
            records.extend(
                performances
                    .into_iter()
                    .map(|performance| RawGigRecord::from_api(performance, canton)),
            );
            if page_len < self.settings.page_size {
                return Ok(records);
            }
        }
        warn!(
            "Canton {} still returning full pages after {} pages, stopping",
            canton, MAX_PAGES
        );
        Ok(records)
    }
}

#[async_trait::async_trait]
impl GigFetcher for Mx3Client {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();
        for canton in &self.settings.cantons {
            info!("Fetching gigs for canton {}", canton);
            match self.fetch_canton(canton).await {
                Ok(records) => {
                    info!("Found {} gigs in {}", records.len(), canton);
                    outcome.records.extend(records);
                }
                Err(error) if error.is_retryable() => {
                    warn!("Could not load gigs for canton {}: {}", canton, error);
                    outcome.failed_cantons.push((canton.clone(), error));
                }
                Err(fatal) => return Err(fatal),
            }
        }
        info!(
            "Fetched {} gigs across {} cantons ({} cantons failed)",
            outcome.records.len(),
            self.settings.cantons.len(),
            outcome.failed_cantons.len()
        );
        Ok(outcome)
    }
}

fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_decode() {
        FetchError::MalformedResponse(error.to_string())
    } else {
        FetchError::Network(error.to_string())
    }
}

fn check_status(status: StatusCode, endpoint: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    let message = format!("{} returned {}", endpoint, status);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Auth(message)),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited(message)),
        _ => Err(FetchError::Network(message)),
    }
}
