//! Scripted stand-in for the MX3 client.
//!
//! Each call to `fetch` pops the next scripted outcome; calling more times
//! than scripted is a test bug and panics.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bandmap_refresh::fetcher::{FetchError, FetchOutcome, GigFetcher, RawGigRecord};

pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchOutcome, FetchError>>>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<FetchOutcome, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// One successful, complete fetch.
    pub fn ok(records: Vec<RawGigRecord>) -> Self {
        Self::new(vec![Ok(FetchOutcome {
            records,
            failed_cantons: vec![],
        })])
    }

    /// The same retryable error for every attempt.
    pub fn always_failing(error: FetchError, attempts: usize) -> Self {
        Self::new((0..attempts).map(|_| Err(error.clone())).collect())
    }

    /// The same partial outcome for every attempt.
    pub fn always_partial(records: Vec<RawGigRecord>, attempts: usize) -> Self {
        Self::new(
            (0..attempts)
                .map(|_| {
                    Ok(FetchOutcome {
                        records: records.clone(),
                        failed_cantons: vec![(
                            "TI".to_string(),
                            FetchError::Network("connection reset".to_string()),
                        )],
                    })
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GigFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("fetch called more times than scripted")
    }
}
