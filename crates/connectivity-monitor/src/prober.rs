//! Reachability probing.

use crate::{ProbeError, ProbeResult};
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Query parameter carrying the cache-busting stamp.
pub const CACHE_BUST_PARAM: &str = "_cb";

/// A single reachability check.
///
/// Implementations must be cancel-safe: the monitor cancels an in-flight
/// probe by dropping its future.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self) -> ProbeResult<()>;
}

/// Probes a cheap static asset over HTTP with caching disabled.
#[derive(Clone)]
pub struct HttpProber {
    http_client: Client,
    target: Url,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(target: Url, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            target,
            timeout,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> ProbeResult<()> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let url = cache_busted_url(&self.target, stamp);

        debug!(url = %url, "Probing reachability");

        let request = self
            .http_client
            .get(url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ProbeError::Timeout)??;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

/// Return `target` with [`CACHE_BUST_PARAM`] set to `stamp`, replacing any
/// previous stamp and keeping other query parameters.
pub fn cache_busted_url(target: &Url, stamp: i64) -> Url {
    let retained: Vec<(String, String)> = target
        .query_pairs()
        .filter(|(key, _)| key != CACHE_BUST_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = target.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair(CACHE_BUST_PARAM, &stamp.to_string());
    url
}
