use std::time::Duration;

use reqwest::{Client, Response, Url};
use tracing::debug;

use super::error::PoolError;
use super::types::{Platform, ReserveQuery, ReservedIdentity};
use crate::config::PoolConfig;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-attempt access to the user-pool service.
///
/// Retry policy lives in [`UserPool`](crate::reservation::UserPool); every
/// call here is exactly one request.
///
/// Futures are awaited on the caller's task and carry no `Send` bound, so
/// single-threaded mocks can implement the trait.
#[allow(async_fn_in_trait)]
pub trait PoolApi {
    /// `GET /reserve[/<platform>][?filter=<json>][&isLastCall=true]`
    async fn reserve(&self, query: &ReserveQuery) -> Result<ReservedIdentity, PoolError>;

    /// `GET /release/<platform>/<email>`
    async fn release(&self, platform: Platform, email: &str) -> Result<(), PoolError>;
}

pub struct PoolHttpClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl PoolHttpClient {
    pub fn new(base_url: &str, token: String) -> Result<Self, PoolError> {
        Self::with_timeouts(base_url, token, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        base_url: &str,
        token: String,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, PoolError> {
        let parsed =
            Url::parse(base_url).map_err(|e| PoolError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(PoolError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: parsed,
            token,
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        Self::with_timeouts(
            &config.base_url,
            config.token.clone(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, PoolError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| PoolError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, PoolError> {
        debug!(url = %url, "user-pool request");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(PoolError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl PoolApi for PoolHttpClient {
    async fn reserve(&self, query: &ReserveQuery) -> Result<ReservedIdentity, PoolError> {
        let mut url = self.url(&query.path_segments())?;
        let pairs = query.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(key, value)| (*key, value.as_str())));
        }

        let body = self.get(url).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| PoolError::Parse(e.to_string()))
    }

    async fn release(&self, platform: Platform, email: &str) -> Result<(), PoolError> {
        let url = self.url(&["release", platform.as_str(), email])?;
        self.get(url).await?;
        Ok(())
    }
}
