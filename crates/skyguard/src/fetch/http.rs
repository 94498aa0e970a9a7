//! HTTP backend abstraction for the air-quality APIs.
//!
//! Sources talk to a `HttpBackend` rather than to reqwest directly, so tests
//! can substitute canned responses and the response cache can wrap any backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::cache::ResponseCache;
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// A GET request to one of the data providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Provider name, used in error messages.
    pub provider: &'static str,
    /// Fully built URL including query parameters.
    pub url: Url,
    /// Extra headers such as API keys.
    pub headers: Vec<(&'static str, String)>,
}

impl ApiRequest {
    /// Create a request without extra headers.
    #[must_use]
    pub fn new(provider: &'static str, url: Url) -> Self {
        Self {
            provider,
            url,
            headers: Vec::new(),
        }
    }

    /// Add a header to the request.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// The URL with credentials removed, safe for logs and error messages.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "token" { "***".into() } else { v };
                (k.into_owned(), v.into_owned())
            })
            .collect();
        if pairs.is_empty() {
            return url.to_string();
        }
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

/// Something that can perform GET requests and return the response body.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Fetch the body of a successful response.
    ///
    /// # Errors
    ///
    /// Network failures map to `Error::Network`, 401/403 to
    /// `Error::Unauthorized`, and any other non-success status to
    /// `Error::HttpStatus`.
    async fn get_text(&self, request: &ApiRequest) -> Result<String>;
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production backend using reqwest with retry logic.
///
/// Network errors and 5xx responses are retried with exponential backoff;
/// 4xx responses fail immediately.
#[derive(Debug)]
pub struct ReqwestBackend {
    client: reqwest::Client,
    max_retries: u8,
    retry_base_delay_ms: u64,
}

impl ReqwestBackend {
    /// Create a backend from the API configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })
    }

    fn build_request(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(request.url.as_str())
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        builder
    }

    fn backoff(&self, attempt: u8) -> Duration {
        let factor = 2u64.saturating_pow(u32::from(attempt.saturating_sub(1)));
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_text(&self, request: &ApiRequest) -> Result<String> {
        let shown_url = request.redacted_url();
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                warn!(
                    "Retrying {} (attempt {}/{}) after {:?}",
                    request.provider, attempt, self.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }

            debug!("GET {}", shown_url);
            match self.build_request(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| Error::network(shown_url.clone(), e.to_string()));
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        last_error = Some(Error::HttpStatus {
                            status: status.as_u16(),
                            url: shown_url.clone(),
                        });
                        continue;
                    }

                    if matches!(status.as_u16(), 401 | 403) {
                        return Err(Error::Unauthorized {
                            provider: request.provider,
                        });
                    }

                    return Err(Error::HttpStatus {
                        status: status.as_u16(),
                        url: shown_url,
                    });
                }
                Err(e) => {
                    let err = Error::network(shown_url.clone(), e.without_url().to_string());
                    if attempt < self.max_retries {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::network(shown_url, "no attempt was made")))
    }
}

// ============================================================================
// Caching Backend
// ============================================================================

/// Wraps a backend and serves recent responses from the on-disk cache.
#[derive(Debug)]
pub struct CachedBackend<B> {
    inner: B,
    cache: Mutex<ResponseCache>,
    ttl: Duration,
}

impl<B: HttpBackend> CachedBackend<B> {
    /// Wrap `inner`, reusing cached bodies younger than `ttl`.
    pub fn new(inner: B, cache: ResponseCache, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Mutex::new(cache),
            ttl,
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&ResponseCache) -> Result<T>) -> Result<T> {
        let guard = self
            .cache
            .lock()
            .map_err(|_| Error::internal("response cache lock poisoned"))?;
        f(&guard)
    }
}

#[async_trait]
impl<B: HttpBackend> HttpBackend for CachedBackend<B> {
    async fn get_text(&self, request: &ApiRequest) -> Result<String> {
        let key = request.url.as_str();

        // A broken cache must never break a check.
        match self.with_cache(|cache| cache.get(key, self.ttl)) {
            Ok(Some(body)) => {
                debug!("Cache hit for {}", request.redacted_url());
                return Ok(body);
            }
            Ok(None) => {}
            Err(e) => warn!("Response cache lookup failed: {}", e),
        }

        let body = self.inner.get_text(request).await?;

        if let Err(e) = self.with_cache(|cache| cache.put(key, &request.redacted_url(), &body)) {
            warn!("Failed to cache response: {}", e);
        }
        Ok(body)
    }
}

#[async_trait]
impl<T: HttpBackend + ?Sized> HttpBackend for Arc<T> {
    async fn get_text(&self, request: &ApiRequest) -> Result<String> {
        (**self).get_text(request).await
    }
}

// ============================================================================
// Fake Backend for Testing
// ============================================================================
