//! HTTP client with retry and rate limiting
//!
//! Provides the GET transport every stream talks through. It handles:
//! - Network-level retries (timeouts, resets, connect failures)
//! - Status-level retries with exponential backoff
//! - `Retry-After` waits on 429
//! - Optional client-side rate limiting
//! - Classification of every non-success status into a typed error

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::sleeper::{Sleeper, TokioSleeper};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, ErrorClass, Result};
use crate::types::BackoffType;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that relative paths are joined onto
    pub base_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts for retryable HTTP statuses
    pub max_attempts: u32,
    /// Total attempts for transport failures
    pub network_attempts: u32,
    /// Initial delay for status backoff
    pub initial_backoff: Duration,
    /// Maximum delay for status backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy for statuses
    pub backoff_type: BackoffType,
    /// Initial delay for network backoff, doubled per attempt
    pub network_backoff: Duration,
    /// Wait used for a 429 without a usable `Retry-After`
    pub default_retry_after: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
    /// Credentials applied to every request
    pub auth: AuthConfig,
    /// Where retry and quota waits go
    pub sleeper: Arc<dyn Sleeper>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(300),
            max_attempts: 10,
            network_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            network_backoff: Duration::from_secs(2),
            default_retry_after: Duration::from_secs(60),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("solidafy-helpdesk/{}", env!("CARGO_PKG_VERSION")),
            auth: AuthConfig::None,
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set total attempts for retryable statuses
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set total attempts for transport failures
    pub fn network_attempts(mut self, attempts: u32) -> Self {
        self.config.network_attempts = attempts;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set the initial network backoff
    pub fn network_backoff(mut self, initial: Duration) -> Self {
        self.config.network_backoff = initial;
        self
    }

    /// Set the fallback wait for 429 responses
    pub fn default_retry_after(mut self, wait: Duration) -> Self {
        self.config.default_retry_after = wait;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set credentials
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Set the sleeper used for every wait
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.config.sleeper = sleeper;
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and rate limiting
///
/// Cloning is cheap and shares the connection pool and the rate limiter.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = build_client(&config)?;
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let authenticator = Authenticator::new(config.auth.clone());

        Ok(Self {
            client,
            config,
            authenticator,
            rate_limiter,
        })
    }

    /// Client with a fresh connection pool and the same settings
    ///
    /// The ticket fan-out uses one session per wave.
    pub fn new_session(&self) -> Result<Self> {
        Ok(Self {
            client: build_client(&self.config)?,
            config: self.config.clone(),
            authenticator: self.authenticator.clone(),
            rate_limiter: self.rate_limiter.clone(),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Sleeper shared by this client's waits
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.config.sleeper)
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// GET a URL and parse the body as JSON
    ///
    /// `url` may be absolute or relative to the base URL. Non-success
    /// statuses are retried according to their class; the final failure is
    /// returned as `Error::Api`.
    pub async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value> {
        let full_url = self.build_url(url);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let fetched = self.send(&full_url, params).await?;
            let status = fetched.status;

            if status.is_success() {
                debug!("Request succeeded: GET {}", full_url);
                return serde_json::from_str(&fetched.body).map_err(|e| {
                    Error::decode(format!("Response from {full_url} is not valid JSON: {e}"))
                });
            }

            let error = Error::api(status.as_u16(), &fetched.body);

            let delay = match error.class() {
                ErrorClass::RateLimited => fetched
                    .retry_after
                    .unwrap_or(self.config.default_retry_after),
                ErrorClass::ClientError | ErrorClass::PermissionDenied => return Err(error),
                _ => self.calculate_backoff(attempt - 1),
            };

            if attempt >= max_attempts {
                return Err(error);
            }

            warn!(
                "Request failed with {}, attempt {}/{}, retrying in {:?}",
                status.as_u16(),
                attempt,
                max_attempts,
                delay
            );
            self.config.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send one GET and read its body, retrying transport failures only
    ///
    /// A body cut short or timed out mid-read counts as a failed attempt.
    async fn send(&self, url: &str, params: &[(String, String)]) -> Result<Fetched> {
        let max_attempts = self.config.network_attempts.max(1);
        let mut attempt = 1;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.get(url);
            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !params.is_empty() {
                req = req.query(params);
            }
            req = self.authenticator.apply(req);

            let error = match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    let retry_after = extract_retry_after(&response);
                    match response.text().await {
                        Ok(body) => {
                            return Ok(Fetched {
                                status,
                                retry_after,
                                body,
                            })
                        }
                        Err(e) => e,
                    }
                }
                Err(e) => e,
            };

            if !is_transient(&error) || attempt >= max_attempts {
                return Err(Error::Network(error));
            }

            let delay = self.config.network_backoff * 2u32.saturating_pow(attempt - 1);
            warn!(
                "Network error ({}), attempt {}/{}, retrying in {:?}",
                error, attempt, max_attempts, delay
            );
            self.config.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Calculate backoff delay for a given retry (0-based)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// One fully read response
struct Fetched {
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
}

fn build_client(config: &HttpClientConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(config.timeout)
        .user_agent(&config.user_agent)
        .build()?)
}

/// Transport failures worth another attempt
///
/// A truncated body surfaces as a decode error from `Response::text`.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout()
        || error.is_connect()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
}

/// Extract the `Retry-After` header as a duration in seconds
fn extract_retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get("retry-after")?.to_str().ok()?.trim();
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
        })
}
