//! Tap configuration
//!
//! The tap is configured with a flat JSON document. Numeric settings are
//! accepted either as numbers or as numeric strings, and a handful of them
//! fall back to defaults instead of failing when they are empty or out of
//! range.

use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig, Sleeper, TokioSleeper};
use crate::types::OptionStringExt;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Page size used when none (or an out-of-range one) is configured
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Request timeout used when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Concurrent audit fetches per fan-out wave
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 20;

/// Audit requests allowed per minute by the fan-out governor
pub const DEFAULT_AUDITS_REQUESTS_PER_MINUTE: usize = 450;

// ============================================================================
// Raw document
// ============================================================================

/// Config document as written by the user, before validation
#[derive(Debug, Default, Deserialize)]
struct RawTapConfig {
    subdomain: Option<String>,
    base_url: Option<String>,
    access_token: Option<String>,
    email: Option<String>,
    api_token: Option<String>,
    start_date: Option<String>,
    page_size: Option<Value>,
    request_timeout: Option<Value>,
    search_window_size: Option<Value>,
    lookback_minutes: Option<Value>,
    max_requests_per_minute: Option<Value>,
    concurrency_limit: Option<Value>,
    audits_requests_per_minute: Option<Value>,
}

// ============================================================================
// Validated config
// ============================================================================

/// Validated tap configuration
#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Account subdomain, when the base URL was derived from it
    pub subdomain: Option<String>,
    /// API root, e.g. `https://acme.zendesk.com/api/v2`
    pub base_url: String,
    /// Credentials for every request
    pub auth: AuthConfig,
    /// Earliest point any incremental stream syncs from
    pub start_date: DateTime<Utc>,
    /// Records requested per page
    pub page_size: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Search window size, validated but only used by search endpoints
    pub search_window_size: Option<u64>,
    /// Minutes subtracted from the export start time of export streams
    pub lookback_minutes: i64,
    /// Optional client-side request throttle
    pub max_requests_per_minute: Option<u32>,
    /// Concurrent audit fetches per fan-out wave
    pub concurrency_limit: usize,
    /// Audit requests per minute allowed by the fan-out governor
    pub audits_requests_per_minute: usize,
}

impl TapConfig {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse and validate a config document
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Validate an already-parsed config document
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::config("config must be a JSON object"));
        }
        let raw: RawTapConfig = serde_json::from_value(value)?;

        let subdomain = raw.subdomain.none_if_empty();
        let base_url = match (raw.base_url.none_if_empty(), &subdomain) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(sub)) => format!("https://{sub}.zendesk.com/api/v2"),
            (None, None) => return Err(Error::missing_field("subdomain")),
        };

        let auth = match (
            raw.access_token.none_if_empty(),
            raw.email.none_if_empty(),
            raw.api_token.none_if_empty(),
        ) {
            (Some(token), _, _) => AuthConfig::bearer(token),
            (None, Some(email), Some(token)) => AuthConfig::api_token(email, token),
            _ => return Err(Error::missing_field("access_token")),
        };

        let start_date = raw
            .start_date
            .none_if_empty()
            .ok_or_else(|| Error::missing_field("start_date"))?;
        let start_date = DateTime::parse_from_rfc3339(&start_date)
            .map_err(|e| Error::invalid_value("start_date", e.to_string()))?
            .with_timezone(&Utc);

        let page_size = match number_field("page_size", raw.page_size.as_ref())? {
            None => DEFAULT_PAGE_SIZE,
            Some(n) if n.fract() == 0.0 && (1.0..=f64::from(MAX_PAGE_SIZE)).contains(&n) => {
                n as u32
            }
            Some(n) => {
                warn!(
                    "page_size {} is outside 1..={}, using {}",
                    n, MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE
                );
                DEFAULT_PAGE_SIZE
            }
        };

        let request_timeout = match number_field("request_timeout", raw.request_timeout.as_ref())? {
            Some(secs) if secs > 0.0 && secs.is_finite() => Duration::from_secs_f64(secs),
            _ => DEFAULT_REQUEST_TIMEOUT,
        };

        let search_window_size =
            match number_field("search_window_size", raw.search_window_size.as_ref())? {
                None => None,
                Some(n) if n == 0.0 => None,
                Some(n) if n < 2.0 => {
                    return Err(Error::config("Search window size cannot be less than 2"))
                }
                Some(n) => Some(n as u64),
            };

        let lookback_minutes =
            match number_field("lookback_minutes", raw.lookback_minutes.as_ref())? {
                None => 0,
                Some(n) if n < 0.0 => {
                    return Err(Error::invalid_value(
                        "lookback_minutes",
                        "must not be negative",
                    ))
                }
                Some(n) => n as i64,
            };

        let max_requests_per_minute =
            positive_integer("max_requests_per_minute", raw.max_requests_per_minute.as_ref())?
                .map(|n| n as u32);
        let concurrency_limit =
            positive_integer("concurrency_limit", raw.concurrency_limit.as_ref())?
                .map_or(DEFAULT_CONCURRENCY_LIMIT, |n| n as usize);
        let audits_requests_per_minute = positive_integer(
            "audits_requests_per_minute",
            raw.audits_requests_per_minute.as_ref(),
        )?
        .map_or(DEFAULT_AUDITS_REQUESTS_PER_MINUTE, |n| n as usize);

        Ok(Self {
            subdomain,
            base_url,
            auth,
            start_date,
            page_size,
            request_timeout,
            search_window_size,
            lookback_minutes,
            max_requests_per_minute,
            concurrency_limit,
            audits_requests_per_minute,
        })
    }

    /// Export start time for cursor-export streams, shifted by the lookback
    pub fn export_start(&self, bookmark: DateTime<Utc>) -> DateTime<Utc> {
        bookmark - ChronoDuration::minutes(self.lookback_minutes)
    }

    /// HTTP client settings derived from this config
    pub fn http_config(&self) -> HttpClientConfig {
        self.http_config_with_sleeper(Arc::new(TokioSleeper))
    }

    /// HTTP client settings with a custom sleeper
    pub fn http_config_with_sleeper(&self, sleeper: Arc<dyn Sleeper>) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(self.request_timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .auth(self.auth.clone())
            .sleeper(sleeper);

        if let Some(rpm) = self.max_requests_per_minute {
            builder = builder.rate_limit(RateLimiterConfig::per_minute(rpm));
        }

        builder.build()
    }
}

/// Read a numeric setting given as a number or a numeric string
///
/// Missing, null and empty-string values are treated as unset.
fn number_field(field: &str, value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::invalid_value(field, "not a finite number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::invalid_value(field, format!("'{s}' is not a number"))),
        Some(other) => Err(Error::invalid_value(
            field,
            format!("expected a number, got {other}"),
        )),
    }
}

fn positive_integer(field: &str, value: Option<&Value>) -> Result<Option<u64>> {
    match number_field(field, value)? {
        None => Ok(None),
        Some(n) if n >= 1.0 && n.fract() == 0.0 => Ok(Some(n as u64)),
        Some(n) => Err(Error::invalid_value(
            field,
            format!("{n} is not a positive integer"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn base() -> Value {
        json!({
            "subdomain": "acme",
            "access_token": "tok",
            "start_date": "2021-01-01T00:00:00Z"
        })
    }

    fn with(key: &str, value: Value) -> Value {
        let mut config = base();
        config[key] = value;
        config
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = TapConfig::from_value(base()).unwrap();

        assert_eq!(config.base_url, "https://acme.zendesk.com/api/v2");
        assert_eq!(config.auth.scheme(), "bearer");
        assert_eq!(config.start_date.to_rfc3339(), "2021-01-01T00:00:00+00:00");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.search_window_size, None);
        assert_eq!(config.lookback_minutes, 0);
        assert_eq!(config.max_requests_per_minute, None);
        assert_eq!(config.concurrency_limit, 20);
        assert_eq!(config.audits_requests_per_minute, 450);
    }

    #[test]
    fn test_page_size_parsing() {
        let config = TapConfig::from_value(with("page_size", json!("250"))).unwrap();
        assert_eq!(config.page_size, 250);

        let config = TapConfig::from_value(with("page_size", json!(1000))).unwrap();
        assert_eq!(config.page_size, 1000);

        let config = TapConfig::from_value(with("page_size", json!(5000))).unwrap();
        assert_eq!(config.page_size, 100);

        let config = TapConfig::from_value(with("page_size", json!(0))).unwrap();
        assert_eq!(config.page_size, 100);

        let err = TapConfig::from_value(with("page_size", json!("lots"))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_request_timeout_falsy_values_use_default() {
        for value in [json!(0), json!("0"), json!(""), Value::Null] {
            let config = TapConfig::from_value(with("request_timeout", value)).unwrap();
            assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        }

        let config = TapConfig::from_value(with("request_timeout", json!("12.5"))).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(12_500));
    }

    #[test]
    fn test_search_window_size_validation() {
        let err = TapConfig::from_value(with("search_window_size", json!(1))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Search window size cannot be less than 2"
        );

        let config = TapConfig::from_value(with("search_window_size", json!("30"))).unwrap();
        assert_eq!(config.search_window_size, Some(30));
    }

    #[test]
    fn test_api_token_auth() {
        let config = TapConfig::from_value(json!({
            "subdomain": "acme",
            "email": "agent@example.com",
            "api_token": "secret",
            "start_date": "2021-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(config.auth.scheme(), "basic");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = TapConfig::from_value(json!({
            "access_token": "tok",
            "start_date": "2021-01-01T00:00:00Z"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "subdomain"));

        let err = TapConfig::from_value(json!({
            "subdomain": "acme",
            "start_date": "2021-01-01T00:00:00Z"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "access_token"));

        let err = TapConfig::from_value(json!({"subdomain": "acme", "access_token": "tok"}))
            .unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "start_date"));

        let err = TapConfig::from_value(with("start_date", json!("yesterday"))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_base_url_override_and_extras() {
        let mut raw = with("base_url", json!("http://127.0.0.1:9000/"));
        raw["max_requests_per_minute"] = json!(700);
        raw["concurrency_limit"] = json!("2");
        raw["audits_requests_per_minute"] = json!(4);
        raw["lookback_minutes"] = json!(15);

        let config = TapConfig::from_value(raw).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.max_requests_per_minute, Some(700));
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.audits_requests_per_minute, 4);
        assert_eq!(
            config.export_start(config.start_date).to_rfc3339(),
            "2020-12-31T23:45:00+00:00"
        );

        let http = config.http_config();
        assert_eq!(http.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(http.rate_limit.is_some());
        assert_eq!(
            http.default_headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_invalid_extras() {
        let err = TapConfig::from_value(with("concurrency_limit", json!(0))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));

        let err = TapConfig::from_value(with("lookback_minutes", json!(-5))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", base()).unwrap();

        let config = TapConfig::from_file(file.path()).unwrap();
        assert_eq!(config.subdomain.as_deref(), Some("acme"));

        let err = TapConfig::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
