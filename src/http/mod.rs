//! HTTP client module
//!
//! Provides the authenticated GET transport used by every stream.
//!
//! # Features
//!
//! - **Typed errors**: every non-success status becomes an `Error::Api`
//!   carrying an `ApiErrorKind`
//! - **Two retry layers**: network failures (5 attempts) and HTTP
//!   statuses (10 attempts), both with exponential backoff
//! - **Server-directed delays**: 429 responses wait for `Retry-After`
//! - **Rate Limiting**: optional token bucket rate limiter using governor
//! - **Injectable sleeps**: all waits go through a `Sleeper`

mod client;
mod rate_limit;
mod sleeper;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
