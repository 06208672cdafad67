//! HTTP client module
//!
//! Used by the remote document and store API sources.
//!
//! # Features
//!
//! - **Automatic Retries**: transient failures are retried with backoff
//! - **Rate Limiting**: token bucket rate limiter using governor
//! - **Default Headers**: API keys and similar headers on every request

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpSettings};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
