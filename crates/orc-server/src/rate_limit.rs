//! Request admission: API key check plus a per-key token bucket.
//!
//! `RateLimiter` is a trait (like `ModelClient`/`RoutingPolicy`'s
//! internal RNG seam) so the token-bucket default can be swapped in
//! tests without timing-sensitive sleeps.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

pub trait RateLimiter: Send + Sync {
    /// Returns `(allowed, retry_after_ms)`. `retry_after_ms` is only
    /// meaningful when `allowed` is `false`.
    fn allow(&self, key: &str) -> (bool, u64);
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Classic token bucket: `burst` capacity, refilled at `rps` tokens
/// per second. One bucket per key, created lazily.
pub struct TokenBucketLimiter {
    rps: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new(rps: f64, burst: u32) -> Self {
        Self {
            rps: rps.max(0.01),
            burst: (burst.max(1)) as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn allow(&self, key: &str) -> (bool, u64) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            (true, 0)
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_ms = ((deficit / self.rps) * 1000.0).ceil() as u64;
            (false, retry_ms)
        }
    }
}

/// Middleware applied to every `/v1/*` route: checks `X-API-Key`
/// against `config.api_key` (skipped entirely when unset, for local
/// dev) and then admits the request through the rate limiter, keyed
/// on the API key or `"anonymous"`.
pub async fn guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    if let Some(expected) = &state.config.api_key {
        if provided != Some(expected.as_str()) {
            return ApiError::Unauthorized.into_response();
        }
    }

    let key = provided.unwrap_or("anonymous");
    let (allowed, retry_after_ms) = state.rate_limiter.allow(key);
    if !allowed {
        return ApiError::RateLimited { retry_after_ms }.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_exhausted_then_refills() {
        let limiter = TokenBucketLimiter::new(10.0, 2);
        assert!(limiter.allow("k").0);
        assert!(limiter.allow("k").0);
        let (allowed, retry_ms) = limiter.allow("k");
        assert!(!allowed);
        assert!(retry_ms > 0);
    }

    #[test]
    fn separate_keys_have_independent_buckets() {
        let limiter = TokenBucketLimiter::new(1.0, 1);
        assert!(limiter.allow("a").0);
        assert!(limiter.allow("b").0);
    }
}
