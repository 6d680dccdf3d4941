//! Sliding-window rate limiting keyed by client IP.
//!
//! Memory is bounded two ways: a periodic sweep every `cleanup_interval`
//! checks, and a hard cap on the number of tracked addresses. A new address
//! arriving while the cap is reached is rejected after a forced sweep.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use thiserror::Error;
use tracing::{debug, warn};

use super::{client_ip, error_response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    /// Sweep stale entries every N checks.
    pub cleanup_interval: u64,
    pub max_tracked_ips: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            cleanup_interval: 100,
            max_tracked_ips: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limit exceeded, retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    state: RwLock<HashMap<IpAddr, Vec<Instant>>>,
    request_count: AtomicU64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HashMap::new()),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs)
    }

    /// Records a request from `ip` or reports how long the caller must wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), RateLimitExceeded> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), RateLimitExceeded> {
        let window = self.window();
        let cutoff = now.checked_sub(window).unwrap_or(now);

        let count = self.request_count.fetch_add(1, Ordering::Relaxed);
        if count > 0 && self.config.cleanup_interval > 0 && count % self.config.cleanup_interval == 0
        {
            debug!(request_count = count, "running periodic rate limiter cleanup");
            self.cleanup();
        }

        let is_tracked = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state.contains_key(&ip)
        };
        if !is_tracked && self.at_capacity() {
            debug!(
                tracked_ips = self.config.max_tracked_ips,
                "max tracked IPs reached, forcing cleanup"
            );
            self.cleanup();
            if self.at_capacity() {
                warn!(ip = %ip, "rate limiter at capacity, rejecting new client");
                return Err(RateLimitExceeded {
                    retry_after_secs: self.config.window_secs.max(1),
                });
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let timestamps = state.entry(ip).or_default();
        timestamps.retain(|&t| t > cutoff);

        if timestamps.len() >= self.config.max_requests as usize {
            let oldest = timestamps.iter().min().copied().unwrap_or(now);
            let waited = now.saturating_duration_since(oldest);
            let remaining = window.saturating_sub(waited);
            let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            warn!(
                ip = %ip,
                requests = timestamps.len(),
                max = self.config.max_requests,
                "rate limit exceeded"
            );
            return Err(RateLimitExceeded {
                retry_after_secs: retry_after_secs.max(1),
            });
        }

        timestamps.push(now);
        Ok(())
    }

    fn at_capacity(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.len() >= self.config.max_tracked_ips
    }

    /// Drops timestamps outside the window and forgets idle addresses.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window()).unwrap_or(now);

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.retain(|_, timestamps| {
            timestamps.retain(|&t| t > cutoff);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_ips(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Middleware guarding public endpoints; answers 429 with `Retry-After`.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    match limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(exceeded) => {
            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Хэт олон хүсэлт илгээлээ. Түр хүлээгээд дахин оролдоно уу.",
            );
            if let Ok(value) = HeaderValue::from_str(&exceeded.retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn allows_requests_under_limit() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 3,
            window_secs: 60,
            ..Default::default()
        });

        for _ in 0..3 {
            assert!(limiter.check(ip(1)).is_ok());
        }
    }

    #[test]
    fn blocks_requests_over_limit_with_retry_hint() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 2,
            window_secs: 60,
            ..Default::default()
        });
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start).is_ok());
        let err = limiter
            .check_at(ip(1), start + Duration::from_secs(15))
            .expect_err("third request is limited");

        assert_eq!(err.retry_after_secs, 45);
    }

    #[test]
    fn limits_are_tracked_per_address() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 60,
            ..Default::default()
        });

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_ok());
    }

    #[test]
    fn window_slides_forward() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 10,
            ..Default::default()
        });
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start).is_ok());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(5)).is_err());
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(11)).is_ok());
    }

    #[test]
    fn rejects_new_addresses_at_capacity() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 10,
            window_secs: 60,
            cleanup_interval: 1_000,
            max_tracked_ips: 2,
        });

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(2)).is_ok());
        assert!(limiter.check(ip(3)).is_err());
        assert!(limiter.check(ip(1)).is_ok());
        assert_eq!(limiter.tracked_ips(), 2);
    }
}
