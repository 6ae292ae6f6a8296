//! Sliding-window rate limiting for outbound HubSpot requests
//!
//! HubSpot publishes a quota of 150 requests per 10 seconds per private app
//! token. [`SlidingWindowLimiter::admit`] delays callers until the next request
//! fits in the window; it never rejects. All runs sharing a token share one
//! limiter through [`RateLimiterRegistry`], so the quota holds across
//! concurrent extractions.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default number of requests allowed per window
pub const DEFAULT_MAX_REQUESTS: usize = 150;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Added to every computed wait so the oldest entry has left the window on wake-up
const WAIT_SLACK: Duration = Duration::from_millis(100);

/// Quota applied by a limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Request-timestamp window guarding one credential
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let max_requests = config.max_requests.max(1);
        Self {
            max_requests,
            window: config.window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Wait until a request may be issued, then record it.
    ///
    /// The window lock is held while waiting, so admissions are granted in
    /// arrival order and no two callers can both claim the last free slot.
    pub async fn admit(&self) {
        let mut timestamps = self.timestamps.lock().await;

        loop {
            let now = Instant::now();
            self.prune(&mut timestamps, now);

            if timestamps.len() < self.max_requests {
                break;
            }

            let Some(oldest) = timestamps.front().copied() else {
                break;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest)) + WAIT_SLACK;

            warn!(
                wait_ms = wait.as_millis() as u64,
                in_window = timestamps.len(),
                "Rate limit reached, delaying request"
            );
            tokio::time::sleep(wait).await;
        }

        timestamps.push_back(Instant::now());
        debug!(in_window = timestamps.len(), "Request admitted");
    }

    /// Number of requests currently counted against the window
    pub async fn in_flight_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Hands out one shared limiter per access token.
///
/// Tokens are keyed by their SHA-256 digest so the registry never holds a
/// credential in clear.
#[derive(Debug, Clone)]
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    limiters: Arc<Mutex<HashMap<String, Arc<SlidingWindowLimiter>>>>,
}

impl RateLimiterRegistry {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Limiter for the given token, created on first use
    pub async fn for_token(&self, access_token: &str) -> Arc<SlidingWindowLimiter> {
        let key = credential_fingerprint(access_token);
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(key)
            .or_insert_with(|| Arc::new(SlidingWindowLimiter::new(self.config)))
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.limiters.lock().await.len()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Hex SHA-256 of a credential
pub fn credential_fingerprint(access_token: &str) -> String {
    format!("{:x}", Sha256::digest(access_token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_quota_without_waiting() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 5,
            window: Duration::from_secs(1),
        });
        let start = Instant::now();

        for _ in 0..5 {
            limiter.admit().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_flight_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_over_quota_waits_for_window_boundary() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig::default());
        let start = Instant::now();

        for _ in 0..DEFAULT_MAX_REQUESTS {
            limiter.admit().await;
        }
        limiter.admit().await;

        assert!(start.elapsed() >= DEFAULT_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spread_requests_never_exceed_quota_in_any_window() {
        let config = RateLimitConfig {
            max_requests: 10,
            window: Duration::from_secs(2),
        };
        let limiter = SlidingWindowLimiter::new(config);
        let mut admitted = Vec::new();

        for i in 0..45u64 {
            if i % 7 == 0 {
                tokio::time::advance(Duration::from_millis(130)).await;
            }
            limiter.admit().await;
            admitted.push(Instant::now());
        }

        for (i, t) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|later| later.duration_since(*t) < config.window)
                .count();
            assert!(in_window <= config.max_requests, "window starting at {i} holds {in_window}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_quota() {
        let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 4,
            window: Duration::from_secs(1),
        }));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.admit().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }

        let immediate = times.iter().filter(|t| t.duration_since(start) < Duration::from_secs(1)).count();
        assert_eq!(immediate, 4);
    }

    #[tokio::test]
    async fn test_registry_shares_limiter_per_token() {
        let registry = RateLimiterRegistry::default();

        let a = registry.for_token("token-a").await;
        let a_again = registry.for_token("token-a").await;
        let b = registry.for_token("token-b").await;

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len().await, 2);
    }

    #[test]
    fn test_fingerprint_hides_token() {
        let fp = credential_fingerprint("pat-na1-secret");
        assert_eq!(fp.len(), 64);
        assert!(!fp.contains("secret"));
        assert_eq!(fp, credential_fingerprint("pat-na1-secret"));
    }
}
