use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RateLimitConfig {
    pub(crate) max_requests: u32,
    pub(crate) window: Duration,
}

/// Sliding-window limiter: at most `max_requests` per key inside any `window`.
#[derive(Default)]
pub(crate) struct RateLimiter {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub(crate) async fn allow(&self, key: &str, cfg: &RateLimitConfig) -> bool {
        self.allow_at(key, cfg, Instant::now()).await
    }

    pub(crate) async fn allow_at(&self, key: &str, cfg: &RateLimitConfig, now: Instant) -> bool {
        let mut lock = self.requests.lock().await;
        let recent = lock.entry(key.to_string()).or_default();
        while let Some(oldest) = recent.front() {
            if now.saturating_duration_since(*oldest) >= cfg.window {
                recent.pop_front();
            } else {
                break;
            }
        }
        if recent.len() >= cfg.max_requests as usize {
            return false;
        }
        recent.push_back(now);
        true
    }

    /// Drops keys whose requests have all left the window.
    pub(crate) async fn prune(&self, cfg: &RateLimitConfig, now: Instant) -> usize {
        let mut lock = self.requests.lock().await;
        let before = lock.len();
        lock.retain(|_, recent| {
            recent
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < cfg.window)
        });
        before - lock.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: RateLimitConfig = RateLimitConfig {
        max_requests: 3,
        window: Duration::from_secs(10),
    };

    #[tokio::test]
    async fn rejects_requests_beyond_window_capacity() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("user:1", &CFG, start).await);
        }
        assert!(!limiter.allow_at("user:1", &CFG, start).await);
        assert!(limiter.allow_at("user:2", &CFG, start).await);
    }

    #[tokio::test]
    async fn capacity_returns_once_oldest_request_expires() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        assert!(limiter.allow_at("k", &CFG, start).await);
        for _ in 0..2 {
            assert!(
                limiter
                    .allow_at("k", &CFG, start + Duration::from_secs(5))
                    .await
            );
        }
        assert!(!limiter.allow_at("k", &CFG, start + Duration::from_secs(9)).await);
        assert!(limiter.allow_at("k", &CFG, start + Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn prune_forgets_idle_keys() {
        let limiter = RateLimiter::default();
        let start = Instant::now();
        assert!(limiter.allow_at("idle", &CFG, start).await);
        assert!(
            limiter
                .allow_at("busy", &CFG, start + Duration::from_secs(8))
                .await
        );
        let pruned = limiter.prune(&CFG, start + Duration::from_secs(12)).await;
        assert_eq!(pruned, 1);
    }
}
