//! Sliding-window request limiter. Each key keeps the timestamps of its
//! recent requests; a request is admitted while fewer than `max_requests`
//! fall inside the window.

use crate::shared::time::now_millis;
use dashmap::DashMap;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct RateLimiter {
    records: DashMap<String, VecDeque<i64>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_limit(&self, key: &str, max_requests: u32, window_seconds: u32) -> bool {
        if max_requests == 0 || window_seconds == 0 {
            return true;
        }
        let now = now_millis();
        let window_start = now - (window_seconds as i64) * 1000;
        let mut timestamps = self.records.entry(key.to_string()).or_default();
        while timestamps.front().is_some_and(|&t| t < window_start) {
            timestamps.pop_front();
        }
        if timestamps.len() >= max_requests as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Seconds until the oldest in-window request expires; 0 when a retry
    /// would already be admitted.
    pub fn retry_after(&self, key: &str, window_seconds: u32) -> u32 {
        let Some(timestamps) = self.records.get(key) else {
            return 0;
        };
        let now = now_millis();
        let window_start = now - (window_seconds as i64) * 1000;
        for &timestamp in timestamps.iter() {
            if timestamp >= window_start {
                let wait_ms = timestamp + (window_seconds as i64) * 1000 - now;
                if wait_ms > 0 {
                    return (wait_ms as u64).div_ceil(1000) as u32;
                }
                break;
            }
        }
        0
    }

    /// Drop records with no activity inside the retention window.
    pub fn cleanup(&self, retention_seconds: u32) {
        let cutoff = now_millis() - (retention_seconds as i64) * 1000;
        self.records.retain(|_, timestamps| {
            while timestamps.front().is_some_and(|&t| t < cutoff) {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_refuses() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.check_limit("k", 3, 60));
        }
        assert!(!limiter.check_limit("k", 3, 60));
        assert!(limiter.retry_after("k", 60) > 0);
        // A different key is unaffected.
        assert!(limiter.check_limit("other", 3, 60));
    }

    #[test]
    fn zero_limits_disable_checking() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check_limit("k", 0, 60));
        }
    }

    #[test]
    fn cleanup_drops_idle_keys() {
        let limiter = RateLimiter::new();
        assert!(limiter.check_limit("k", 3, 60));
        std::thread::sleep(std::time::Duration::from_millis(5));
        limiter.cleanup(0);
        assert_eq!(limiter.retry_after("k", 60), 0);
    }
}
