// In-memory sliding-window limiter for OTP sends
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now())
    }

    fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = match self.requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop hits outside the window, and keys left with none
        requests.retain(|_, hits| {
            hits.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !hits.is_empty()
        });

        let entry = requests.entry(key.to_string()).or_default();
        if entry.len() < self.max_requests {
            entry.push(now);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

/// 5 OTP sends per phone per 10 minutes.
pub fn otp_rate_limiter() -> RateLimiter {
    RateLimiter::new(5, Duration::from_secs(600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_key() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.is_allowed("+919876543210"));
        assert!(limiter.is_allowed("+919876543210"));
        assert!(!limiter.is_allowed("+919876543210"));
        assert!(limiter.is_allowed("+919812345678"));
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.is_allowed_at("k", start));
        assert!(!limiter.is_allowed_at("k", start + Duration::from_secs(5)));
        assert!(limiter.is_allowed_at("k", start + Duration::from_secs(11)));
    }

    #[test]
    fn test_idle_keys_are_dropped() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));
        let start = Instant::now();
        for i in 0..100 {
            assert!(limiter.is_allowed_at(&format!("+9198000000{:02}", i), start));
        }
        assert_eq!(limiter.tracked_keys(), 100);

        // Only the key that just hit survives once the window has passed
        assert!(limiter.is_allowed_at("+919876543210", start + Duration::from_secs(11)));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_denied_key_is_kept() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.is_allowed_at("k", start));
        assert!(!limiter.is_allowed_at("k", start + Duration::from_secs(1)));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_otp_limiter_allows_five() {
        let limiter = otp_rate_limiter();
        for _ in 0..5 {
            assert!(limiter.is_allowed("phone"));
        }
        assert!(!limiter.is_allowed("phone"));
    }
}
