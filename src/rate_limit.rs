use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// buckets are swept once the map grows past this many live keys
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub ok: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl Decision {
    /// Seconds until the window resets, rounded up, never below 1.
    pub fn retry_after_secs(&self) -> u64 {
        let left = self.reset_at.saturating_duration_since(Instant::now());
        let mut secs = left.as_secs();
        if left.subsec_nanos() > 0 {
            secs += 1;
        }
        secs.max(1)
    }
}

/// Fixed-window request counter keyed by `(endpoint key, client identifier)`.
/// Lives in `web::Data` and is shared by all workers; state is per-process
/// and does not survive restarts.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, identifier: &str, limit: u32, window: Duration) -> Decision {
        self.check_at(key, identifier, limit, window, Instant::now())
    }

    fn check_at(
        &self,
        key: &str,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> Decision {
        let bucket_key = format!("{}:{}", key, identifier);
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if buckets.len() > PURGE_THRESHOLD {
            buckets.retain(|_, bucket| bucket.reset_at > now);
        }

        match buckets.get_mut(&bucket_key) {
            Some(bucket) if now <= bucket.reset_at => {
                if bucket.count >= limit {
                    return Decision {
                        ok: false,
                        remaining: 0,
                        reset_at: bucket.reset_at,
                    };
                }
                bucket.count += 1;
                Decision {
                    ok: true,
                    remaining: limit.saturating_sub(bucket.count),
                    reset_at: bucket.reset_at,
                }
            }
            // absent or expired: the window restarts with this request
            _ => {
                let reset_at = now + window;
                buckets.insert(bucket_key, Bucket { count: 1, reset_at });
                Decision {
                    ok: true,
                    remaining: limit.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn eleventh_request_in_window_is_rejected() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..10u64 {
            let d = limiter.check_at(
                "reviews:post",
                "1.2.3.4",
                10,
                WINDOW,
                start + Duration::from_secs(i),
            );
            assert!(d.ok, "request {} should pass", i + 1);
        }

        let d = limiter.check_at(
            "reviews:post",
            "1.2.3.4",
            10,
            WINDOW,
            start + Duration::from_secs(10),
        );
        assert!(!d.ok);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.check_at("feedback:post", "ip", 10, WINDOW, start);
        }
        assert!(!limiter.check_at("feedback:post", "ip", 10, WINDOW, start).ok);

        let later = start + WINDOW + Duration::from_millis(1);
        let d = limiter.check_at("feedback:post", "ip", 10, WINDOW, later);
        assert!(d.ok);
        assert_eq!(d.remaining, 9);
    }

    #[test]
    fn boundary_instant_still_belongs_to_the_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.check_at("qr:post", "ip", 1, WINDOW, start);
        let d = limiter.check_at("qr:post", "ip", 1, WINDOW, start + WINDOW);
        assert!(!d.ok);
    }

    #[test]
    fn keys_and_identifiers_do_not_interfere() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(limiter.check_at("feedback:post", "a", 5, WINDOW, now).ok);
        }
        assert!(!limiter.check_at("feedback:post", "a", 5, WINDOW, now).ok);
        assert!(limiter.check_at("feedback:post", "b", 5, WINDOW, now).ok);
        assert!(limiter.check_at("reviews:post", "a", 10, WINDOW, now).ok);
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        assert_eq!(limiter.check_at("k", "ip", 3, WINDOW, now).remaining, 2);
        assert_eq!(limiter.check_at("k", "ip", 3, WINDOW, now).remaining, 1);
        assert_eq!(limiter.check_at("k", "ip", 3, WINDOW, now).remaining, 0);

        let d = limiter.check_at("k", "ip", 3, WINDOW, now);
        assert!(!d.ok);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        limiter.check_at("k", "ip", 1, WINDOW, now);
        let d = limiter.check_at("k", "ip", 1, WINDOW, now);
        assert!(!d.ok);

        let retry = d.retry_after_secs();
        assert!((1..=60).contains(&retry), "retry_after {}", retry);
    }

    #[test]
    fn expired_buckets_are_purged_past_the_threshold() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..=PURGE_THRESHOLD {
            limiter.check_at("k", &i.to_string(), 1, Duration::from_secs(1), start);
        }

        let later = start + Duration::from_secs(2);
        limiter.check_at("k", "fresh", 1, Duration::from_secs(1), later);

        let len = limiter.buckets.lock().unwrap().len();
        assert!(len <= 2, "expected sweep, got {} buckets", len);
    }
}
