//! Lock-free token-bucket rate limiter for the order-submission path.

use std::sync::atomic::{AtomicI64, Ordering};

/// Configuration for a [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Maximum tokens the bucket can hold.
    pub capacity: i64,
    /// Tokens added per second.
    pub refill_rate_per_sec: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_rate_per_sec: 100.0,
        }
    }
}

/// A token bucket gating order submission, implemented with two atomics
/// and a CAS refill-then-acquire protocol so concurrent callers never need
/// a lock.
pub struct RateLimiter {
    capacity: i64,
    ns_per_token: f64,
    tokens: AtomicI64,
    last_refill_ns: AtomicI64,
}

impl RateLimiter {
    /// Creates a limiter starting at full capacity, with `now_ns` as its
    /// initial refill reference point.
    #[must_use]
    pub fn new(config: RateLimiterConfig, now_ns: i64) -> Self {
        Self {
            capacity: config.capacity,
            ns_per_token: 1e9 / config.refill_rate_per_sec,
            tokens: AtomicI64::new(config.capacity),
            last_refill_ns: AtomicI64::new(now_ns),
        }
    }

    fn refill(&self, now_ns: i64) {
        let last = self.last_refill_ns.load(Ordering::Acquire);
        let elapsed = now_ns.saturating_sub(last);
        if elapsed <= 0 {
            return;
        }
        let tokens_to_add = (elapsed as f64 / self.ns_per_token) as i64;
        if tokens_to_add <= 0 {
            return;
        }
        let advance_ns = (tokens_to_add as f64 * self.ns_per_token) as i64;
        if self
            .last_refill_ns
            .compare_exchange(last, last + advance_ns, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // another thread already advanced the refill clock; its CAS on
            // `tokens` below covers this round, nothing more to do here.
            return;
        }
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                Some((t + tokens_to_add).min(self.capacity))
            })
            .expect("fetch_update closure always returns Some");
    }

    /// Attempts to atomically acquire `n` tokens after refilling. Returns
    /// `true` if the tokens were taken, `false` if insufficient tokens
    /// remain.
    pub fn try_acquire(&self, n: i64, now_ns: i64) -> bool {
        self.refill(now_ns);
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| (t >= n).then_some(t - n))
            .is_ok()
    }

    /// Current token count, for diagnostics and tests.
    #[must_use]
    pub fn available(&self) -> i64 {
        self.tokens.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquires_up_to_capacity_then_refuses() {
        let limiter = RateLimiter::new(
            RateLimiterConfig {
                capacity: 3,
                refill_rate_per_sec: 1.0,
            },
            0,
        );
        assert!(limiter.try_acquire(1, 0));
        assert!(limiter.try_acquire(1, 0));
        assert!(limiter.try_acquire(1, 0));
        assert!(!limiter.try_acquire(1, 0));
    }

    #[test]
    fn refills_proportionally_to_elapsed_time() {
        let limiter = RateLimiter::new(
            RateLimiterConfig {
                capacity: 10,
                refill_rate_per_sec: 10.0,
            },
            0,
        );
        for _ in 0..10 {
            assert!(limiter.try_acquire(1, 0));
        }
        assert!(!limiter.try_acquire(1, 0));
        // 500ms at 10 tokens/sec refills 5 tokens.
        for _ in 0..5 {
            assert!(limiter.try_acquire(1, 500_000_000));
        }
        assert!(!limiter.try_acquire(1, 500_000_000));
    }

    #[test]
    fn concurrent_acquires_never_exceed_capacity() {
        let limiter = Arc::new(RateLimiter::new(
            RateLimiterConfig {
                capacity: 50,
                refill_rate_per_sec: 1.0,
            },
            0,
        ));
        let mut handles = Vec::new();
        let granted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let granted = Arc::clone(&granted);
            handles.push(thread::spawn(move || {
                for _ in 0..20 {
                    if limiter.try_acquire(1, 0) {
                        granted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(granted.load(Ordering::Relaxed), 50);
        assert_eq!(limiter.available(), 0);
    }
}
