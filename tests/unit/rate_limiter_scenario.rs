use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use flox::prelude::*;

#[test]
fn concurrent_drain_admits_exactly_capacity_acquisitions() {
    let limiter = Arc::new(RateLimiter::new(
        RateLimiterConfig { capacity: 1000, refill_rate_per_sec: 1.0 },
        0,
    ));
    let succeeded = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let limiter = limiter.clone();
            let succeeded = succeeded.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    if limiter.try_acquire(1, 0) {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(succeeded.load(Ordering::Relaxed), 1000);
    assert_eq!(limiter.available(), 0);
}
