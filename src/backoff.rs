//! Tiered busy-wait back-off, shared by the event bus and any other
//! spin-wait site that needs to trade latency for CPU usage predictably.

use std::hint;
use std::thread;
use std::time::{Duration, Instant};

/// Selects the back-off tier progression used while a thread is waiting
/// for a condition that is expected to resolve quickly (a slot becoming
/// free, a sequence becoming published).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum BackoffMode {
    /// Spin with a CPU pause hint for up to 2048 iterations, then yield
    /// the OS thread repeatedly. Lowest latency, highest CPU usage.
    Aggressive,
    /// A brief pause, then a yield, then escalating sleeps (100µs, then
    /// 500µs). Lower CPU usage at the cost of added latency.
    Relaxed,
    /// Pause, then yield, then a 10µs sleep, then a 100µs sleep; resets to
    /// the yield tier after a long idle period so the next burst of
    /// activity is still picked up with low latency.
    #[default]
    Adaptive,
}

const AGGRESSIVE_SPIN_ITERS: u32 = 2048;
const ADAPTIVE_RESET_IDLE: Duration = Duration::from_millis(1);

/// A single wait-loop's back-off state. One instance per waiting call;
/// `spin()` is called once per failed poll and internally advances
/// through the configured mode's tiers.
pub struct Backoff {
    mode: BackoffMode,
    spins: u32,
    tier: u8,
    started_at: Instant,
    last_progress: Instant,
}

impl Backoff {
    /// Creates a fresh back-off state for `mode`.
    #[must_use]
    pub fn new(mode: BackoffMode) -> Self {
        let now = Instant::now();
        Self {
            mode,
            spins: 0,
            tier: 0,
            started_at: now,
            last_progress: now,
        }
    }

    /// Performs one back-off step: pauses, yields, or sleeps depending on
    /// the mode and how long this instance has been spinning.
    pub fn spin(&mut self) {
        match self.mode {
            BackoffMode::Aggressive => self.spin_aggressive(),
            BackoffMode::Relaxed => self.spin_relaxed(),
            BackoffMode::Adaptive => self.spin_adaptive(),
        }
    }

    /// Call this whenever the waited-for condition makes forward progress
    /// (even if not yet satisfied) so `Adaptive` can reset its idle clock.
    pub fn note_progress(&mut self) {
        self.last_progress = Instant::now();
    }

    fn spin_aggressive(&mut self) {
        if self.spins < AGGRESSIVE_SPIN_ITERS {
            hint::spin_loop();
            self.spins += 1;
        } else {
            thread::yield_now();
        }
    }

    fn spin_relaxed(&mut self) {
        match self.tier {
            0 => {
                hint::spin_loop();
                self.tier = 1;
            }
            1 => {
                thread::yield_now();
                self.tier = 2;
            }
            2 => {
                thread::sleep(Duration::from_micros(100));
                self.tier = 3;
            }
            _ => thread::sleep(Duration::from_micros(500)),
        }
    }

    fn spin_adaptive(&mut self) {
        if self.last_progress.elapsed() > ADAPTIVE_RESET_IDLE {
            self.tier = 1;
            self.started_at = Instant::now();
        }
        match self.tier {
            0 => {
                hint::spin_loop();
                self.tier = 1;
            }
            1 => {
                thread::yield_now();
                self.tier = 2;
            }
            2 => {
                thread::sleep(Duration::from_micros(10));
                self.tier = 3;
            }
            _ => thread::sleep(Duration::from_micros(100)),
        }
        let _ = self.started_at;
    }
}
