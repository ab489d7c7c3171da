//! Configuration surface for [`super::EventBus`].

use crate::backoff::BackoffMode;

/// Default bus capacity, matching the original engine's
/// `DEFAULT_EVENTBUS_CAPACITY`. Must remain a power of two.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Default maximum consumer count, matching the original engine's
/// `DEFAULT_EVENTBUS_MAX_CONSUMERS`.
pub const DEFAULT_MAX_CONSUMERS: usize = 128;

/// Runtime-tunable bus behavior. Capacity and consumer-count ceilings are
/// fixed at the type level via `EventBus`'s const generics; this struct
/// holds the knobs that can vary without changing the bus's shape.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct EventBusConfig {
    /// Back-off tier progression used by both the producer (waiting for a
    /// slot to free up) and consumers (waiting for the next sequence).
    pub backoff_mode: BackoffMode,
    /// Whether `stop()` lets every consumer drain all already-published
    /// sequences before its thread exits, versus exiting as soon as the
    /// stop flag is observed.
    pub drain_on_stop: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            backoff_mode: BackoffMode::Adaptive,
            drain_on_stop: true,
        }
    }
}

/// Named CPU core groups a consumer thread may be pinned to. Pinning is a
/// best-effort optimization: on platforms or configurations where it is
/// unavailable, subscription silently falls back to the default scheduler
/// placement rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoreAffinityClass {
    /// Threads consuming raw market data.
    MarketData,
    /// Threads on the order-submission path.
    Execution,
    /// Strategy/signal threads.
    Strategy,
    /// Risk-check threads.
    Risk,
    /// Anything not covered above.
    General,
}

/// Per-consumer subscription options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// If set, the consumer thread attempts to pin itself to the named
    /// core class and request a real-time scheduling priority. Best
    /// effort; failures are logged at `debug` and otherwise ignored.
    pub affinity: Option<CoreAffinityClass>,
}
