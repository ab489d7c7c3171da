//! Opt-in bus counters, gated behind the `metrics` feature.

use bitflags::bitflags;

bitflags! {
    /// Selects which [`super::EventBus::metrics`] counters to read.
    ///
    /// Mirrors the teacher's `MetricFlags` pattern of letting a caller
    /// opt into only the counters it needs rather than always paying for
    /// all of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct BusMetricFlags: u32 {
        /// Count of events successfully published.
        const PUBLISHED = 1 << 0;
        /// Count of `try_publish` calls that committed a placeholder.
        const TIMEOUTS = 1 << 1;
        /// Both counters.
        const ALL = Self::PUBLISHED.bits() | Self::TIMEOUTS.bits();
    }
}

/// A point-in-time read of the selected bus counters. Fields not selected
/// by the requested [`BusMetricFlags`] are left at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BusMetrics {
    /// Total events published (excludes placeholders).
    pub published: u64,
    /// Total placeholders committed by `try_publish` timeouts.
    pub timeouts: u64,
}
