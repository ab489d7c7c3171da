//! Bar and bar-event data types.

use crate::decimal::{Price, Volume};
use crate::event::Instrument;
use crate::symbol::SymbolId;
use crate::time::TimePoint;

/// The closing policy family a bar was produced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BarType {
    /// Closes on a fixed wall-clock interval.
    Time,
    /// Closes after a fixed trade count.
    Tick,
    /// Closes once accumulated notional volume crosses a threshold.
    Volume,
    /// Closes once the high/low range crosses a fixed size.
    Range,
    /// Closes once price has moved a fixed "brick" distance from the open.
    Renko,
    /// Heikin-Ashi smoothed variant of a time bar.
    HeikinAshi,
}

/// Why a bar was closed and emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BarCloseReason {
    /// The policy's `should_close` condition fired.
    Threshold,
    /// A gap in the trade stream forced an early close.
    Gap,
    /// The aggregator was stopped with an in-progress bar.
    Forced,
    /// Emitted as a placeholder before any real trade has arrived.
    Warmup,
}

/// Identifies one configured timeframe: a bar type plus its defining
/// parameter (interval-ns for time, tick count for tick, raw threshold for
/// volume, raw delta for range/renko). Field order is load-bearing for
/// `Hash`/`Eq` parity with callers that serialize this as a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TimeframeId {
    /// The bar type.
    pub bar_type: BarType,
    /// The policy's defining scalar.
    pub param: u64,
}

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    /// Opening price.
    pub open: Price,
    /// Highest trade price observed.
    pub high: Price,
    /// Lowest trade price observed.
    pub low: Price,
    /// Closing (most recent) trade price.
    pub close: Price,
    /// Total notional volume traded.
    pub volume: Volume,
    /// Notional volume attributable to aggressive buys.
    pub buy_volume: Volume,
    /// Number of trades folded into this bar.
    pub trade_count: u64,
    /// Timestamp of the bar's first trade, or its aligned interval start
    /// for time bars.
    pub start_time: TimePoint,
    /// Timestamp of the bar's last trade, or its fixed interval end for
    /// time bars.
    pub end_time: TimePoint,
    /// Why the bar closed.
    pub close_reason: BarCloseReason,
}

impl Bar {
    /// `true` iff the bar's OHLC invariants hold: `low <= open,close <=
    /// high`, `start_time <= end_time`, `trade_count >= 1`, `buy_volume <=
    /// volume`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
            && self.start_time <= self.end_time
            && self.trade_count >= 1
            && self.buy_volume <= self.volume
    }
}

/// A closed bar, tagged with the symbol, instrument, and timeframe that
/// produced it.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct BarEvent {
    /// The trading symbol.
    pub symbol: SymbolId,
    /// The instrument class.
    pub instrument: Instrument,
    /// The producing policy's bar type.
    pub bar_type: BarType,
    /// The producing policy's defining parameter.
    pub bar_type_param: u64,
    /// The closed bar.
    pub bar: Bar,
    /// Sequence number assigned by the bus at publish time.
    pub tick_sequence: i64,
}

impl BarEvent {
    /// This event's `(bar_type, bar_type_param)` identity.
    #[must_use]
    pub fn timeframe(&self) -> TimeframeId {
        TimeframeId {
            bar_type: self.bar_type,
            param: self.bar_type_param,
        }
    }
}

impl crate::bus::Sequenced for BarEvent {
    fn set_tick_sequence(&mut self, seq: i64) {
        self.tick_sequence = seq;
    }
}
