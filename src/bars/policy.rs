//! Bar closing policies.
//!
//! Each policy is monomorphized through the [`BarPolicy`] trait for the
//! single-policy aggregator's generic hot path, and erased into the closed
//! [`Policy`] enum for the multi-timeframe aggregator, which needs to hold
//! a heterogeneous, runtime-configured set of policies in one collection.

use crate::bars::bar::{Bar, BarCloseReason, BarType};
use crate::decimal::{Price, Quantity, Volume};
use crate::event::TradeEvent;
use crate::time::TimePoint;

/// Per-symbol state a policy needs beyond the bar itself. Only Heikin-Ashi
/// uses this today (previous HA open/close), but it lives on the
/// per-symbol map entry rather than the policy object so a single policy
/// instance can be shared across symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyState {
    /// The previous bar's Heikin-Ashi open, if one has closed yet.
    pub prev_ha_open: Option<Price>,
    /// The previous bar's Heikin-Ashi close, if one has closed yet.
    pub prev_ha_close: Option<Price>,
}

/// Capability set every bar closing policy implements.
pub trait BarPolicy {
    /// This policy's bar type tag.
    fn bar_type(&self) -> BarType;

    /// The policy's defining scalar: interval-ns for time, tick count for
    /// tick, raw threshold for volume, raw delta for range/renko.
    fn param(&self) -> u64;

    /// `true` if `trade` should close `bar` rather than update it.
    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool;

    /// Builds the first bar for a symbol from its first trade.
    fn init_bar(&self, trade: &TradeEvent, state: &mut PolicyState) -> Bar;

    /// Folds `trade` into an already-open `bar`.
    fn update(&self, trade: &TradeEvent, bar: &mut Bar, state: &mut PolicyState);

    /// Called once, immediately before a closed bar is emitted, so
    /// policies that post-process the accumulated OHLC (Heikin-Ashi) can
    /// do so with the final values in hand. Default: no-op.
    fn finalize(&self, _bar: &mut Bar, _state: &mut PolicyState) {}
}

fn fold_trade(bar: &mut Bar, trade: &TradeEvent, track_end_time: bool) {
    let notional = trade.price.mul_qty(trade.quantity);
    bar.high = bar.high.max(trade.price);
    bar.low = bar.low.min(trade.price);
    bar.close = trade.price;
    bar.volume = bar.volume + notional;
    bar.trade_count += 1;
    if trade.is_buy {
        bar.buy_volume = bar.buy_volume + notional;
    }
    if track_end_time {
        bar.end_time = TimePoint::from_unix_ns(trade.exchange_ts_ns);
    }
}

fn init_default(trade: &TradeEvent, start: TimePoint, end: TimePoint) -> Bar {
    let notional = trade.price.mul_qty(trade.quantity);
    Bar {
        open: trade.price,
        high: trade.price,
        low: trade.price,
        close: trade.price,
        volume: notional,
        buy_volume: if trade.is_buy { notional } else { Volume::ZERO },
        trade_count: 1,
        start_time: start,
        end_time: end,
        close_reason: BarCloseReason::Warmup,
    }
}

/// Closes on a fixed wall-clock interval; `end_time` is fixed at `init_bar`
/// and does not move as trades arrive.
pub struct TimeBarPolicy {
    interval_ns: i64,
}

impl TimeBarPolicy {
    /// Creates a policy closing every `interval_ns` nanoseconds.
    #[must_use]
    pub fn new(interval_ns: i64) -> Self {
        Self { interval_ns }
    }
}

impl BarPolicy for TimeBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::Time
    }

    fn param(&self) -> u64 {
        self.interval_ns as u64
    }

    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool {
        let aligned = TimePoint::from_unix_ns(trade.exchange_ts_ns).align_to_interval(self.interval_ns);
        aligned != bar.start_time
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let start = TimePoint::from_unix_ns(trade.exchange_ts_ns).align_to_interval(self.interval_ns);
        let end = start + self.interval_ns;
        init_default(trade, start, end)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, false);
    }
}

/// Closes after a fixed number of trades.
pub struct TickBarPolicy {
    tick_count: u64,
}

impl TickBarPolicy {
    /// Creates a policy closing every `tick_count` trades.
    #[must_use]
    pub fn new(tick_count: u64) -> Self {
        Self { tick_count }
    }
}

impl BarPolicy for TickBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::Tick
    }

    fn param(&self) -> u64 {
        self.tick_count
    }

    fn should_close(&self, _trade: &TradeEvent, bar: &Bar) -> bool {
        bar.trade_count >= self.tick_count
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let ts = TimePoint::from_unix_ns(trade.exchange_ts_ns);
        init_default(trade, ts, ts)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, true);
    }
}

/// Closes once accumulated notional volume crosses a threshold.
pub struct VolumeBarPolicy {
    threshold_raw: i64,
}

impl VolumeBarPolicy {
    /// Creates a policy closing once accumulated volume reaches
    /// `threshold` (raw scaled units).
    #[must_use]
    pub fn new(threshold: Volume) -> Self {
        Self {
            threshold_raw: threshold.raw(),
        }
    }
}

impl BarPolicy for VolumeBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::Volume
    }

    /// Divides the raw threshold by 1000 for its `TimeframeId` identity.
    /// Two policies whose thresholds differ by less than 1000 raw units
    /// will collide on the same `TimeframeId`; not a correctness bug for a
    /// single configured policy, but a known limitation if several
    /// close-threshold volume policies are registered side by side.
    fn param(&self) -> u64 {
        (self.threshold_raw / 1000) as u64
    }

    fn should_close(&self, _trade: &TradeEvent, bar: &Bar) -> bool {
        bar.volume.raw() >= self.threshold_raw
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let ts = TimePoint::from_unix_ns(trade.exchange_ts_ns);
        init_default(trade, ts, ts)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, true);
    }
}

/// Closes once the high/low range crosses a fixed size.
pub struct RangeBarPolicy {
    range_size: Price,
}

impl RangeBarPolicy {
    /// Creates a policy closing once `high - low >= range_size`.
    #[must_use]
    pub fn new(range_size: Price) -> Self {
        Self { range_size }
    }
}

impl BarPolicy for RangeBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::Range
    }

    /// Narrows the raw price delta to 32 bits for its `TimeframeId`
    /// identity. Values exceeding 2^31 raw units (roughly 2147.48 in
    /// display units at the default scale) will alias; treated as an
    /// intentional capacity bound rather than a bug to fix.
    fn param(&self) -> u64 {
        (self.range_size.raw() as u32) as u64
    }

    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool {
        let candidate_high = bar.high.max(trade.price);
        let candidate_low = bar.low.min(trade.price);
        candidate_high - candidate_low >= self.range_size
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let ts = TimePoint::from_unix_ns(trade.exchange_ts_ns);
        init_default(trade, ts, ts)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, true);
    }
}

/// Closes once price has moved a fixed "brick" distance away from the
/// bar's open (not its close).
pub struct RenkoBarPolicy {
    brick_size: Price,
}

impl RenkoBarPolicy {
    /// Creates a policy closing once `|price - open| >= brick_size`.
    #[must_use]
    pub fn new(brick_size: Price) -> Self {
        Self { brick_size }
    }
}

impl BarPolicy for RenkoBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::Renko
    }

    /// See [`RangeBarPolicy::param`]: same u32-narrowing capacity bound.
    fn param(&self) -> u64 {
        (self.brick_size.raw() as u32) as u64
    }

    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool {
        (trade.price - bar.open).abs() >= self.brick_size
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let ts = TimePoint::from_unix_ns(trade.exchange_ts_ns);
        init_default(trade, ts, ts)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, true);
    }
}

/// Heikin-Ashi smoothed variant of a time bar: closes on the same interval
/// boundary as [`TimeBarPolicy`], but overwrites the accumulated raw OHLC
/// with the smoothed Heikin-Ashi values just before emission.
pub struct HeikinAshiBarPolicy {
    interval_ns: i64,
}

impl HeikinAshiBarPolicy {
    /// Creates a policy closing every `interval_ns` nanoseconds.
    #[must_use]
    pub fn new(interval_ns: i64) -> Self {
        Self { interval_ns }
    }
}

impl BarPolicy for HeikinAshiBarPolicy {
    fn bar_type(&self) -> BarType {
        BarType::HeikinAshi
    }

    fn param(&self) -> u64 {
        self.interval_ns as u64
    }

    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool {
        let aligned = TimePoint::from_unix_ns(trade.exchange_ts_ns).align_to_interval(self.interval_ns);
        aligned != bar.start_time
    }

    fn init_bar(&self, trade: &TradeEvent, _state: &mut PolicyState) -> Bar {
        let start = TimePoint::from_unix_ns(trade.exchange_ts_ns).align_to_interval(self.interval_ns);
        let end = start + self.interval_ns;
        init_default(trade, start, end)
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, _state: &mut PolicyState) {
        fold_trade(bar, trade, false);
    }

    fn finalize(&self, bar: &mut Bar, state: &mut PolicyState) {
        let raw_open = bar.open;
        let raw_high = bar.high;
        let raw_low = bar.low;
        let raw_close = bar.close;

        let ha_open = match (state.prev_ha_open, state.prev_ha_close) {
            (Some(prev_open), Some(prev_close)) => {
                Price::from_raw((prev_open.raw() + prev_close.raw()) / 2)
            }
            _ => Price::from_raw((raw_open.raw() + raw_close.raw()) / 2),
        };
        let ha_close = Price::from_raw(
            (raw_open.raw() + raw_high.raw() + raw_low.raw() + raw_close.raw()) / 4,
        );
        let ha_high = raw_high.max(ha_open).max(ha_close);
        let ha_low = raw_low.min(ha_open).min(ha_close);

        bar.open = ha_open;
        bar.high = ha_high;
        bar.low = ha_low;
        bar.close = ha_close;

        state.prev_ha_open = Some(ha_open);
        state.prev_ha_close = Some(ha_close);
    }
}

/// A closed sum type over every policy kind, for the multi-timeframe
/// aggregator's heterogeneous policy set. Using a native enum here (rather
/// than a manually managed tagged union) is the deliberate choice over the
/// source's C++ approach.
pub enum Policy {
    /// See [`TimeBarPolicy`].
    Time(TimeBarPolicy),
    /// See [`TickBarPolicy`].
    Tick(TickBarPolicy),
    /// See [`VolumeBarPolicy`].
    Volume(VolumeBarPolicy),
    /// See [`RangeBarPolicy`].
    Range(RangeBarPolicy),
    /// See [`RenkoBarPolicy`].
    Renko(RenkoBarPolicy),
    /// See [`HeikinAshiBarPolicy`].
    HeikinAshi(HeikinAshiBarPolicy),
}

impl BarPolicy for Policy {
    fn bar_type(&self) -> BarType {
        match self {
            Policy::Time(p) => p.bar_type(),
            Policy::Tick(p) => p.bar_type(),
            Policy::Volume(p) => p.bar_type(),
            Policy::Range(p) => p.bar_type(),
            Policy::Renko(p) => p.bar_type(),
            Policy::HeikinAshi(p) => p.bar_type(),
        }
    }

    fn param(&self) -> u64 {
        match self {
            Policy::Time(p) => p.param(),
            Policy::Tick(p) => p.param(),
            Policy::Volume(p) => p.param(),
            Policy::Range(p) => p.param(),
            Policy::Renko(p) => p.param(),
            Policy::HeikinAshi(p) => p.param(),
        }
    }

    fn should_close(&self, trade: &TradeEvent, bar: &Bar) -> bool {
        match self {
            Policy::Time(p) => p.should_close(trade, bar),
            Policy::Tick(p) => p.should_close(trade, bar),
            Policy::Volume(p) => p.should_close(trade, bar),
            Policy::Range(p) => p.should_close(trade, bar),
            Policy::Renko(p) => p.should_close(trade, bar),
            Policy::HeikinAshi(p) => p.should_close(trade, bar),
        }
    }

    fn init_bar(&self, trade: &TradeEvent, state: &mut PolicyState) -> Bar {
        match self {
            Policy::Time(p) => p.init_bar(trade, state),
            Policy::Tick(p) => p.init_bar(trade, state),
            Policy::Volume(p) => p.init_bar(trade, state),
            Policy::Range(p) => p.init_bar(trade, state),
            Policy::Renko(p) => p.init_bar(trade, state),
            Policy::HeikinAshi(p) => p.init_bar(trade, state),
        }
    }

    fn update(&self, trade: &TradeEvent, bar: &mut Bar, state: &mut PolicyState) {
        match self {
            Policy::Time(p) => p.update(trade, bar, state),
            Policy::Tick(p) => p.update(trade, bar, state),
            Policy::Volume(p) => p.update(trade, bar, state),
            Policy::Range(p) => p.update(trade, bar, state),
            Policy::Renko(p) => p.update(trade, bar, state),
            Policy::HeikinAshi(p) => p.update(trade, bar, state),
        }
    }

    fn finalize(&self, bar: &mut Bar, state: &mut PolicyState) {
        match self {
            Policy::Time(p) => p.finalize(bar, state),
            Policy::Tick(p) => p.finalize(bar, state),
            Policy::Volume(p) => p.finalize(bar, state),
            Policy::Range(p) => p.finalize(bar, state),
            Policy::Renko(p) => p.finalize(bar, state),
            Policy::HeikinAshi(p) => p.finalize(bar, state),
        }
    }
}
