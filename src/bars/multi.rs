//! Multi-timeframe bar aggregator: folds one trade stream into up to `K`
//! independently configured policies, each with its own per-symbol state.

use crate::bars::bar::{Bar, BarCloseReason, BarEvent};
use crate::bars::policy::{BarPolicy, Policy, PolicyState, RangeBarPolicy, RenkoBarPolicy, TickBarPolicy, TimeBarPolicy, VolumeBarPolicy};
use crate::decimal::Volume;
use crate::event::{Instrument, TradeEvent};
use crate::symbol::SymbolMap;

struct SymbolState {
    bar: Bar,
    instrument: Instrument,
    policy_state: PolicyState,
    initialized: bool,
}

struct Slot {
    policy: Policy,
    symbols: SymbolMap<SymbolState>,
}

/// Processes one trade stream through up to a compile-time-bounded number
/// of independently configured policies, in registration order. Slot index
/// doubles as emission order when multiple policies close on the same
/// trade.
pub struct MultiTimeframeAggregator {
    slots: Vec<Slot>,
    max_slots: usize,
    dense_capacity: usize,
    started: bool,
}

impl MultiTimeframeAggregator {
    /// Creates an aggregator accepting up to `max_slots` policies, each
    /// with a dense symbol-id range of `dense_capacity`.
    #[must_use]
    pub fn new(max_slots: usize, dense_capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_slots),
            max_slots,
            dense_capacity,
            started: false,
        }
    }

    fn add_policy(&mut self, policy: Policy) {
        assert!(!self.started, "cannot add a policy after start()");
        assert!(self.slots.len() < self.max_slots, "multi-timeframe aggregator is full");
        self.slots.push(Slot {
            policy,
            symbols: SymbolMap::new(self.dense_capacity),
        });
    }

    /// Registers a time-interval policy slot.
    pub fn add_time_interval(&mut self, interval_ns: i64) {
        self.add_policy(Policy::Time(TimeBarPolicy::new(interval_ns)));
    }

    /// Registers a tick-count policy slot.
    pub fn add_tick_interval(&mut self, tick_count: u64) {
        self.add_policy(Policy::Tick(TickBarPolicy::new(tick_count)));
    }

    /// Registers a volume-threshold policy slot.
    pub fn add_volume_interval(&mut self, threshold: Volume) {
        self.add_policy(Policy::Volume(VolumeBarPolicy::new(threshold)));
    }

    /// Registers a range-size policy slot.
    pub fn add_range_interval(&mut self, range_size: crate::decimal::Price) {
        self.add_policy(Policy::Range(RangeBarPolicy::new(range_size)));
    }

    /// Registers a Renko brick-size policy slot.
    pub fn add_renko_interval(&mut self, brick_size: crate::decimal::Price) {
        self.add_policy(Policy::Renko(RenkoBarPolicy::new(brick_size)));
    }

    /// Marks configuration complete; no further `add_*` calls are allowed.
    pub fn start(&mut self) {
        self.started = true;
        tracing::info!(slots = self.slots.len(), "multi-timeframe aggregator started");
    }

    /// Folds one trade through every configured slot in registration
    /// order, invoking `on_emit` for each bar any slot closes.
    pub fn on_trade(&mut self, trade: &TradeEvent, mut on_emit: impl FnMut(BarEvent)) {
        for slot in &mut self.slots {
            let policy = &slot.policy;
            slot.symbols.entry_with(
                trade.symbol,
                || SymbolState {
                    bar: policy.init_bar(trade, &mut PolicyState::default()),
                    instrument: trade.instrument,
                    policy_state: PolicyState::default(),
                    initialized: false,
                },
                |s| {
                    if !s.initialized {
                        s.bar = policy.init_bar(trade, &mut s.policy_state);
                        s.instrument = trade.instrument;
                        s.initialized = true;
                        return;
                    }
                    if policy.should_close(trade, &s.bar) {
                        let mut closed = s.bar;
                        closed.close_reason = BarCloseReason::Threshold;
                        policy.finalize(&mut closed, &mut s.policy_state);
                        on_emit(BarEvent {
                            symbol: trade.symbol,
                            instrument: s.instrument,
                            bar_type: policy.bar_type(),
                            bar_type_param: policy.param(),
                            bar: closed,
                            tick_sequence: trade.tick_sequence,
                        });
                        s.bar = policy.init_bar(trade, &mut s.policy_state);
                    } else {
                        policy.update(trade, &mut s.bar, &mut s.policy_state);
                    }
                },
            );
        }
    }

    /// Flushes every slot's in-progress bars as [`BarCloseReason::Forced`]
    /// and clears all per-symbol state.
    pub fn stop(&mut self, mut on_emit: impl FnMut(BarEvent)) {
        for slot in &mut self.slots {
            let policy = &slot.policy;
            for (symbol, state) in slot.symbols.dense_iter_mut() {
                if !state.initialized {
                    continue;
                }
                let mut closed = state.bar;
                closed.close_reason = BarCloseReason::Forced;
                policy.finalize(&mut closed, &mut state.policy_state);
                on_emit(BarEvent {
                    symbol,
                    instrument: state.instrument,
                    bar_type: policy.bar_type(),
                    bar_type_param: policy.param(),
                    bar: closed,
                    tick_sequence: 0,
                });
            }
            for (symbol, state) in slot.symbols.overflow_drain() {
                if !state.initialized {
                    continue;
                }
                let mut closed = state.bar;
                closed.close_reason = BarCloseReason::Forced;
                policy.finalize(&mut closed, &mut state.policy_state);
                on_emit(BarEvent {
                    symbol,
                    instrument: state.instrument,
                    bar_type: policy.bar_type(),
                    bar_type_param: policy.param(),
                    bar: closed,
                    tick_sequence: 0,
                });
            }
            slot.symbols.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Price, Quantity};

    fn trade(price: f64, ts: i64) -> TradeEvent {
        TradeEvent {
            symbol: 1,
            instrument: Instrument::Spot,
            price: Price::from_f64(price),
            quantity: Quantity::from_f64(1.0),
            is_buy: true,
            exchange_ts_ns: ts,
            tick_sequence: 0,
        }
    }

    #[test]
    fn two_slots_emit_independently_in_registration_order() {
        let mut agg = MultiTimeframeAggregator::new(2, 16);
        agg.add_tick_interval(2);
        agg.add_tick_interval(3);
        agg.start();

        let mut emitted = Vec::new();
        for i in 0..6 {
            agg.on_trade(&trade(100.0 + i as f64, i), |e| emitted.push(e));
        }
        let fast: Vec<_> = emitted.iter().filter(|e| e.bar_type_param == 2).collect();
        let slow: Vec<_> = emitted.iter().filter(|e| e.bar_type_param == 3).collect();
        assert_eq!(fast.len(), 3);
        assert_eq!(slow.len(), 2);
    }

    #[test]
    fn first_trade_only_initializes_and_is_not_folded_twice() {
        let mut agg = MultiTimeframeAggregator::new(1, 16);
        agg.add_tick_interval(2);
        agg.start();

        let mut emitted = Vec::new();
        agg.on_trade(&trade(100.0, 0), |e| emitted.push(e));
        assert!(emitted.is_empty());
        agg.on_trade(&trade(101.0, 1), |e| emitted.push(e));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].bar.trade_count, 2);
        assert_eq!(emitted[0].bar.volume, Volume::from_f64(201.0));
    }

    #[test]
    #[should_panic(expected = "after start")]
    fn adding_policy_after_start_panics() {
        let mut agg = MultiTimeframeAggregator::new(1, 16);
        agg.start();
        agg.add_tick_interval(1);
    }
}
