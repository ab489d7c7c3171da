//! Single-policy bar aggregator: folds a trade stream into bars for one
//! closing policy, partitioned by symbol.

use crate::bars::bar::{BarCloseReason, BarEvent};
use crate::bars::policy::{BarPolicy, PolicyState};
use crate::event::{Instrument, TradeEvent};
use crate::symbol::SymbolMap;

struct SymbolState {
    bar: crate::bars::bar::Bar,
    instrument: Instrument,
    policy_state: PolicyState,
    initialized: bool,
}

/// Folds trades into bars under a single [`BarPolicy`], emitting a
/// [`BarEvent`] via `on_emit` every time the policy closes a bar.
pub struct BarAggregator<P: BarPolicy> {
    policy: P,
    symbols: SymbolMap<SymbolState>,
}

impl<P: BarPolicy> BarAggregator<P> {
    /// Creates an aggregator for `policy`, sizing its dense symbol-id
    /// range to `dense_capacity`.
    #[must_use]
    pub fn new(policy: P, dense_capacity: usize) -> Self {
        Self {
            policy,
            symbols: SymbolMap::new(dense_capacity),
        }
    }

    /// Folds one trade into its symbol's current bar, invoking `on_emit`
    /// if the policy closes a bar as a result.
    pub fn on_trade(&mut self, trade: &TradeEvent, mut on_emit: impl FnMut(BarEvent)) {
        let policy = &self.policy;
        self.symbols.entry_with(
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

    /// Emits every initialized symbol's in-progress bar with
    /// [`BarCloseReason::Forced`] and clears all per-symbol state.
    pub fn stop(&mut self, mut on_emit: impl FnMut(BarEvent)) {
        let policy = &self.policy;
        for (symbol, state) in self.symbols.dense_iter_mut() {
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
        for (symbol, state) in self.symbols.overflow_drain() {
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
        self.symbols.clear();
        tracing::info!(bar_type = ?policy.bar_type(), "bar aggregator stopped, in-progress bars flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::policy::TickBarPolicy;
    use crate::decimal::{Price, Quantity};

    fn trade(symbol: u32, price: f64, ts: i64) -> TradeEvent {
        TradeEvent {
            symbol,
            instrument: Instrument::Spot,
            price: Price::from_f64(price),
            quantity: Quantity::from_f64(1.0),
            is_buy: true,
            exchange_ts_ns: ts,
            tick_sequence: 0,
        }
    }

    #[test]
    fn tick_bar_emits_every_n_trades() {
        let mut agg = BarAggregator::new(TickBarPolicy::new(2), 16);
        let mut emitted = Vec::new();
        for i in 0..5 {
            agg.on_trade(&trade(1, 100.0 + i as f64, i), |e| emitted.push(e));
        }
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].bar.trade_count, 2);
    }

    #[test]
    fn stop_flushes_in_progress_bar_as_forced() {
        let mut agg = BarAggregator::new(TickBarPolicy::new(10), 16);
        agg.on_trade(&trade(1, 100.0, 0), |_| {});
        agg.on_trade(&trade(1, 101.0, 1), |_| {});
        let mut emitted = Vec::new();
        agg.stop(|e| emitted.push(e));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].bar.close_reason, BarCloseReason::Forced);
        assert_eq!(emitted[0].bar.trade_count, 2);
    }
}
