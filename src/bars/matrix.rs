//! Per-(symbol, timeframe) grid of historical bar series.

use crate::bars::bar::{Bar, TimeframeId};
use crate::bars::series::BarSeries;
use crate::symbol::SymbolId;

struct SymbolSlot<const MAX_TIMEFRAMES: usize, const DEPTH: usize> {
    timeframes: [Option<TimeframeId>; MAX_TIMEFRAMES],
    series: [BarSeries<DEPTH>; MAX_TIMEFRAMES],
}

impl<const MAX_TIMEFRAMES: usize, const DEPTH: usize> SymbolSlot<MAX_TIMEFRAMES, DEPTH> {
    fn new() -> Self {
        Self {
            timeframes: [None; MAX_TIMEFRAMES],
            series: std::array::from_fn(|_| BarSeries::new()),
        }
    }

    fn series_for(&mut self, tf: TimeframeId) -> &mut BarSeries<DEPTH> {
        if let Some(idx) = self.timeframes.iter().position(|t| *t == Some(tf)) {
            return &mut self.series[idx];
        }
        let idx = self
            .timeframes
            .iter()
            .position(|t| t.is_none())
            .expect("bar matrix timeframe slots exhausted");
        self.timeframes[idx] = Some(tf);
        &mut self.series[idx]
    }

    fn series_get(&self, tf: TimeframeId) -> Option<&BarSeries<DEPTH>> {
        self.timeframes
            .iter()
            .position(|t| *t == Some(tf))
            .map(|idx| &self.series[idx])
    }
}

/// A fixed grid holding, for up to `MaxSymbols` directly indexed symbols
/// plus an overflow list, up to `MaxTimeframes` [`BarSeries<Depth>`] rings
/// each.
pub struct BarMatrix<const MAX_SYMBOLS: usize, const MAX_TIMEFRAMES: usize, const DEPTH: usize> {
    dense: Vec<Option<SymbolSlot<MAX_TIMEFRAMES, DEPTH>>>,
    overflow: std::collections::HashMap<SymbolId, SymbolSlot<MAX_TIMEFRAMES, DEPTH>>,
}

impl<const MAX_SYMBOLS: usize, const MAX_TIMEFRAMES: usize, const DEPTH: usize>
    BarMatrix<MAX_SYMBOLS, MAX_TIMEFRAMES, DEPTH>
{
    /// Creates an empty matrix.
    #[must_use]
    pub fn new() -> Self {
        let mut dense = Vec::with_capacity(MAX_SYMBOLS);
        dense.resize_with(MAX_SYMBOLS, || None);
        Self {
            dense,
            overflow: std::collections::HashMap::new(),
        }
    }

    fn slot_mut(&mut self, symbol: SymbolId) -> &mut SymbolSlot<MAX_TIMEFRAMES, DEPTH> {
        if (symbol as usize) < MAX_SYMBOLS {
            self.dense[symbol as usize].get_or_insert_with(SymbolSlot::new)
        } else {
            self.overflow.entry(symbol).or_insert_with(SymbolSlot::new)
        }
    }

    fn slot(&self, symbol: SymbolId) -> Option<&SymbolSlot<MAX_TIMEFRAMES, DEPTH>> {
        if (symbol as usize) < MAX_SYMBOLS {
            self.dense[symbol as usize].as_ref()
        } else {
            self.overflow.get(&symbol)
        }
    }

    /// Pushes `bar` onto `symbol`'s series for `timeframe`, creating the
    /// series if this is the first bar seen for that pair.
    pub fn push(&mut self, symbol: SymbolId, timeframe: TimeframeId, bar: Bar) {
        self.slot_mut(symbol).series_for(timeframe).push(bar);
    }

    /// Seeds `symbol`'s series for `timeframe` from `history` (newest
    /// first), creating the series if needed.
    pub fn warmup(&mut self, symbol: SymbolId, timeframe: TimeframeId, history: &[Bar]) {
        self.slot_mut(symbol).series_for(timeframe).warmup(history);
    }

    /// Returns the `i`-th most recent bar for `symbol`'s `timeframe`
    /// series, or `None` if the pair has no series or not enough history.
    #[must_use]
    pub fn at(&self, symbol: SymbolId, timeframe: TimeframeId, i: usize) -> Option<Bar> {
        self.slot(symbol)?.series_get(timeframe)?.at(i)
    }
}

impl<const MAX_SYMBOLS: usize, const MAX_TIMEFRAMES: usize, const DEPTH: usize> Default
    for BarMatrix<MAX_SYMBOLS, MAX_TIMEFRAMES, DEPTH>
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::bar::{BarCloseReason, BarType};
    use crate::decimal::{Price, Volume};
    use crate::time::TimePoint;

    fn bar(close: f64) -> Bar {
        Bar {
            open: Price::from_f64(close),
            high: Price::from_f64(close),
            low: Price::from_f64(close),
            close: Price::from_f64(close),
            volume: Volume::ZERO,
            buy_volume: Volume::ZERO,
            trade_count: 1,
            start_time: TimePoint::from_unix_ns(0),
            end_time: TimePoint::from_unix_ns(1),
            close_reason: BarCloseReason::Threshold,
        }
    }

    #[test]
    fn direct_and_overflow_symbols_are_independent() {
        let mut matrix: BarMatrix<4, 2, 8> = BarMatrix::new();
        let tf = TimeframeId {
            bar_type: BarType::Tick,
            param: 10,
        };
        matrix.push(1, tf, bar(100.0));
        matrix.push(1_000_000, tf, bar(200.0));
        assert_eq!(matrix.at(1, tf, 0), Some(bar(100.0)));
        assert_eq!(matrix.at(1_000_000, tf, 0), Some(bar(200.0)));
        assert_eq!(matrix.at(2, tf, 0), None);
    }

    #[test]
    fn multiple_timeframes_per_symbol_are_independent() {
        let mut matrix: BarMatrix<4, 2, 8> = BarMatrix::new();
        let tick_tf = TimeframeId {
            bar_type: BarType::Tick,
            param: 10,
        };
        let time_tf = TimeframeId {
            bar_type: BarType::Time,
            param: 1_000_000_000,
        };
        matrix.push(1, tick_tf, bar(100.0));
        matrix.push(1, time_tf, bar(200.0));
        assert_eq!(matrix.at(1, tick_tf, 0), Some(bar(100.0)));
        assert_eq!(matrix.at(1, time_tf, 0), Some(bar(200.0)));
    }
}
