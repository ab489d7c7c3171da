//! Anchored-window limit order book.
//!
//! Bids and asks are held in fixed-capacity arrays indexed by a *local*
//! index relative to a sliding `base_index` ("anchor"). The anchor
//! relocates only on snapshot application, with hysteresis so a book
//! trading near the edge of its window doesn't reanchor on every update.

pub mod error;

use crate::decimal::{round_div_scale, Price, Quantity};

pub use error::BookError;

/// Hysteresis margin, in ticks, kept on both sides of a reanchored window
/// before the anchor is considered for another move.
pub const HYSTERESIS_TICKS: i64 = 8;

/// A single `(price, quantity)` level, as supplied by a snapshot or delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Level {
    /// The level's price.
    pub price: Price,
    /// The level's resting quantity. Zero means "remove this level."
    pub quantity: Quantity,
}

/// An incoming book update: either a full replacement of the visible book
/// or an incremental set of level changes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum BookUpdate {
    /// The full visible book after the update.
    Snapshot {
        /// Bid levels, any order.
        bids: Vec<Level>,
        /// Ask levels, any order.
        asks: Vec<Level>,
    },
    /// Incremental level changes. A level with `quantity == 0` removes
    /// that price.
    Delta {
        /// Bid-side changes.
        bids: Vec<Level>,
        /// Ask-side changes.
        asks: Vec<Level>,
    },
}

#[derive(Clone, Copy)]
struct Side {
    quantities: Vec<i64>, // raw Quantity per local index; 0 means absent
    min_idx: usize,       // N means empty
    max_idx: usize,
    best_idx: usize, // N means empty
}

/// A fixed-capacity, price-indexed bid/ask ladder with O(1) best-quote
/// tracking and dynamic re-anchoring.
pub struct OrderBook {
    capacity: usize,
    tick_size: Price,
    base_index: i64,
    bids: Side,
    asks: Side,
}

impl Side {
    fn new(capacity: usize) -> Self {
        Self {
            quantities: vec![0; capacity],
            min_idx: capacity,
            max_idx: capacity,
            best_idx: capacity,
        }
    }

    fn clear(&mut self) {
        self.quantities.iter_mut().for_each(|q| *q = 0);
        self.min_idx = self.quantities.len();
        self.max_idx = self.quantities.len();
        self.best_idx = self.quantities.len();
    }
}

impl OrderBook {
    /// Creates an empty book with the given fixed `capacity` (ticks held
    /// at once; should be a power of two) and `tick_size`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or `tick_size` is not strictly
    /// positive. Prefer [`Self::try_new`] when these are not compile-time
    /// constants.
    #[must_use]
    pub fn new(capacity: usize, tick_size: Price) -> Self {
        Self::try_new(capacity, tick_size).expect("invalid order book parameters")
    }

    /// Fallible counterpart to [`Self::new`] for callers building books
    /// from configuration rather than literals.
    pub fn try_new(capacity: usize, tick_size: Price) -> Result<Self, BookError> {
        if capacity == 0 {
            return Err(BookError::ZeroCapacity);
        }
        if tick_size.raw() <= 0 {
            return Err(BookError::InvalidTickSize);
        }
        Ok(Self {
            capacity,
            tick_size,
            base_index: 0,
            bids: Side::new(capacity),
            asks: Side::new(capacity),
        })
    }

    /// Converts a price into its integer tick, `round(price / tick_size)`.
    #[must_use]
    pub fn tick(&self, price: Price) -> i64 {
        let scaled = price.raw() as i128 * 2;
        let tick_raw = self.tick_size.raw() as i128;
        // round-half-away-from-zero on price/tick_size
        let doubled = scaled / tick_raw;
        if doubled >= 0 {
            ((doubled + 1) / 2) as i64
        } else {
            ((doubled - 1) / 2) as i64
        }
    }

    fn local_index(&self, tick: i64) -> Option<usize> {
        let local = tick - self.base_index;
        if local >= 0 && (local as usize) < self.capacity {
            Some(local as usize)
        } else {
            None
        }
    }

    fn index_to_price(&self, idx: usize) -> Price {
        Price::from_raw((self.base_index + idx as i64) * self.tick_size.raw())
    }

    /// The best (highest) bid price, if the book has any bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Price> {
        (self.bids.best_idx < self.capacity).then(|| self.index_to_price(self.bids.best_idx))
    }

    /// The best (lowest) ask price, if the book has any asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Price> {
        (self.asks.best_idx < self.capacity).then(|| self.index_to_price(self.asks.best_idx))
    }

    /// Resting quantity at `price` on the bid side, or zero if absent.
    #[must_use]
    pub fn bid_at_price(&self, price: Price) -> Quantity {
        self.quantity_at(&self.bids, price)
    }

    /// Resting quantity at `price` on the ask side, or zero if absent.
    #[must_use]
    pub fn ask_at_price(&self, price: Price) -> Quantity {
        self.quantity_at(&self.asks, price)
    }

    fn quantity_at(&self, side: &Side, price: Price) -> Quantity {
        match self.local_index(self.tick(price)) {
            Some(idx) => Quantity::from_raw(side.quantities[idx]),
            None => Quantity::ZERO,
        }
    }

    /// `true` iff the best bid is at or above the best ask.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid_tick(), self.best_ask_tick()) {
            (Some(b), Some(a)) => b >= a,
            _ => false,
        }
    }

    fn best_bid_tick(&self) -> Option<i64> {
        (self.bids.best_idx < self.capacity).then(|| self.base_index + self.bids.best_idx as i64)
    }

    fn best_ask_tick(&self) -> Option<i64> {
        (self.asks.best_idx < self.capacity).then(|| self.base_index + self.asks.best_idx as i64)
    }

    /// `(best_ask - best_bid) * tick_size`, or `None` if either side is
    /// empty.
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid_tick(), self.best_ask_tick()) {
            (Some(b), Some(a)) => Some(Price::from_raw((a - b) * self.tick_size.raw())),
            _ => None,
        }
    }

    /// Midpoint price, computed as `tick_size * (bid_tick + ask_tick) / 2`
    /// using a half-tick multiply-then-add to avoid truncation.
    #[must_use]
    pub fn mid(&self) -> Option<Price> {
        match (self.best_bid_tick(), self.best_ask_tick()) {
            (Some(b), Some(a)) => {
                let sum_ticks = b + a;
                Some(Price::from_raw(sum_ticks * self.tick_size.raw() / 2))
            }
            _ => None,
        }
    }

    /// Returns up to `k` non-zero bid levels, best to worst.
    #[must_use]
    pub fn bid_levels(&self, k: usize) -> Vec<Level> {
        self.levels(&self.bids, k, true)
    }

    /// Returns up to `k` non-zero ask levels, best to worst.
    #[must_use]
    pub fn ask_levels(&self, k: usize) -> Vec<Level> {
        self.levels(&self.asks, k, false)
    }

    fn levels(&self, side: &Side, k: usize, descending: bool) -> Vec<Level> {
        let mut out = Vec::with_capacity(k.min(self.capacity));
        if side.min_idx >= self.capacity {
            return out;
        }
        if descending {
            let mut i = side.max_idx;
            loop {
                if side.quantities[i] != 0 {
                    out.push(Level {
                        price: self.index_to_price(i),
                        quantity: Quantity::from_raw(side.quantities[i]),
                    });
                    if out.len() == k {
                        break;
                    }
                }
                if i == side.min_idx {
                    break;
                }
                i -= 1;
            }
        } else {
            let mut i = side.min_idx;
            loop {
                if side.quantities[i] != 0 {
                    out.push(Level {
                        price: self.index_to_price(i),
                        quantity: Quantity::from_raw(side.quantities[i]),
                    });
                    if out.len() == k {
                        break;
                    }
                }
                if i == side.max_idx {
                    break;
                }
                i += 1;
            }
        }
        out
    }

    /// Applies a book update (snapshot or delta).
    pub fn apply_update(&mut self, update: BookUpdate) {
        match update {
            BookUpdate::Snapshot { bids, asks } => self.apply_snapshot(bids, asks),
            BookUpdate::Delta { bids, asks } => {
                for level in bids {
                    self.apply_delta_level(true, level);
                }
                for level in asks {
                    self.apply_delta_level(false, level);
                }
            }
        }
    }

    fn apply_delta_level(&mut self, is_bid: bool, level: Level) {
        let tick = self.tick(level.price);
        let Some(idx) = self.local_index(tick) else {
            return; // out of window: connectors are expected to resync
        };
        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        if side.quantities[idx] == level.quantity.raw() {
            return;
        }
        Self::set_level(side, idx, level.quantity.raw(), is_bid);
    }

    fn apply_snapshot(&mut self, bids: Vec<Level>, asks: Vec<Level>) {
        let mut min_tick = i64::MAX;
        let mut max_tick = i64::MIN;
        for level in bids.iter().chain(asks.iter()) {
            let t = self.tick(level.price);
            min_tick = min_tick.min(t);
            max_tick = max_tick.max(t);
        }
        if min_tick > max_tick {
            self.bids.clear();
            self.asks.clear();
            return;
        }

        self.reanchor(min_tick, max_tick);
        self.bids.clear();
        self.asks.clear();

        for level in bids {
            if let Some(idx) = self.local_index(self.tick(level.price)) {
                Self::set_level(&mut self.bids, idx, level.quantity.raw(), true);
            }
        }
        for level in asks {
            if let Some(idx) = self.local_index(self.tick(level.price)) {
                Self::set_level(&mut self.asks, idx, level.quantity.raw(), false);
            }
        }
        tracing::debug!(base_index = self.base_index, "book snapshot applied");
    }

    fn reanchor(&mut self, min_tick: i64, max_tick: i64) {
        let window_min = self.base_index;
        let window_max = self.base_index + self.capacity as i64 - 1;
        let within_hysteresis = min_tick >= window_min + HYSTERESIS_TICKS
            && max_tick <= window_max - HYSTERESIS_TICKS
            && min_tick >= window_min
            && max_tick <= window_max;
        if within_hysteresis {
            return;
        }
        let span = max_tick - min_tick + 1;
        self.base_index = if span < self.capacity as i64 {
            (min_tick + max_tick) / 2 - self.capacity as i64 / 2
        } else {
            min_tick
        };
    }

    /// In-place reanchor that preserves existing level data by translating
    /// every non-zero level to its new local index, dropping any that fall
    /// outside the new window. Available for callers that need
    /// anchor-preserving reanchoring across a long delta-only session, but
    /// is not invoked automatically by [`Self::apply_update`]'s snapshot
    /// path (matching the upstream engine, which defines this method but
    /// never wires it into snapshot handling).
    pub fn reanchor_with_data(&mut self, min_tick: i64, max_tick: i64) {
        let old_base = self.base_index;
        self.reanchor(min_tick, max_tick);
        let shift = old_base - self.base_index;
        if shift == 0 {
            return;
        }
        Self::translate(&mut self.bids, shift, self.capacity, true);
        Self::translate(&mut self.asks, shift, self.capacity, false);
    }

    fn translate(side: &mut Side, shift: i64, capacity: usize, is_bid: bool) {
        let old = std::mem::replace(&mut side.quantities, vec![0; capacity]);
        side.clear();
        for (old_idx, qty) in old.into_iter().enumerate() {
            if qty == 0 {
                continue;
            }
            let new_idx = old_idx as i64 + shift;
            if new_idx >= 0 && (new_idx as usize) < capacity {
                side.quantities[new_idx as usize] = qty;
                side.min_idx = side.min_idx.min(new_idx as usize);
                side.max_idx = side.max_idx.max(new_idx as usize);
            }
        }
        Self::recompute_best(side, is_bid);
    }

    fn set_level(side: &mut Side, idx: usize, raw_qty: i64, is_bid: bool) {
        let was_zero = side.quantities[idx] == 0;
        side.quantities[idx] = raw_qty;
        let now_zero = raw_qty == 0;

        if !now_zero {
            side.min_idx = side.min_idx.min(idx);
            side.max_idx = side.max_idx.max(idx);
            let improves = if is_bid {
                side.best_idx == side.quantities.len() || idx > side.best_idx
            } else {
                side.best_idx == side.quantities.len() || idx < side.best_idx
            };
            if improves {
                side.best_idx = idx;
            }
        } else if !was_zero && idx == side.best_idx {
            Self::rescan_best(side, is_bid);
        }

        if now_zero && !was_zero {
            Self::shrink_bounds_if_needed(side);
        }
    }

    fn rescan_best(side: &mut Side, is_bid: bool) {
        let capacity = side.quantities.len();
        if side.min_idx >= capacity {
            side.best_idx = capacity;
            return;
        }
        if is_bid {
            let mut i = side.max_idx;
            loop {
                if side.quantities[i] != 0 {
                    side.best_idx = i;
                    return;
                }
                if i == side.min_idx {
                    break;
                }
                i -= 1;
            }
        } else {
            let mut i = side.min_idx;
            loop {
                if side.quantities[i] != 0 {
                    side.best_idx = i;
                    return;
                }
                if i == side.max_idx {
                    break;
                }
                i += 1;
            }
        }
        side.best_idx = capacity;
    }

    fn shrink_bounds_if_needed(side: &mut Side) {
        let capacity = side.quantities.len();
        while side.min_idx < side.max_idx && side.quantities[side.min_idx] == 0 {
            side.min_idx += 1;
        }
        while side.max_idx > side.min_idx && side.quantities[side.max_idx] == 0 {
            side.max_idx -= 1;
        }
        if side.quantities[side.min_idx] == 0 && side.quantities[side.max_idx] == 0 {
            side.min_idx = capacity;
            side.max_idx = capacity;
        }
    }

    fn recompute_best(side: &mut Side, is_bid: bool) {
        if side.min_idx >= side.quantities.len() {
            side.best_idx = side.quantities.len();
            return;
        }
        side.best_idx = side.min_idx;
        Self::rescan_best(side, is_bid);
    }

    /// Sweeps the ask side for up to `need_qty`, deducting available
    /// quantity level by level from the best price outward. Returns the
    /// quantity actually filled and the accumulated notional, using a
    /// 128-bit accumulator divided by the decimal scale exactly once.
    #[must_use]
    pub fn consume_asks(&mut self, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        self.consume(false, need_qty)
    }

    /// Sweeps the bid side for up to `need_qty`. See [`Self::consume_asks`].
    #[must_use]
    pub fn consume_bids(&mut self, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        self.consume(true, need_qty)
    }

    fn consume(&mut self, is_bid: bool, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        let mut remaining = need_qty.raw();
        let mut notional_acc: i128 = 0;
        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        if side.min_idx >= side.quantities.len() || remaining <= 0 {
            return (Quantity::ZERO, crate::decimal::Volume::ZERO);
        }
        let (mut i, stop, step): (i64, i64, i64) = if is_bid {
            (side.max_idx as i64, side.min_idx as i64, -1)
        } else {
            (side.min_idx as i64, side.max_idx as i64, 1)
        };
        let base_index = self.base_index;
        let tick_size = self.tick_size.raw() as i128;
        loop {
            let idx = i as usize;
            let avail = side.quantities[idx];
            if avail > 0 {
                let take = avail.min(remaining);
                side.quantities[idx] -= take;
                let price_raw = (base_index + idx as i64) as i128 * tick_size;
                notional_acc += price_raw * take as i128;
                remaining -= take;
            }
            if remaining == 0 || i == stop {
                break;
            }
            i += step;
        }
        Self::shrink_bounds_if_needed(side);
        Self::rescan_best(side, is_bid);
        let filled = need_qty.raw() - remaining;
        // notional_acc is a sum of (scaled price) * (scaled quantity) terms,
        // exactly the shape `round_div_scale` expects: divide by SCALE once
        // with round-to-nearest, same as a single Price::mul_qty.
        let volume_raw = round_div_scale(notional_acc).unwrap_or(i64::MAX);
        (
            Quantity::from_raw(filled),
            crate::decimal::Volume::from_raw(volume_raw),
        )
    }

    /// Portable equivalent of [`Self::consume_asks`]: rounds each level's
    /// notional individually via [`Price::mul_qty`] instead of accumulating
    /// one wide sum, then adds the per-level `Volume`s. Rust's native
    /// `i128` makes the fast path unconditionally safe, so this path exists
    /// only to cross-check the fast path in tests, not because a 128-bit
    /// fallback is needed at runtime.
    #[must_use]
    pub fn consume_asks_checked(&mut self, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        self.consume_per_level(false, need_qty)
    }

    /// Portable equivalent of [`Self::consume_bids`]. See
    /// [`Self::consume_asks_checked`].
    #[must_use]
    pub fn consume_bids_checked(&mut self, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        self.consume_per_level(true, need_qty)
    }

    fn consume_per_level(&mut self, is_bid: bool, need_qty: Quantity) -> (Quantity, crate::decimal::Volume) {
        let mut remaining = need_qty.raw();
        let mut volume = crate::decimal::Volume::ZERO;
        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        if side.min_idx >= side.quantities.len() || remaining <= 0 {
            return (Quantity::ZERO, volume);
        }
        let (mut i, stop, step): (i64, i64, i64) = if is_bid {
            (side.max_idx as i64, side.min_idx as i64, -1)
        } else {
            (side.min_idx as i64, side.max_idx as i64, 1)
        };
        let base_index = self.base_index;
        let tick_size = self.tick_size;
        loop {
            let idx = i as usize;
            let avail = side.quantities[idx];
            if avail > 0 {
                let take = avail.min(remaining);
                side.quantities[idx] -= take;
                let price = Price::from_raw((base_index + idx as i64) * tick_size.raw());
                volume = volume + price.mul_qty(Quantity::from_raw(take));
                remaining -= take;
            }
            if remaining == 0 || i == stop {
                break;
            }
            i += step;
        }
        Self::shrink_bounds_if_needed(side);
        Self::rescan_best(side, is_bid);
        (Quantity::from_raw(need_qty.raw() - remaining), volume)
    }
}
