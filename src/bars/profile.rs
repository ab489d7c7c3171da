//! Price-bucketed trade statistics: volume profile, footprint, and
//! market-profile (TPO) analytics.

use crate::decimal::{Price, Quantity, Volume};
use crate::time::TimePoint;

fn quantize_tick(price: Price, tick_size: Price) -> i64 {
    price.raw().div_euclid(tick_size.raw())
}

fn tick_to_price(tick: i64, tick_size: Price) -> Price {
    Price::from_raw(tick * tick_size.raw())
}

/// Expands a contiguous index range `[lo, hi]` (inclusive, into `weight`)
/// outward from `poc_idx` until the accumulated weight reaches
/// `target_fraction` of the total, picking at each step whichever
/// neighboring index has the greater weight; ties favor the lower
/// (smaller-index) side. Shared by [`VolumeProfile::value_area`] and
/// [`MarketProfile::value_area`].
fn expand_value_area(weights: &[u64], poc_idx: usize, target_fraction: f64) -> (usize, usize) {
    let total: u64 = weights.iter().sum();
    let target = (total as f64 * target_fraction).ceil() as u64;
    let mut lo = poc_idx;
    let mut hi = poc_idx;
    let mut acc = weights[poc_idx];
    while acc < target {
        let low_candidate = lo.checked_sub(1).map(|i| weights[i]);
        let high_candidate = if hi + 1 < weights.len() { Some(weights[hi + 1]) } else { None };
        match (low_candidate, high_candidate) {
            (None, None) => break,
            (Some(lw), None) => {
                lo -= 1;
                acc += lw;
            }
            (None, Some(hw)) => {
                hi += 1;
                acc += hw;
            }
            (Some(lw), Some(hw)) => {
                if hw > lw {
                    hi += 1;
                    acc += hw;
                } else {
                    lo -= 1;
                    acc += lw;
                }
            }
        }
    }
    (lo, hi)
}

struct VolumeLevel {
    tick: i64,
    volume: Volume,
    buy_volume: Volume,
}

/// Bucketizes trades by price into fixed `tick_size` buckets, tracking
/// volume and buy volume per level with a soft capacity of `max_levels`
/// (reserved up front; exceeding it logs a warning and drops the level
/// rather than panicking, since connectors occasionally send prices far
/// outside the expected range).
pub struct VolumeProfile {
    tick_size: Price,
    max_levels: usize,
    levels: Vec<VolumeLevel>,
}

impl VolumeProfile {
    /// Creates an empty profile quantizing to `tick_size`, reserving
    /// capacity for `max_levels` distinct price buckets.
    #[must_use]
    pub fn new(tick_size: Price, max_levels: usize) -> Self {
        Self {
            tick_size,
            max_levels,
            levels: Vec::with_capacity(max_levels),
        }
    }

    fn level_index(&self, tick: i64) -> Result<usize, usize> {
        self.levels.binary_search_by_key(&tick, |l| l.tick)
    }

    /// Folds one trade into its price bucket.
    pub fn add_trade(&mut self, price: Price, quantity: Quantity, is_buy: bool) {
        let tick = quantize_tick(price, self.tick_size);
        let notional = price.mul_qty(quantity);
        match self.level_index(tick) {
            Ok(idx) => {
                self.levels[idx].volume = self.levels[idx].volume + notional;
                if is_buy {
                    self.levels[idx].buy_volume = self.levels[idx].buy_volume + notional;
                }
            }
            Err(insert_at) => {
                if self.levels.len() >= self.max_levels {
                    tracing::warn!(tick, "volume profile at capacity, dropping level");
                    return;
                }
                self.levels.insert(
                    insert_at,
                    VolumeLevel {
                        tick,
                        volume: notional,
                        buy_volume: if is_buy { notional } else { Volume::ZERO },
                    },
                );
            }
        }
    }

    /// Total volume across every level.
    #[must_use]
    pub fn total_volume(&self) -> Volume {
        self.levels.iter().map(|l| l.volume).sum()
    }

    /// The price level with the highest accumulated volume.
    #[must_use]
    pub fn poc(&self) -> Option<Price> {
        self.levels
            .iter()
            .max_by_key(|l| l.volume.raw())
            .map(|l| tick_to_price(l.tick, self.tick_size))
    }

    /// `buy_volume - sell_volume` at `price`'s bucket, where `sell_volume
    /// = volume - buy_volume`. Zero if the bucket has no trades.
    #[must_use]
    pub fn delta(&self, price: Price) -> Volume {
        let tick = quantize_tick(price, self.tick_size);
        match self.level_index(tick) {
            Ok(idx) => {
                let l = &self.levels[idx];
                let sell_volume = l.volume - l.buy_volume;
                l.buy_volume - sell_volume
            }
            Err(_) => Volume::ZERO,
        }
    }

    /// The contiguous `[low, high]` price range around the POC containing
    /// at least 70% of total volume.
    #[must_use]
    pub fn value_area(&self) -> Option<(Price, Price)> {
        if self.levels.is_empty() {
            return None;
        }
        let poc_idx = self
            .levels
            .iter()
            .enumerate()
            .max_by_key(|(_, l)| l.volume.raw())
            .map(|(i, _)| i)?;
        let weights: Vec<u64> = self.levels.iter().map(|l| l.volume.raw().max(0) as u64).collect();
        let (lo, hi) = expand_value_area(&weights, poc_idx, 0.70);
        Some((
            tick_to_price(self.levels[lo].tick, self.tick_size),
            tick_to_price(self.levels[hi].tick, self.tick_size),
        ))
    }
}

struct FootprintLevel {
    tick: i64,
    bid_volume: Quantity,
    ask_volume: Quantity,
}

/// Per-level aggressive buy/sell quantity (not notional), for imbalance
/// analysis.
pub struct FootprintBar {
    tick_size: Price,
    max_levels: usize,
    levels: Vec<FootprintLevel>,
}

impl FootprintBar {
    /// Creates an empty footprint quantizing to `tick_size`.
    #[must_use]
    pub fn new(tick_size: Price, max_levels: usize) -> Self {
        Self {
            tick_size,
            max_levels,
            levels: Vec::with_capacity(max_levels),
        }
    }

    fn level_index(&self, tick: i64) -> Result<usize, usize> {
        self.levels.binary_search_by_key(&tick, |l| l.tick)
    }

    /// Folds one trade: aggressive sells accumulate `bid_volume`,
    /// aggressive buys accumulate `ask_volume`.
    pub fn add_trade(&mut self, price: Price, quantity: Quantity, is_buy: bool) {
        let tick = quantize_tick(price, self.tick_size);
        let idx = match self.level_index(tick) {
            Ok(idx) => idx,
            Err(insert_at) => {
                if self.levels.len() >= self.max_levels {
                    tracing::warn!(tick, "footprint bar at capacity, dropping level");
                    return;
                }
                self.levels.insert(
                    insert_at,
                    FootprintLevel {
                        tick,
                        bid_volume: Quantity::ZERO,
                        ask_volume: Quantity::ZERO,
                    },
                );
                insert_at
            }
        };
        if is_buy {
            self.levels[idx].ask_volume = self.levels[idx].ask_volume + quantity;
        } else {
            self.levels[idx].bid_volume = self.levels[idx].bid_volume + quantity;
        }
    }

    /// `ask_volume - bid_volume` at `price`'s bucket.
    #[must_use]
    pub fn delta(&self, price: Price) -> Quantity {
        let tick = quantize_tick(price, self.tick_size);
        match self.level_index(tick) {
            Ok(idx) => self.levels[idx].ask_volume - self.levels[idx].bid_volume,
            Err(_) => Quantity::ZERO,
        }
    }

    /// The price whose imbalance `|ratio - 0.5| * 2` is both maximal and at
    /// least `(threshold - 0.5) * 2`, where `ratio = ask / (ask + bid)`.
    #[must_use]
    pub fn strongest_imbalance(&self, threshold: f64) -> Option<Price> {
        let required = (threshold - 0.5) * 2.0;
        self.levels
            .iter()
            .filter_map(|l| {
                let ask = l.ask_volume.to_f64();
                let bid = l.bid_volume.to_f64();
                let total = ask + bid;
                if total <= 0.0 {
                    return None;
                }
                let ratio = ask / total;
                let strength = (ratio - 0.5).abs() * 2.0;
                (strength >= required).then_some((l.tick, strength))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(tick, _)| tick_to_price(tick, self.tick_size))
    }
}

const MAX_TPO_PERIODS: usize = 128;

struct TpoLevel {
    tick: i64,
    periods: u128,
}

/// Session Market Profile / TPO analysis over a fixed grid of price levels
/// by session period.
pub struct MarketProfile {
    tick_size: Price,
    max_levels: usize,
    period_duration_ns: i64,
    session_start: TimePoint,
    levels: Vec<TpoLevel>,
}

impl MarketProfile {
    /// Creates an empty profile. `period_duration_ns` must be positive;
    /// period indices beyond [`MAX_TPO_PERIODS`] are clamped to the last
    /// period's bit.
    #[must_use]
    pub fn new(tick_size: Price, max_levels: usize, session_start: TimePoint, period_duration_ns: i64) -> Self {
        Self {
            tick_size,
            max_levels,
            period_duration_ns,
            session_start,
            levels: Vec::with_capacity(max_levels),
        }
    }

    fn period_index(&self, ts: TimePoint) -> usize {
        let elapsed = (ts - self.session_start).max(0);
        ((elapsed / self.period_duration_ns) as usize).min(MAX_TPO_PERIODS - 1)
    }

    fn level_index(&self, tick: i64) -> Result<usize, usize> {
        self.levels.binary_search_by_key(&tick, |l| l.tick)
    }

    /// Records that `price` was touched during the period containing `ts`.
    pub fn add_trade(&mut self, price: Price, ts: TimePoint) {
        let tick = quantize_tick(price, self.tick_size);
        let period = self.period_index(ts);
        let idx = match self.level_index(tick) {
            Ok(idx) => idx,
            Err(insert_at) => {
                if self.levels.len() >= self.max_levels {
                    tracing::warn!(tick, "market profile at capacity, dropping level");
                    return;
                }
                self.levels.insert(insert_at, TpoLevel { tick, periods: 0 });
                insert_at
            }
        };
        self.levels[idx].periods |= 1u128 << period;
    }

    /// The price level touched in the most distinct periods.
    #[must_use]
    pub fn poc(&self) -> Option<Price> {
        self.levels
            .iter()
            .max_by_key(|l| l.periods.count_ones())
            .map(|l| tick_to_price(l.tick, self.tick_size))
    }

    /// The contiguous `[low, high]` price range containing at least 70% of
    /// total TPO count, expanded from the POC favoring the larger-TPO
    /// neighbor at each step, ties favoring the low side.
    #[must_use]
    pub fn value_area(&self) -> Option<(Price, Price)> {
        if self.levels.is_empty() {
            return None;
        }
        let poc_idx = self
            .levels
            .iter()
            .enumerate()
            .max_by_key(|(_, l)| l.periods.count_ones())
            .map(|(i, _)| i)?;
        let weights: Vec<u64> = self.levels.iter().map(|l| l.periods.count_ones() as u64).collect();
        let (lo, hi) = expand_value_area(&weights, poc_idx, 0.70);
        Some((
            tick_to_price(self.levels[lo].tick, self.tick_size),
            tick_to_price(self.levels[hi].tick, self.tick_size),
        ))
    }

    /// Price levels touched in exactly one period.
    #[must_use]
    pub fn single_prints(&self) -> Vec<Price> {
        self.levels
            .iter()
            .filter(|l| l.periods.count_ones() == 1)
            .map(|l| tick_to_price(l.tick, self.tick_size))
            .collect()
    }

    /// `[low, high]` price range touched during periods 0 or 1.
    #[must_use]
    pub fn initial_balance(&self) -> Option<(Price, Price)> {
        let mask: u128 = 0b11;
        let mut ticks = self.levels.iter().filter(|l| l.periods & mask != 0).map(|l| l.tick);
        let first = ticks.next()?;
        let (lo, hi) = ticks.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some((tick_to_price(lo, self.tick_size), tick_to_price(hi, self.tick_size)))
    }

    /// `true` if the highest touched price level has exactly one TPO.
    #[must_use]
    pub fn poor_high(&self) -> bool {
        self.levels.last().is_some_and(|l| l.periods.count_ones() == 1)
    }

    /// `true` if the lowest touched price level has exactly one TPO.
    #[must_use]
    pub fn poor_low(&self) -> bool {
        self.levels.first().is_some_and(|l| l.periods.count_ones() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_profile_value_area_matches_worked_example() {
        // Notional (price * quantity) weights at each bucket: 99 -> 99,
        // 100 -> 300, 101 -> 101, 102 -> 102. Expanding from the 100 POC,
        // each step favors whichever neighbor carries more volume, so both
        // steps favor the high side over the low side.
        let mut profile = VolumeProfile::new(Price::from_f64(1.0), 16);
        for price in [99.0, 100.0, 100.0, 100.0, 101.0, 102.0] {
            profile.add_trade(Price::from_f64(price), Quantity::from_f64(1.0), true);
        }
        assert_eq!(profile.poc(), Some(Price::from_f64(100.0)));
        assert_eq!(
            profile.value_area(),
            Some((Price::from_f64(100.0), Price::from_f64(102.0)))
        );
    }

    #[test]
    fn footprint_strongest_imbalance_picks_max_ratio() {
        let mut fp = FootprintBar::new(Price::from_f64(1.0), 8);
        fp.add_trade(Price::from_f64(100.0), Quantity::from_f64(5.0), true);
        fp.add_trade(Price::from_f64(100.0), Quantity::from_f64(1.0), false);
        fp.add_trade(Price::from_f64(101.0), Quantity::from_f64(3.0), true);
        fp.add_trade(Price::from_f64(101.0), Quantity::from_f64(3.0), false);
        assert_eq!(fp.strongest_imbalance(0.5), Some(Price::from_f64(100.0)));
    }

    #[test]
    fn market_profile_tracks_single_prints_and_initial_balance() {
        let mut mp = MarketProfile::new(Price::from_f64(1.0), 16, TimePoint::from_unix_ns(0), 60);
        mp.add_trade(Price::from_f64(100.0), TimePoint::from_unix_ns(0));
        mp.add_trade(Price::from_f64(101.0), TimePoint::from_unix_ns(0));
        mp.add_trade(Price::from_f64(100.0), TimePoint::from_unix_ns(60));
        mp.add_trade(Price::from_f64(102.0), TimePoint::from_unix_ns(600));

        assert_eq!(mp.poc(), Some(Price::from_f64(100.0)));
        assert_eq!(
            mp.single_prints(),
            vec![Price::from_f64(101.0), Price::from_f64(102.0)]
        );
        assert_eq!(
            mp.initial_balance(),
            Some((Price::from_f64(100.0), Price::from_f64(101.0)))
        );
        assert!(!mp.poor_low());
        assert!(mp.poor_high());
    }
}
