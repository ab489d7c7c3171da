//! Fixed-capacity, newest-first circular buffer of historical bars.

use crate::bars::bar::Bar;

/// A ring of the last `CAPACITY` bars for one `(symbol, timeframe)` pair.
/// `push` prepends; `at(0)` is always the most recently pushed bar.
/// `CAPACITY` should be a power of two, matching the engine's other
/// fixed-size ring structures.
pub struct BarSeries<const CAPACITY: usize> {
    buf: [Option<Bar>; CAPACITY],
    head: usize,
    len: usize,
}

impl<const CAPACITY: usize> BarSeries<CAPACITY> {
    /// Creates an empty series.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [None; CAPACITY],
            head: 0,
            len: 0,
        }
    }

    /// Prepends `bar`, evicting the oldest entry once the ring is full.
    pub fn push(&mut self, bar: Bar) {
        self.head = (self.head + CAPACITY - 1) % CAPACITY;
        self.buf[self.head] = Some(bar);
        self.len = (self.len + 1).min(CAPACITY);
    }

    /// Returns the `i`-th most recent bar, or `None` if fewer than `i + 1`
    /// bars have been pushed.
    #[must_use]
    pub fn at(&self, i: usize) -> Option<Bar> {
        if i >= self.len {
            return None;
        }
        self.buf[(self.head + i) % CAPACITY]
    }

    /// Number of bars currently held, up to `CAPACITY`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` iff no bar has been pushed yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Seeds the series from `history`, given newest-first (matching
    /// [`Self::at`]'s convention): pushes in reverse so the final state has
    /// `at(0)` equal to `history[0]`.
    pub fn warmup(&mut self, history: &[Bar]) {
        for bar in history.iter().rev() {
            self.push(*bar);
        }
    }
}

impl<const CAPACITY: usize> Default for BarSeries<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
