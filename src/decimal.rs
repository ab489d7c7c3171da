//! Fixed-point decimal arithmetic for `Price`, `Quantity`, and `Volume`.
//!
//! Every amount in the engine is a scaled 64-bit integer sharing a single
//! scale `S = 1_000_000`. The brand (`PriceTag`, `QuantityTag`,
//! `VolumeTag`) prevents mixing units at compile time; the only sanctioned
//! cross-unit operation is `Price * Quantity -> Volume`, which widens to a
//! 128-bit intermediate so the multiply can't silently overflow.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Neg, Sub};

/// Shared scale for every `Decimal` brand: `value = raw / SCALE`.
pub const SCALE: i64 = 1_000_000;

/// Brand for [`Price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PriceTag;
/// Brand for [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QuantityTag;
/// Brand for [`Volume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VolumeTag;

/// A scaled fixed-point amount branded by `Tag` so that, e.g., a `Price`
/// and a `Quantity` cannot be added together by mistake.
#[derive(Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Decimal<Tag> {
    raw: i64,
    #[serde(skip)]
    _tag: PhantomData<Tag>,
}

/// A price, scaled by [`SCALE`].
pub type Price = Decimal<PriceTag>;
/// A quantity, scaled by [`SCALE`].
pub type Quantity = Decimal<QuantityTag>;
/// A notional volume (price times quantity), scaled by [`SCALE`].
pub type Volume = Decimal<VolumeTag>;

impl<Tag> Decimal<Tag> {
    /// The additive identity.
    pub const ZERO: Self = Self {
        raw: 0,
        _tag: PhantomData,
    };

    /// Builds a value directly from its scaled integer representation.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self {
            raw,
            _tag: PhantomData,
        }
    }

    /// Returns the underlying scaled integer.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.raw
    }

    /// Builds a value from a floating-point amount. Lossy; intended for
    /// config loading, test fixtures, and display, never for hot-path
    /// arithmetic.
    #[inline]
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self::from_raw((value * SCALE as f64).round() as i64)
    }

    /// Converts back to a floating-point amount. Lossy; same caveats as
    /// [`Self::from_f64`].
    #[inline]
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.raw as f64 / SCALE as f64
    }

    /// `true` iff the raw value is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.raw == 0
    }

    /// Absolute value.
    #[inline]
    #[must_use]
    pub const fn abs(self) -> Self {
        Self::from_raw(self.raw.abs())
    }
}

impl<Tag> Default for Decimal<Tag> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<Tag> fmt::Debug for Decimal<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self.to_f64())
    }
}

impl<Tag> fmt::Display for Decimal<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

impl<Tag> PartialEq for Decimal<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<Tag> Eq for Decimal<Tag> {}

impl<Tag> PartialOrd for Decimal<Tag> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<Tag> Ord for Decimal<Tag> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<Tag> Add for Decimal<Tag> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::from_raw(self.raw + rhs.raw)
    }
}

impl<Tag> Sub for Decimal<Tag> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::from_raw(self.raw - rhs.raw)
    }
}

impl<Tag> Neg for Decimal<Tag> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::from_raw(-self.raw)
    }
}

impl std::iter::Sum for Volume {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Volume::ZERO, Add::add)
    }
}

/// Rounds `raw / SCALE` to the nearest integer, ties away from zero,
/// mirroring `sdiv_round_nearest` in the original engine's fast-division
/// helper. Returns `None` if the rounded result does not fit in 64 bits.
#[inline]
pub(crate) fn round_div_scale(raw: i128) -> Option<i64> {
    let scale = SCALE as i128;
    let half = scale / 2;
    let adjusted = if raw >= 0 { raw + half } else { raw - half };
    let result = adjusted / scale;
    if result >= i64::MIN as i128 && result <= i64::MAX as i128 {
        Some(result as i64)
    } else {
        None
    }
}

impl Price {
    /// `Price * Quantity -> Volume`, via a 128-bit intermediate so the
    /// multiply cannot silently overflow, and a single round-to-nearest
    /// division by [`SCALE`] at the end.
    #[inline]
    #[must_use]
    pub fn checked_mul_qty(self, qty: Quantity) -> Option<Volume> {
        let wide = (self.raw as i128) * (qty.raw as i128);
        round_div_scale(wide).map(Volume::from_raw)
    }

    /// Like [`Self::checked_mul_qty`] but panics on overflow. Overflow is
    /// only reachable at raw magnitudes far beyond any realistic price or
    /// quantity, so this is used on hot paths where a `None` branch would
    /// be dead code in practice.
    #[inline]
    #[must_use]
    pub fn mul_qty(self, qty: Quantity) -> Volume {
        self.checked_mul_qty(qty)
            .expect("price * quantity overflowed i64 raw range")
    }
}
