/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/10/25
******************************************************************************/

//! # Flox: a low-latency market data and trading engine core
//!
//! Flox is the single-process core of a trading engine: an anchored-window
//! limit order book, time/tick/volume/range/renko/Heikin-Ashi bar
//! aggregation, volume/market profile analytics, an order lifecycle
//! tracker, a token-bucket rate limiter, and a bounded SPMC event bus tying
//! them together. Every numeric amount is a fixed-point [`decimal::Decimal`]
//! so price and quantity arithmetic never drifts on floating-point
//! rounding.
//!
//! ## Design goals
//!
//! 1. **Determinism**: the same sequence of trades and book updates always
//!    produces the same bars, profiles, and best-quote transitions,
//!    independent of wall-clock jitter.
//! 2. **Bounded memory**: the event bus, order book, and bar matrix are all
//!    sized at construction (capacity, tick window, timeframe count); none
//!    of them grow unboundedly under sustained load.
//! 3. **No silent overflow**: price times quantity widens to a 128-bit
//!    intermediate before narrowing back to a 64-bit scaled volume.
//!
//! ## Module overview
//!
//! - [`decimal`]: fixed-point `Price`/`Quantity`/`Volume` arithmetic.
//! - [`time`]: nanosecond timestamps and interval alignment.
//! - [`symbol`]: dense-plus-overflow map keyed by symbol id.
//! - [`backoff`]: spin/yield/park back-off tiers shared by the bus.
//! - [`bus`]: the bounded single-producer, multi-consumer event bus.
//! - [`event`]: trade and book-update event payloads carried on the bus.
//! - [`book`]: the anchored-window order book.
//! - [`bars`]: bar policies, aggregators, ring-buffer series, and the
//!   volume/footprint/market profile analytics built on top of them.
//! - [`tracker`]: the order lifecycle state machine.
//! - [`rate_limiter`]: the token-bucket order-submission rate limiter.
//! - [`storage`] (behind the `journal` feature): the mmap-backed bar file
//!   writer and reader.

pub mod backoff;
pub mod bars;
pub mod book;
pub mod bus;
pub mod decimal;
pub mod event;
pub mod prelude;
pub mod rate_limiter;
#[cfg(feature = "journal")]
pub mod storage;
pub mod symbol;
pub mod time;
pub mod tracker;
