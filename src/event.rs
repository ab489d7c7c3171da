//! Event payloads carried over the [`crate::bus::EventBus`]: trades and
//! book updates feed the order book and bar aggregators; bar events
//! re-enter the bus for strategy and writer subscribers.

use crate::bus::Sequenced;
use crate::decimal::{Price, Quantity};
use crate::symbol::SymbolId;

/// The contract family a symbol trades under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Instrument {
    /// Spot market.
    Spot,
    /// Dated futures contract.
    Future,
    /// Inverse (coin-margined) perpetual or future.
    Inverse,
    /// Options contract.
    Option,
}

/// A single executed trade, as delivered by a market data connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TradeEvent {
    /// The trading symbol.
    pub symbol: SymbolId,
    /// The instrument class.
    pub instrument: Instrument,
    /// Trade price.
    pub price: Price,
    /// Trade quantity.
    pub quantity: Quantity,
    /// `true` if the trade was the result of an aggressive buy order.
    pub is_buy: bool,
    /// Exchange-reported timestamp, nanoseconds since epoch.
    pub exchange_ts_ns: i64,
    /// Sequence number assigned by the bus at publish time.
    pub tick_sequence: i64,
}

impl Sequenced for TradeEvent {
    fn set_tick_sequence(&mut self, seq: i64) {
        self.tick_sequence = seq;
    }
}

/// A book snapshot or delta update, tagged with its symbol and sequence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BookUpdateEvent {
    /// The trading symbol this update applies to.
    pub symbol: SymbolId,
    /// The snapshot or delta payload.
    pub update: crate::book::BookUpdate,
    /// Sequence number assigned by the bus at publish time.
    pub tick_sequence: i64,
}

impl Sequenced for BookUpdateEvent {
    fn set_tick_sequence(&mut self, seq: i64) {
        self.tick_sequence = seq;
    }
}
