/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/10/25
******************************************************************************/

//! Prelude module that re-exports commonly used types and traits.
//!
//! This module provides a convenient way to import the most commonly used
//! types, traits, and functions from the `flox` crate. Instead of
//! importing each type individually, you can use:
//!
//! ```rust
//! use flox::prelude::*;
//! ```

// Fixed-point amounts
pub use crate::decimal::{Decimal, Price, Quantity, Volume, SCALE};

// Time
pub use crate::time::TimePoint;

// Symbol map
pub use crate::symbol::{SymbolId, SymbolMap};

// Back-off
pub use crate::backoff::{Backoff, BackoffMode};

// Event bus
pub use crate::bus::{
    CoreAffinityClass, EventBus, EventBusConfig, PublishOutcome, Sequenced, SubscribeError,
    SubscribeOptions,
};
#[cfg(feature = "metrics")]
pub use crate::bus::{BusMetricFlags, BusMetrics};

// Event payloads
pub use crate::event::{BookUpdateEvent, Instrument, TradeEvent};

// Order book
pub use crate::book::{BookError, BookUpdate, Level, OrderBook};

// Bars and analytics
pub use crate::bars::{
    Bar, BarAggregator, BarCloseReason, BarEvent, BarMatrix, BarPolicy, BarSeries, BarType,
    FootprintBar, MarketProfile, MultiTimeframeAggregator, Policy, TimeframeId, VolumeProfile,
};

// Order lifecycle tracking
pub use crate::tracker::{OrderId, OrderState, OrderStatus, OrderTracker, TrackerError};

// Rate limiting
pub use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

// Mmap bar storage
#[cfg(feature = "journal")]
pub use crate::storage::{BarStore, BarWriter, FindMode, SymbolMetadata};
