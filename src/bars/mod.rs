//! Multi-policy bar aggregation: folds a trade stream into OHLCV bars
//! under pluggable closing policies, fans out into multi-timeframe
//! historical series, and derives volume/footprint/TPO analytics.

pub mod aggregator;
pub mod bar;
pub mod matrix;
pub mod multi;
pub mod policy;
pub mod profile;
pub mod series;

pub use aggregator::BarAggregator;
pub use bar::{Bar, BarCloseReason, BarEvent, BarType, TimeframeId};
pub use matrix::BarMatrix;
pub use multi::MultiTimeframeAggregator;
pub use policy::{
    BarPolicy, HeikinAshiBarPolicy, Policy, PolicyState, RangeBarPolicy, RenkoBarPolicy, TickBarPolicy,
    TimeBarPolicy, VolumeBarPolicy,
};
pub use profile::{FootprintBar, MarketProfile, VolumeProfile};
pub use series::BarSeries;
