//! Real-time market-data state store with multi-source routing, derived
//! analytics slots, and the pre-trade risk gate that reads it.

pub mod clock;
pub mod config;
pub mod demo;
pub mod error;
pub mod market_data;
pub mod risk;
pub mod security;
pub mod telemetry;

pub use error::{ConfigError, DataSrcError, MarketDataError, RiskViolation};
pub use market_data::{DataSrc, MarketData, MarketDataAdapter, MarketDataManager, MarketDataMap};
pub use risk::{Limits, Order, RiskManager, Side, Throttle};
pub use security::{ExchangeId, Security, SecurityId};
