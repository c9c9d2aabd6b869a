// Shared trait for market data adapters

use crate::market_data::data_src::DataSrc;
use crate::market_data::map::MarketDataMap;
use crate::security::{ExchangeId, Security};

/// Outcome of a venue subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeStatus {
    Accepted,
    AlreadySubscribed,
    Failed(String),
}

impl SubscribeStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, SubscribeStatus::Failed(_))
    }
}

/// A venue ingestion endpoint.
///
/// Implementations are built with the map handed out by
/// `MarketDataManager::map` for their source and write ticks into it
/// through the `update_*` mutators on [`MarketDataMap`].
pub trait MarketDataAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Map this adapter writes into.
    fn market_data(&self) -> &MarketDataMap;

    /// Exchanges this adapter can route for.
    fn markets(&self) -> &[ExchangeId];

    fn src(&self) -> DataSrc {
        self.market_data().src()
    }

    /// Starts the venue subscription for `sec`.
    ///
    /// Must not panic: failures are reported through the returned status
    /// (and the adapter's own logging), never by unwinding.
    fn subscribe(&self, sec: &Security) -> SubscribeStatus;
}

pub mod sim;
