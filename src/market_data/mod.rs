// Market data module entrypoint
pub mod adapters;  // venue ingestion endpoints (trait + simulated feed)
pub mod data_src;  // source name <-> integer key codec
pub mod manager;   // adapter registry, routing, lookups
pub mod map;       // per-source concurrent record map + update mutators
pub mod record;    // MarketData, Quote, Trade, derived slots

pub use adapters::{MarketDataAdapter, SubscribeStatus};
pub use data_src::DataSrc;
pub use manager::MarketDataManager;
pub use map::{BookSide, MarketDataMap};
pub use record::{Depth, MarketData, Qty, Quote, Trade, Volume, DEPTH_SIZE, MAX_DERIVED};
