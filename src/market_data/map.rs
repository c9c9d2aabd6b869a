//! Concurrent security -> record map owned per source, and the update
//! mutators venue adapters call on ingestion.
//!
//! Each security is written by a single adapter thread at a time. Readers
//! hold `Arc<MarketData>` handles and read without locking.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::clock::unix_time;
use crate::error::MarketDataError;
use crate::market_data::data_src::DataSrc;
use crate::market_data::record::{MarketData, Qty, Quote, Trade, Volume, DEPTH_SIZE};
use crate::security::SecurityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

type Records = DashMap<SecurityId, Arc<MarketData>, ahash::RandomState>;

#[derive(Debug)]
struct Inner {
    src: DataSrc,
    records: Records,
}

/// Cheap-to-clone handle on one source's records.
#[derive(Debug, Clone)]
pub struct MarketDataMap {
    inner: Arc<Inner>,
}

impl MarketDataMap {
    pub fn new(src: DataSrc) -> Self {
        Self {
            inner: Arc::new(Inner {
                src,
                records: DashMap::with_hasher(ahash::RandomState::new()),
            }),
        }
    }

    pub fn src(&self) -> DataSrc {
        self.inner.src
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    pub fn ptr_eq(&self, other: &MarketDataMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record for `id`, created empty on first access. Never removed.
    pub fn record(&self, id: SecurityId) -> Arc<MarketData> {
        if let Some(md) = self.inner.records.get(&id) {
            return Arc::clone(md.value());
        }
        Arc::clone(self.inner.records.entry(id).or_default().value())
    }

    pub fn contains(&self, id: SecurityId) -> bool {
        self.inner.records.contains_key(&id)
    }

    fn modify_quote(&self, id: SecurityId, level: usize, f: impl FnOnce(&mut Quote)) -> Result<bool, MarketDataError> {
        if level >= DEPTH_SIZE {
            warn!(security = %id, src = %self.src(), depth_level = level, "depth level out of range");
            return Err(MarketDataError::LevelOutOfRange { level, depth: DEPTH_SIZE });
        }
        let md = self.record(id);
        let old = md.level(level).unwrap_or_default();
        let mut new = old;
        f(&mut new);
        if new == old {
            return Ok(false);
        }
        md.store_quote(level, &new);
        md.touch(unix_time());
        trace!(security = %id, src = %self.src(), depth_level = level, ?new, "quote updated");
        Ok(true)
    }

    fn modify_best(&self, id: SecurityId, f: impl FnOnce(&mut Quote)) -> bool {
        self.modify_quote(id, 0, f).unwrap_or(false)
    }

    fn modify_trade(&self, id: SecurityId, f: impl FnOnce(&mut Trade)) -> bool {
        let md = self.record(id);
        let old = md.trade();
        let mut new = old;
        f(&mut new);
        if new == old && new.qty == old.qty {
            return false;
        }
        md.store_trade(&new);
        md.touch(unix_time());
        trace!(security = %id, src = %self.src(), ?new, "trade updated");
        true
    }

    /// Replaces the quote at `level` (0 = best).
    pub fn update_quote(&self, id: SecurityId, quote: Quote, level: usize) -> Result<bool, MarketDataError> {
        self.modify_quote(id, level, |q| *q = quote)
    }

    /// Updates one side of the quote at `level`.
    pub fn update_side(
        &self,
        id: SecurityId,
        side: BookSide,
        price: f64,
        size: Qty,
        level: usize,
    ) -> Result<bool, MarketDataError> {
        self.modify_quote(id, level, |q| match side {
            BookSide::Bid => {
                q.bid_price = price;
                q.bid_size = size;
            }
            BookSide::Ask => {
                q.ask_price = price;
                q.ask_size = size;
            }
        })
    }

    /// Trade print: moves close/high/low/open and accumulates volume and vwap.
    pub fn update_trade(&self, id: SecurityId, last_price: f64, last_qty: Qty) -> bool {
        self.modify_trade(id, |t| apply_print(t, last_price, last_qty))
    }

    /// Aggregate bar from venues that publish session statistics directly.
    pub fn update_bar(
        &self,
        id: SecurityId,
        last_price: f64,
        volume: Volume,
        open: f64,
        high: f64,
        low: f64,
        vwap: f64,
    ) -> bool {
        self.modify_trade(id, |t| {
            t.close = last_price;
            t.volume = volume;
            t.open = open;
            t.high = high;
            t.low = low;
            t.vwap = vwap;
        })
    }

    /// Uses the current mid as the last price, for sources without trades.
    pub fn update_mid_as_last_price(&self, id: SecurityId) -> bool {
        match self.record(id).mid() {
            Some(mid) => self.update_last_price(id, mid),
            None => false,
        }
    }

    pub fn update_ask_price(&self, id: SecurityId, v: f64) -> bool {
        self.modify_best(id, |q| q.ask_price = v)
    }

    pub fn update_ask_size(&self, id: SecurityId, v: Qty) -> bool {
        self.modify_best(id, |q| q.ask_size = v)
    }

    pub fn update_bid_price(&self, id: SecurityId, v: f64) -> bool {
        self.modify_best(id, |q| q.bid_price = v)
    }

    pub fn update_bid_size(&self, id: SecurityId, v: Qty) -> bool {
        self.modify_best(id, |q| q.bid_size = v)
    }

    pub fn update_last_price(&self, id: SecurityId, v: f64) -> bool {
        self.modify_trade(id, |t| apply_print(t, v, 0.0))
    }

    pub fn update_last_size(&self, id: SecurityId, v: Qty) -> bool {
        self.modify_trade(id, |t| t.qty = v)
    }
}

fn apply_print(t: &mut Trade, price: f64, qty: Qty) {
    if price > 0.0 {
        if t.open == 0.0 {
            t.open = price;
        }
        if price > t.high {
            t.high = price;
        }
        if t.low == 0.0 || price < t.low {
            t.low = price;
        }
        t.close = price;
    }
    if qty > 0.0 {
        let volume = t.volume + qty;
        t.vwap = (t.vwap * t.volume + price * qty) / volume;
        t.volume = volume;
        t.qty = qty;
    }
}
