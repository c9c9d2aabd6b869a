//! Per-(security, source) market-data record.
//!
//! Every numeric field is its own atomic, so readers never block and never
//! see a torn `f64`. There is no cross-field atomicity: a reader racing an
//! update may observe the new bid price next to the old bid size.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::error::MarketDataError;

pub type Qty = f64;
pub type Volume = f64;

pub const DEPTH_SIZE: usize = 5;
pub const MAX_DERIVED: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub ask_price: f64,
    pub ask_size: Qty,
    pub bid_price: f64,
    pub bid_size: Qty,
}

impl Quote {
    pub fn new(bid_price: f64, bid_size: Qty, ask_price: f64, ask_size: Qty) -> Self {
        Self { ask_price, ask_size, bid_price, bid_size }
    }
}

/// Level 0 is the best bid/ask.
pub type Depth = [Quote; DEPTH_SIZE];

#[derive(Debug, Clone, Copy, Default)]
pub struct Trade {
    pub qty: Qty,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub vwap: f64,
    pub volume: Volume,
}

// open, vwap and qty do not take part: a tick that only moves them is a no-op.
impl PartialEq for Trade {
    fn eq(&self, other: &Self) -> bool {
        self.volume == other.volume
            && self.close == other.close
            && self.high == other.high
            && self.low == other.low
    }
}

#[derive(Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Default)]
struct QuoteCell {
    ask_price: AtomicF64,
    ask_size: AtomicF64,
    bid_price: AtomicF64,
    bid_size: AtomicF64,
}

impl QuoteCell {
    fn load(&self) -> Quote {
        Quote {
            ask_price: self.ask_price.load(),
            ask_size: self.ask_size.load(),
            bid_price: self.bid_price.load(),
            bid_size: self.bid_size.load(),
        }
    }

    fn store(&self, q: &Quote) {
        self.ask_price.store(q.ask_price);
        self.ask_size.store(q.ask_size);
        self.bid_price.store(q.bid_price);
        self.bid_size.store(q.bid_size);
    }
}

#[derive(Default)]
struct TradeCell {
    qty: AtomicF64,
    open: AtomicF64,
    high: AtomicF64,
    low: AtomicF64,
    close: AtomicF64,
    vwap: AtomicF64,
    volume: AtomicF64,
}

impl TradeCell {
    fn load(&self) -> Trade {
        Trade {
            qty: self.qty.load(),
            open: self.open.load(),
            high: self.high.load(),
            low: self.low.load(),
            close: self.close.load(),
            vwap: self.vwap.load(),
            volume: self.volume.load(),
        }
    }

    fn store(&self, t: &Trade) {
        self.qty.store(t.qty);
        self.open.store(t.open);
        self.high.store(t.high);
        self.low.store(t.low);
        self.close.store(t.close);
        self.vwap.store(t.vwap);
        self.volume.store(t.volume);
    }
}

type DerivedValue = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct MarketData {
    tm: AtomicI64,
    trade: TradeCell,
    depth: [QuoteCell; DEPTH_SIZE],
    // Written by batch analytics, rarely. Separate from the tick fields so
    // raw updates never touch it.
    derived: RwLock<SmallVec<[Option<DerivedValue>; 4]>>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unix seconds of the last applied update, 0 if never updated.
    pub fn tm(&self) -> i64 {
        self.tm.load(Ordering::Acquire)
    }

    pub fn trade(&self) -> Trade {
        self.trade.load()
    }

    /// Best bid/ask.
    pub fn quote(&self) -> Quote {
        self.depth[0].load()
    }

    pub fn level(&self, level: usize) -> Option<Quote> {
        self.depth.get(level).map(QuoteCell::load)
    }

    pub fn depth(&self) -> Depth {
        std::array::from_fn(|i| self.depth[i].load())
    }

    /// Mid of the best quote, when both sides are present.
    pub fn mid(&self) -> Option<f64> {
        let q = self.quote();
        (q.bid_price > 0.0 && q.ask_price > 0.0).then(|| (q.bid_price + q.ask_price) / 2.0)
    }

    pub(crate) fn store_quote(&self, level: usize, q: &Quote) {
        self.depth[level].store(q);
    }

    pub(crate) fn store_trade(&self, t: &Trade) {
        self.trade.store(t);
    }

    pub(crate) fn touch(&self, tm: i64) {
        self.tm.store(tm, Ordering::Release);
    }

    /// Stores `value` in slot `id`, replacing whatever was there.
    pub fn set_derived<T: Any + Send + Sync>(&self, value: T, id: usize) -> Result<(), MarketDataError> {
        if id >= MAX_DERIVED {
            return Err(MarketDataError::DerivedSlotOutOfRange { id, max: MAX_DERIVED });
        }
        let mut slots = self.derived.write();
        if slots.len() <= id {
            slots.resize(id + 1, None);
        }
        slots[id] = Some(Arc::new(value));
        Ok(())
    }

    /// Returns the value in slot `id` if one was set with type `T`.
    ///
    /// An unset slot, an out-of-range id and a type mismatch all read as
    /// `None`.
    pub fn get_derived<T: Any + Send + Sync>(&self, id: usize) -> Option<Arc<T>> {
        let slots = self.derived.read();
        let value = slots.get(id)?.as_ref()?.clone();
        value.downcast::<T>().ok()
    }
}

impl fmt::Debug for MarketData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketData")
            .field("tm", &self.tm())
            .field("trade", &self.trade())
            .field("quote", &self.quote())
            .field("derived_slots", &self.derived.read().len())
            .finish()
    }
}
