//! Process-wide registry of market-data adapters and their per-source maps.
//!
//! Built once at startup and shared as `Arc<MarketDataManager>` with every
//! consumer. Routing: `(source, exchange)` resolves to the first adapter
//! registered for that pair, falling back to the default adapter.

use std::sync::Arc;

use ahash::AHashMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::MarketDataError;
use crate::market_data::adapters::MarketDataAdapter;
use crate::market_data::data_src::DataSrc;
use crate::market_data::map::MarketDataMap;
use crate::market_data::record::MarketData;
use crate::security::{ExchangeId, Security, SecurityId};

pub type AdapterRef = Arc<dyn MarketDataAdapter>;

#[derive(Default)]
pub struct MarketDataManager {
    maps: DashMap<DataSrc, MarketDataMap, ahash::RandomState>,
    adapters: RwLock<Vec<AdapterRef>>,
    default: RwLock<Option<AdapterRef>>,
    routes: RwLock<AHashMap<(DataSrc, ExchangeId), Vec<AdapterRef>>>,
    // (security, source) -> adapter chosen on first request
    subscriptions: DashMap<(SecurityId, DataSrc), AdapterRef, ahash::RandomState>,
}

impl MarketDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map for `src`, created on first use. Adapters are built with this.
    pub fn map(&self, src: DataSrc) -> MarketDataMap {
        if let Some(map) = self.maps.get(&src) {
            return map.value().clone();
        }
        self.maps
            .entry(src)
            .or_insert_with(|| MarketDataMap::new(src))
            .value()
            .clone()
    }

    /// Registers an adapter and its routes. The first adapter added becomes
    /// the default.
    #[instrument(skip(self, adapter), fields(adapter = adapter.name(), src = %adapter.src()))]
    pub fn add(&self, adapter: AdapterRef) -> Result<(), MarketDataError> {
        let src = adapter.src();
        if !adapter.market_data().ptr_eq(&self.map(src)) {
            return Err(MarketDataError::ForeignMap { adapter: adapter.name().to_string(), src });
        }
        {
            let mut routes = self.routes.write();
            for exchange in adapter.markets() {
                routes.entry((src, *exchange)).or_default().push(Arc::clone(&adapter));
            }
        }
        {
            let mut default = self.default.write();
            if default.is_none() {
                info!("default market data adapter");
                *default = Some(Arc::clone(&adapter));
            }
        }
        self.adapters.write().push(adapter);
        info!(adapters = self.adapters.read().len(), "market data adapter registered");
        Ok(())
    }

    /// Makes the adapter named `name` the default. Returns false if unknown.
    pub fn set_default(&self, name: &str) -> bool {
        let found = self.adapters.read().iter().find(|a| a.name() == name).cloned();
        match found {
            Some(adapter) => {
                *self.default.write() = Some(adapter);
                true
            }
            None => false,
        }
    }

    pub fn get_default(&self) -> Option<AdapterRef> {
        self.default.read().clone()
    }

    pub fn adapters(&self) -> Vec<AdapterRef> {
        self.adapters.read().clone()
    }

    /// Resolves `DataSrc::DEFAULT` to the default adapter's source.
    fn effective_src(&self, src: DataSrc) -> DataSrc {
        if !src.is_default() {
            return src;
        }
        self.default.read().as_ref().map(|a| a.src()).unwrap_or(DataSrc::DEFAULT)
    }

    fn route(&self, sec: &Security, src: DataSrc) -> Option<AdapterRef> {
        if let Some(adapter) = self.routes.read().get(&(src, sec.exchange)).and_then(|v| v.first()) {
            return Some(Arc::clone(adapter));
        }
        self.get_default()
    }

    /// Subscribes `sec` on the adapter routed for `src`, once per pair.
    /// Later calls return the adapter chosen the first time. Nothing is
    /// recorded while no adapter resolves, so one added later still gets
    /// the subscription.
    pub fn subscribe(&self, sec: &Security, src: DataSrc) -> Option<AdapterRef> {
        let src = self.effective_src(src);
        let adapter = match self.subscriptions.entry((sec.id, src)) {
            Entry::Occupied(e) => return Some(Arc::clone(e.get())),
            Entry::Vacant(v) => {
                let Some(adapter) = self.route(sec, src) else {
                    warn!(security = %sec.id, symbol = %sec.symbol, %src, "no market data adapter resolvable");
                    return None;
                };
                v.insert(Arc::clone(&adapter));
                adapter
            }
        };
        Self::start_subscription(&adapter, sec, src);
        Some(adapter)
    }

    #[instrument(skip_all, fields(adapter = adapter.name(), security = %sec.id, src = %src))]
    fn start_subscription(adapter: &AdapterRef, sec: &Security, src: DataSrc) {
        let status = adapter.subscribe(sec);
        if status.is_ok() {
            debug!(?status, "market data subscribed");
            metrics::counter!("mdgate_subscriptions_total").increment(1);
        } else {
            warn!(?status, "market data subscription failed");
        }
    }

    /// Record for `(sec, src)`, subscribing on first access.
    pub fn get(&self, sec: &Security, src: DataSrc) -> Arc<MarketData> {
        match self.subscribe(sec, src) {
            Some(adapter) => adapter.market_data().record(sec.id),
            None => self.map(self.effective_src(src)).record(sec.id),
        }
    }

    /// Same lookup as [`get`](Self::get) without subscribing or routing.
    pub fn get_lite(&self, id: SecurityId, src: DataSrc) -> Arc<MarketData> {
        let src = self.effective_src(src);
        if let Some(adapter) = self.subscriptions.get(&(id, src)).map(|e| Arc::clone(e.value())) {
            return adapter.market_data().record(id);
        }
        self.map(src).record(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::SubscribeStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        name: String,
        md: MarketDataMap,
        markets: Vec<ExchangeId>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingAdapter {
        fn new(mgr: &MarketDataManager, name: &str, src: &str, markets: &[u16]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                md: mgr.map(DataSrc::encode(src).unwrap()),
                markets: markets.iter().map(|m| ExchangeId(*m)).collect(),
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MarketDataAdapter for CountingAdapter {
        fn name(&self) -> &str {
            &self.name
        }
        fn market_data(&self) -> &MarketDataMap {
            &self.md
        }
        fn markets(&self) -> &[ExchangeId] {
            &self.markets
        }
        fn subscribe(&self, _sec: &Security) -> SubscribeStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                SubscribeStatus::Failed("venue down".into())
            } else {
                SubscribeStatus::Accepted
            }
        }
    }

    fn src(s: &str) -> DataSrc {
        DataSrc::encode(s).unwrap()
    }

    #[test]
    fn test_add_rejects_foreign_map() {
        let mgr = MarketDataManager::new();
        let other = MarketDataManager::new();
        let adapter = CountingAdapter::new(&other, "a", "A", &[1]);
        assert!(matches!(mgr.add(adapter), Err(MarketDataError::ForeignMap { .. })));
        assert!(mgr.get_default().is_none());
    }

    #[test]
    fn test_first_adapter_is_default() {
        let mgr = MarketDataManager::new();
        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        let b = CountingAdapter::new(&mgr, "b", "B", &[1]);
        mgr.add(a).unwrap();
        mgr.add(b).unwrap();
        assert_eq!(mgr.get_default().unwrap().name(), "a");
        assert!(mgr.set_default("b"));
        assert_eq!(mgr.get_default().unwrap().name(), "b");
        assert!(!mgr.set_default("zz"));
        assert_eq!(mgr.adapters().len(), 2);
    }

    #[test]
    fn test_subscribe_once_per_pair() {
        let mgr = MarketDataManager::new();
        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        mgr.add(a.clone()).unwrap();
        let sec = Security::new(1, 1, "X");

        let chosen = mgr.subscribe(&sec, src("A")).unwrap();
        assert_eq!(chosen.name(), "a");
        mgr.subscribe(&sec, src("A"));
        mgr.get(&sec, src("A"));
        // default source resolves to the same pair
        mgr.get(&sec, DataSrc::DEFAULT);
        assert_eq!(a.calls(), 1);

        mgr.subscribe(&Security::new(2, 1, "Y"), src("A"));
        assert_eq!(a.calls(), 2);
    }

    #[test]
    fn test_route_prefers_first_registered_then_default() {
        let mgr = MarketDataManager::new();
        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        let b1 = CountingAdapter::new(&mgr, "b1", "B", &[2]);
        let b2 = CountingAdapter::new(&mgr, "b2", "B", &[2]);
        mgr.add(a.clone()).unwrap();
        mgr.add(b1.clone()).unwrap();
        mgr.add(b2.clone()).unwrap();

        let on_two = Security::new(1, 2, "X");
        assert_eq!(mgr.subscribe(&on_two, src("B")).unwrap().name(), "b1");
        assert_eq!(b2.calls(), 0);

        // no (B, 9) route: default adapter
        let on_nine = Security::new(2, 9, "Y");
        assert_eq!(mgr.subscribe(&on_nine, src("B")).unwrap().name(), "a");
        assert_eq!(a.calls(), 1);
    }

    #[test]
    fn test_subscribe_without_adapters() {
        let mgr = MarketDataManager::new();
        let sec = Security::new(1, 1, "X");
        assert!(mgr.subscribe(&sec, src("A")).is_none());
        // still returns a live record
        let md = mgr.get(&sec, src("A"));
        assert!(Arc::ptr_eq(&md, &mgr.get_lite(sec.id, src("A"))));
    }

    #[test]
    fn test_adapter_added_after_unresolved_subscribe() {
        let mgr = MarketDataManager::new();
        let sec = Security::new(1, 1, "X");
        assert!(mgr.subscribe(&sec, src("A")).is_none());

        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        mgr.add(a.clone()).unwrap();
        assert_eq!(mgr.subscribe(&sec, src("A")).unwrap().name(), "a");
        assert_eq!(a.calls(), 1);

        let md = mgr.get(&sec, src("A"));
        assert_eq!(a.calls(), 1);
        a.market_data().update_last_price(sec.id, 3.0);
        assert_eq!(md.trade().close, 3.0);
    }

    #[test]
    fn test_failed_subscription_does_not_propagate() {
        let mgr = MarketDataManager::new();
        let a = Arc::new(CountingAdapter {
            name: "a".into(),
            md: mgr.map(src("A")),
            markets: vec![ExchangeId(1)],
            calls: AtomicUsize::new(0),
            fail: true,
        });
        mgr.add(a.clone()).unwrap();
        let sec = Security::new(1, 1, "X");
        assert!(mgr.subscribe(&sec, src("A")).is_some());
        mgr.get(&sec, src("A"));
        assert_eq!(a.calls(), 1);
    }

    #[test]
    fn test_get_returns_same_record() {
        let mgr = MarketDataManager::new();
        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        let b = CountingAdapter::new(&mgr, "b", "B", &[1]);
        mgr.add(a.clone()).unwrap();
        mgr.add(b.clone()).unwrap();
        let sec = Security::new(5, 1, "X");

        let first = mgr.get(&sec, src("A"));
        let again = mgr.get(&sec, src("A"));
        let other = mgr.get(&sec, src("B"));
        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(Arc::ptr_eq(&first, &mgr.get(&sec, DataSrc::DEFAULT)));

        a.market_data().update_last_price(sec.id, 10.0);
        assert_eq!(again.trade().close, 10.0);
        assert_eq!(other.trade().close, 0.0);
    }

    #[test]
    fn test_get_lite_has_no_side_effects() {
        let mgr = MarketDataManager::new();
        let a = CountingAdapter::new(&mgr, "a", "A", &[1]);
        mgr.add(a.clone()).unwrap();
        let sec = Security::new(5, 1, "X");

        let lite = mgr.get_lite(sec.id, DataSrc::DEFAULT);
        assert_eq!(a.calls(), 0);
        mgr.get_lite(sec.id, src("A"));
        assert_eq!(a.calls(), 0);

        let full = mgr.get(&sec, src("A"));
        assert_eq!(a.calls(), 1);
        assert!(Arc::ptr_eq(&lite, &full));

        mgr.get_lite(sec.id, src("A"));
        assert_eq!(a.calls(), 1);
    }
}
