// Wires simulated venues, the market data store and the risk gate together
use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::market_data::adapters::sim::SimAdapter;
use crate::market_data::data_src::DataSrc;
use crate::market_data::manager::MarketDataManager;
use crate::risk::{take_rejection, Order, RiskManager, Side};
use crate::security::Security;

#[derive(Debug, Default)]
pub struct DemoReport {
    pub accepted: u64,
    pub rejected: u64,
    pub p50_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
}

pub async fn run_demo(cfg: AppConfig, duration: Duration) -> anyhow::Result<DemoReport> {
    info!("starting market data + risk demo");

    // 1. Register one simulated venue per configured adapter
    let md = Arc::new(MarketDataManager::new());
    let mut sims = Vec::with_capacity(cfg.adapters.len());
    for adapter in &cfg.adapters {
        let sim = Arc::new(SimAdapter::new(&adapter.name, md.map(adapter.data_src()?), adapter.markets.clone()));
        md.add(sim.clone())?;
        sims.push(sim);
    }
    if !cfg.default_adapter.is_empty() && !md.set_default(&cfg.default_adapter) {
        warn!(adapter = %cfg.default_adapter, "configured default adapter not registered");
    }

    // 2. Risk gate prices market orders off the store
    let risk = Arc::new(RiskManager::new(cfg.limits, Arc::new(SystemClock)).with_market_data(md.clone()));

    // 3. Subscribe every security through the router
    let securities: Vec<Arc<Security>> = cfg.securities.iter().cloned().map(Arc::new).collect();
    for sec in &securities {
        md.get(sec, DataSrc::DEFAULT);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 4. Feed tasks
    let mut feeds = Vec::with_capacity(sims.len());
    for (i, sim) in sims.iter().enumerate() {
        let sim = Arc::clone(sim);
        let rx = shutdown_rx.clone();
        let tick = Duration::from_millis(cfg.demo.tick_ms.max(1));
        let seed = cfg.demo.seed.wrapping_add(i as u64);
        feeds.push(tokio::spawn(async move { sim.run(tick, seed, rx).await }));
    }

    // 5. Order flow through the risk gate
    let order_task = {
        let md = md.clone();
        let risk = risk.clone();
        let securities = securities.clone();
        let mut rx = shutdown_rx.clone();
        let interval = Duration::from_millis(cfg.demo.order_interval_ms.max(1));
        let seed = cfg.demo.seed;
        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut latency = Histogram::<u64>::new(3)?;
            let mut report = DemoReport::default();
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = rx.changed() => break,
                }
                if securities.is_empty() {
                    continue;
                }
                let sec = &securities[rng.gen_range(0..securities.len())];
                let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                let qty = rng.gen_range(1..=15) as f64 * 100.0;
                let quote = md.get_lite(sec.id, DataSrc::DEFAULT).quote();
                let price = if rng.gen_bool(0.2) {
                    0.0
                } else if side == Side::Buy {
                    quote.ask_price
                } else {
                    quote.bid_price
                };
                let ord = Order::new(Arc::clone(sec), side, qty, price);

                let started = Instant::now();
                let ok = risk.check(&ord);
                latency.saturating_record(started.elapsed().as_nanos() as u64);

                if ok {
                    report.accepted += 1;
                    if price > 0.0 {
                        risk.on_fill(&ord, qty, price);
                    }
                } else {
                    report.rejected += 1;
                    info!(symbol = %sec.symbol, reason = %take_rejection(), "order refused");
                }
            }
            report.p50_ns = latency.value_at_quantile(0.5);
            report.p99_ns = latency.value_at_quantile(0.99);
            report.max_ns = latency.max();
            Ok::<_, anyhow::Error>(report)
        })
    };

    // 6. Print BBO every second
    let bbo_task = {
        let md = md.clone();
        let securities = securities.clone();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = rx.changed() => break,
                }
                for sec in &securities {
                    let record = md.get_lite(sec.id, DataSrc::DEFAULT);
                    let q = record.quote();
                    let t = record.trade();
                    info!(
                        symbol = %sec.symbol,
                        bid_px = q.bid_price,
                        bid_sz = q.bid_size,
                        ask_px = q.ask_price,
                        ask_sz = q.ask_size,
                        last = t.close,
                        volume = t.volume,
                        "bbo"
                    );
                }
            }
        })
    };

    tokio::time::sleep(duration).await;
    shutdown_tx.send(true)?;

    for feed in feeds {
        feed.await?;
    }
    bbo_task.await?;
    let report = order_task.await??;
    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        p50_ns = report.p50_ns,
        p99_ns = report.p99_ns,
        max_ns = report.max_ns,
        "demo finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_runs_orders_through_gate() {
        let mut cfg = AppConfig::default();
        cfg.demo.tick_ms = 1;
        cfg.demo.order_interval_ms = 1;
        let report = run_demo(cfg, Duration::from_millis(200)).await.unwrap();
        assert!(report.accepted + report.rejected > 0);
    }
}
