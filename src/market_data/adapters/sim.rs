// Simulated venue: random-walk quotes and prints for subscribed securities.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{debug, info};

use super::{MarketDataAdapter, SubscribeStatus};
use crate::market_data::map::MarketDataMap;
use crate::market_data::record::Quote;
use crate::security::{ExchangeId, Security, SecurityId};

#[derive(Debug)]
struct Instrument {
    id: SecurityId,
    mid: f64,
}

pub struct SimAdapter {
    name: String,
    md: MarketDataMap,
    markets: Vec<ExchangeId>,
    // only the feed loop and subscribe touch it
    instruments: Mutex<Vec<Instrument>>,
    tick_size: f64,
}

impl SimAdapter {
    pub fn new(name: &str, md: MarketDataMap, markets: Vec<ExchangeId>) -> Self {
        Self {
            name: name.to_string(),
            md,
            markets,
            instruments: Mutex::new(Vec::new()),
            tick_size: 0.01,
        }
    }

    pub fn subscribed(&self) -> Vec<SecurityId> {
        self.instruments.lock().iter().map(|i| i.id).collect()
    }

    /// One simulated market event per subscribed security.
    pub fn step(&self, rng: &mut impl Rng) {
        let mut instruments = self.instruments.lock();
        for inst in instruments.iter_mut() {
            let ticks: i32 = rng.gen_range(-3..=3);
            inst.mid = (inst.mid + ticks as f64 * self.tick_size).max(self.tick_size * 10.0);
            let half_spread = self.tick_size * rng.gen_range(1..=3) as f64;
            for level in 0..crate::market_data::record::DEPTH_SIZE {
                let offset = half_spread + level as f64 * self.tick_size;
                let quote = Quote::new(
                    inst.mid - offset,
                    rng.gen_range(1..=50) as f64 * 100.0,
                    inst.mid + offset,
                    rng.gen_range(1..=50) as f64 * 100.0,
                );
                // level is always in range
                let _ = self.md.update_quote(inst.id, quote, level);
            }
            if rng.gen_bool(0.3) {
                let px = if rng.gen_bool(0.5) { inst.mid - half_spread } else { inst.mid + half_spread };
                self.md.update_trade(inst.id, px, rng.gen_range(1..=10) as f64 * 100.0);
            }
        }
    }

    /// Drives the feed until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, seed: u64, mut shutdown: watch::Receiver<bool>) {
        info!(adapter = %self.name, src = %self.md.src(), "sim feed started");
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.step(&mut rng),
                _ = shutdown.changed() => break,
            }
        }
        info!(adapter = %self.name, "sim feed stopped");
    }
}

impl MarketDataAdapter for SimAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn market_data(&self) -> &MarketDataMap {
        &self.md
    }

    fn markets(&self) -> &[ExchangeId] {
        &self.markets
    }

    fn subscribe(&self, sec: &Security) -> SubscribeStatus {
        let mut instruments = self.instruments.lock();
        if instruments.iter().any(|i| i.id == sec.id) {
            return SubscribeStatus::AlreadySubscribed;
        }
        // seed the walk from whatever the store already has
        let md = self.md.record(sec.id);
        let mid = md.mid().unwrap_or(100.0);
        instruments.push(Instrument { id: sec.id, mid });
        debug!(adapter = %self.name, security = %sec.id, symbol = %sec.symbol, "subscribed");
        SubscribeStatus::Accepted
    }
}
