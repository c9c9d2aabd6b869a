use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mdgate::market_data::adapters::sim::SimAdapter;
use mdgate::market_data::{MarketDataAdapter, Quote};
use mdgate::clock::ManualClock;
use mdgate::{DataSrc, ExchangeId, Limits, MarketDataManager, Order, RiskManager, Security, Side};

const SECURITIES: u32 = 16;
const TICKS: u32 = 2_000;

fn manager_with_venues(n: usize) -> (Arc<MarketDataManager>, Vec<Arc<SimAdapter>>) {
    let md = Arc::new(MarketDataManager::new());
    let mut venues = Vec::new();
    for i in 0..n {
        let src = DataSrc::encode(&format!("V{i}")).unwrap();
        let venue = Arc::new(SimAdapter::new(&format!("venue-{i}"), md.map(src), vec![ExchangeId(1)]));
        md.add(venue.clone()).unwrap();
        venues.push(venue);
    }
    (md, venues)
}

#[test]
fn writers_per_venue_and_concurrent_readers() {
    let (md, venues) = manager_with_venues(3);
    let done = AtomicBool::new(false);
    let reads = AtomicUsize::new(0);

    crossbeam::scope(|s| {
        for (v, venue) in venues.iter().enumerate() {
            s.spawn(move |_| {
                let map = venue.market_data();
                for tick in 1..=TICKS {
                    for sec in 0..SECURITIES {
                        let px = (v as f64 + 1.0) * 100.0 + tick as f64;
                        map.update_quote(mdgate::SecurityId(sec), Quote::new(px - 0.5, 1.0, px + 0.5, 1.0), 0)
                            .unwrap();
                        map.update_trade(mdgate::SecurityId(sec), px, 1.0);
                    }
                }
            });
        }
        for _ in 0..4 {
            s.spawn(|_| {
                while !done.load(Ordering::Acquire) {
                    for (v, venue) in venues.iter().enumerate() {
                        for sec in 0..SECURITIES {
                            let record = md.get_lite(mdgate::SecurityId(sec), venue.src());
                            let q = record.quote();
                            // per-field values are never torn, only combinations may be
                            if q.bid_price > 0.0 {
                                let base = (v as f64 + 1.0) * 100.0;
                                assert!(q.bid_price >= base && q.bid_price <= base + TICKS as f64);
                            }
                            reads.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
        s.spawn(|_| {
            // let the writers finish, then release the readers
            while venues
                .iter()
                .any(|v| v.market_data().record(mdgate::SecurityId(SECURITIES - 1)).trade().volume < TICKS as f64)
            {
                std::thread::yield_now();
            }
            done.store(true, Ordering::Release);
        });
    })
    .unwrap();

    assert!(reads.load(Ordering::Relaxed) > 0);
    for (v, venue) in venues.iter().enumerate() {
        let record = md.get_lite(mdgate::SecurityId(0), venue.src());
        let last = (v as f64 + 1.0) * 100.0 + TICKS as f64;
        assert_eq!(record.trade().close, last);
        assert_eq!(record.trade().volume, TICKS as f64);
        assert_eq!(record.quote().ask_price, last + 0.5);
    }
}

#[test]
fn concurrent_get_returns_one_record_and_subscribes_once() {
    let (md, venues) = manager_with_venues(1);
    let sec = Security::new(42, 1, "XYZ");

    let records: Vec<_> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|_| md.get(&sec, DataSrc::DEFAULT))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    assert!(records.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(venues[0].subscribed(), vec![sec.id]);
}

#[test]
fn derived_slots_under_contention() {
    let (md, _venues) = manager_with_venues(1);
    let record = md.get_lite(mdgate::SecurityId(1), DataSrc::DEFAULT);

    crossbeam::scope(|s| {
        for id in 0..4usize {
            let record = &record;
            s.spawn(move |_| {
                for i in 0..500 {
                    record.set_derived(i as f64, id).unwrap();
                }
            });
        }
        for _ in 0..4 {
            let record = &record;
            s.spawn(move |_| {
                for _ in 0..500 {
                    for id in 0..4 {
                        if let Some(v) = record.get_derived::<f64>(id) {
                            assert!((0.0..500.0).contains(&*v));
                        }
                        assert!(record.get_derived::<u64>(id).is_none());
                    }
                }
            });
        }
    })
    .unwrap();

    for id in 0..4 {
        assert_eq!(*record.get_derived::<f64>(id).unwrap(), 499.0);
    }
}

#[test]
fn concurrent_checks_admit_exactly_the_rate_limit() {
    let limits = Limits { msg_rate: 40.0, msg_rate_per_security: 25.0, ..Default::default() };
    let risk = RiskManager::new(limits, Arc::new(ManualClock::new(7)));
    let admitted = AtomicUsize::new(0);
    let securities: Vec<_> = (0..2).map(|i| Arc::new(Security::new(i, 1, "RATE"))).collect();

    crossbeam::scope(|s| {
        for t in 0..8 {
            let (risk, admitted) = (&risk, &admitted);
            let ord = Order::new(securities[t % 2].clone(), Side::Buy, 1.0, 1.0);
            s.spawn(move |_| {
                for _ in 0..50 {
                    if risk.check(&ord) {
                        admitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    })
    .unwrap();

    // each security is capped at 25, together at 40
    assert_eq!(admitted.load(Ordering::Relaxed), 40);
}
