use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mdgate::clock::SystemClock;
use mdgate::market_data::Quote;
use mdgate::{DataSrc, Limits, MarketDataManager, Order, RiskManager, Security, SecurityId, Side};

fn market_data(c: &mut Criterion) {
    let md = MarketDataManager::new();
    let map = md.map(DataSrc::encode("BNCH").unwrap());
    let id = SecurityId(1);
    let mut px = 100.0;

    c.bench_function("update_quote", |b| {
        b.iter(|| {
            px += 0.01;
            map.update_quote(id, black_box(Quote::new(px, 10.0, px + 0.01, 12.0)), 0)
        })
    });

    c.bench_function("get_lite_quote", |b| {
        b.iter(|| md.get_lite(black_box(id), DataSrc::encode("BNCH").unwrap()).quote())
    });

    c.bench_function("data_src_round_trip", |b| {
        b.iter(|| DataSrc::encode(black_box("CTP")).map(|s| s.name()))
    });
}

fn risk(c: &mut Criterion) {
    let limits = Limits {
        order_qty: 1e9,
        order_value: 1e12,
        value: 1e12,
        turnover: 1e15,
        ..Default::default()
    };
    let risk = RiskManager::new(limits, Arc::new(SystemClock));
    let ord = Order::new(Arc::new(Security::new(1, 1, "BNCH")), Side::Buy, 100.0, 10.0);

    c.bench_function("risk_check", |b| b.iter(|| risk.check(black_box(&ord))));
}

criterion_group!(benches, market_data, risk);
criterion_main!(benches);
