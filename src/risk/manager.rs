//! Pre-trade admission gate on the order path.
//!
//! Every check is O(1), lock-light and free of I/O. A refused order leaves
//! its reason in a thread-local slot read with [`last_rejection`].

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::RiskViolation;
use crate::market_data::manager::MarketDataManager;
use crate::risk::limits::Limits;
use crate::risk::throttle::Throttle;
use crate::risk::types::Order;
use crate::security::SecurityId;

thread_local! {
    static RISK_ERROR: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Reason for the last rejection on this thread, empty if none.
pub fn last_rejection() -> String {
    RISK_ERROR.with(|e| e.borrow().clone())
}

/// Like [`last_rejection`] but clears the slot.
pub fn take_rejection() -> String {
    RISK_ERROR.with(|e| std::mem::take(&mut *e.borrow_mut()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exposure {
    /// Signed: buys add, sells subtract.
    pub net_value: f64,
    pub turnover: f64,
}

// A fractional limit admits up to the next whole message.
fn rate_limit(limit: f64) -> u32 {
    limit.ceil() as u32
}

fn load_f64(a: &AtomicU64) -> f64 {
    f64::from_bits(a.load(Ordering::Acquire))
}

fn add_f64(a: &AtomicU64, delta: f64) {
    let mut cur = a.load(Ordering::Acquire);
    loop {
        let next = (f64::from_bits(cur) + delta).to_bits();
        match a.compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return,
            Err(actual) => cur = actual,
        }
    }
}

pub struct RiskManager {
    limits: Limits,
    disabled: AtomicBool,
    clock: Arc<dyn Clock>,
    market_data: Option<Arc<MarketDataManager>>,
    msg_throttle: Throttle,
    security_throttles: DashMap<SecurityId, Throttle, ahash::RandomState>,
    exposures: DashMap<SecurityId, Exposure, ahash::RandomState>,
    // sum of |net_value| over securities
    total_value: AtomicU64,
    total_turnover: AtomicU64,
}

impl RiskManager {
    pub fn new(limits: Limits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            disabled: AtomicBool::new(false),
            clock,
            market_data: None,
            msg_throttle: Throttle::new(),
            security_throttles: DashMap::with_hasher(ahash::RandomState::new()),
            exposures: DashMap::with_hasher(ahash::RandomState::new()),
            total_value: AtomicU64::new(0f64.to_bits()),
            total_turnover: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Lets market orders be priced from the store (read-only lookups).
    pub fn with_market_data(mut self, md: Arc<MarketDataManager>) -> Self {
        self.market_data = Some(md);
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Bypasses every check for the rest of the process. There is no
    /// re-enable.
    pub fn disable(&self) {
        if !self.disabled.swap(true, Ordering::AcqRel) {
            warn!("risk gate disabled, all orders will pass");
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Full admission check: quantity, value, cumulative exposure and
    /// message rates. Message-rate counters advance only when it passes.
    pub fn check(&self, ord: &Order) -> bool {
        if self.is_disabled() {
            return true;
        }
        metrics::counter!("mdgate_risk_checks_total").increment(1);
        let bucket = self.clock.now_secs();
        let verdict = self
            .check_order(ord)
            .and_then(|_| self.acquire_rates(ord.security.id, bucket));
        self.settle(ord, verdict)
    }

    /// Flood protection only: global and per-security message rates.
    pub fn check_msg_rate(&self, ord: &Order) -> bool {
        if self.is_disabled() {
            return true;
        }
        let bucket = self.clock.now_secs();
        let verdict = self.acquire_rates(ord.security.id, bucket);
        self.settle(ord, verdict)
    }

    fn settle(&self, ord: &Order, verdict: Result<(), RiskViolation>) -> bool {
        match verdict {
            Ok(()) => true,
            Err(violation) => {
                self.reject(ord, violation);
                false
            }
        }
    }

    fn reject(&self, ord: &Order, violation: RiskViolation) {
        warn!(
            security = %ord.security.id,
            symbol = %ord.security.symbol,
            side = ?ord.side,
            qty = ord.qty,
            price = ord.price,
            reason = %violation,
            "order rejected"
        );
        metrics::counter!("mdgate_risk_rejections_total", "reason" => violation.kind()).increment(1);
        RISK_ERROR.with(|e| *e.borrow_mut() = violation.to_string());
    }

    fn reference_price(&self, ord: &Order) -> f64 {
        if !ord.is_market() {
            return ord.price;
        }
        let Some(md) = &self.market_data else {
            return 0.0;
        };
        let record = md.get_lite(ord.security.id, ord.src);
        let last = record.trade().close;
        if last > 0.0 {
            last
        } else {
            record.mid().unwrap_or(0.0)
        }
    }

    fn check_order(&self, ord: &Order) -> Result<(), RiskViolation> {
        let l = &self.limits;
        if !(ord.qty > 0.0 && ord.qty.is_finite()) {
            return Err(RiskViolation::InvalidQty { qty: ord.qty });
        }
        if l.order_qty > 0.0 && ord.qty > l.order_qty {
            return Err(RiskViolation::OrderQty { qty: ord.qty, limit: l.order_qty });
        }

        let value = ord.value_at(self.reference_price(ord));
        if l.order_value > 0.0 && value > l.order_value {
            return Err(RiskViolation::OrderValue { value, limit: l.order_value });
        }

        let exp = self.exposure(ord.security.id);
        let net_after = exp.net_value + ord.side.sign() * value;
        if l.value > 0.0 && net_after.abs() > l.value {
            return Err(RiskViolation::Value { value: net_after.abs(), limit: l.value });
        }
        let turnover_after = exp.turnover + value;
        if l.turnover > 0.0 && turnover_after > l.turnover {
            return Err(RiskViolation::Turnover { turnover: turnover_after, limit: l.turnover });
        }

        let total = self.total_exposure();
        let total_value_after = total.net_value - exp.net_value.abs() + net_after.abs();
        if l.total_value > 0.0 && total_value_after > l.total_value {
            return Err(RiskViolation::TotalValue { value: total_value_after, limit: l.total_value });
        }
        let total_turnover_after = total.turnover + value;
        if l.total_turnover > 0.0 && total_turnover_after > l.total_turnover {
            return Err(RiskViolation::TotalTurnover { turnover: total_turnover_after, limit: l.total_turnover });
        }
        Ok(())
    }

    // Takes a slot in each enabled throttle or in none of them.
    fn acquire_rates(&self, id: SecurityId, bucket: i64) -> Result<(), RiskViolation> {
        let l = &self.limits;
        let global = l.msg_rate > 0.0;
        if global {
            self.msg_throttle
                .try_acquire(bucket, rate_limit(l.msg_rate))
                .map_err(|rate| RiskViolation::MsgRate { rate, limit: l.msg_rate })?;
        }
        if l.msg_rate_per_security > 0.0 {
            let throttle = match self.security_throttles.get(&id) {
                Some(t) => t,
                None => self.security_throttles.entry(id).or_default().downgrade(),
            };
            if let Err(rate) = throttle.try_acquire(bucket, rate_limit(l.msg_rate_per_security)) {
                if global {
                    self.msg_throttle.release(bucket);
                }
                return Err(RiskViolation::SecurityMsgRate { rate, limit: l.msg_rate_per_security });
            }
        }
        Ok(())
    }

    /// Books an execution into the cumulative value/turnover figures.
    pub fn on_fill(&self, ord: &Order, qty: f64, price: f64) {
        let value = (qty * price * ord.security.multiplier).abs();
        let mut exp = self.exposures.entry(ord.security.id).or_default();
        let before = exp.net_value.abs();
        exp.net_value += ord.side.sign() * value;
        exp.turnover += value;
        add_f64(&self.total_value, exp.net_value.abs() - before);
        add_f64(&self.total_turnover, value);
        info!(security = %ord.security.id, side = ?ord.side, qty, price, net_value = exp.net_value, "fill booked");
    }

    pub fn exposure(&self, id: SecurityId) -> Exposure {
        self.exposures.get(&id).map(|e| *e).unwrap_or_default()
    }

    /// `net_value` here is the sum of per-security absolute net values.
    pub fn total_exposure(&self) -> Exposure {
        Exposure {
            net_value: load_f64(&self.total_value),
            turnover: load_f64(&self.total_turnover),
        }
    }
}
