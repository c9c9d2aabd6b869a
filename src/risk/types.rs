use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::market_data::data_src::DataSrc;
use crate::security::Security;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

// Order as submitted by a strategy, before it reaches the venue
#[derive(Debug, Clone)]
pub struct Order {
    pub security: Arc<Security>,
    pub src: DataSrc,
    pub side: Side,
    pub qty: f64,
    /// 0 for market orders.
    pub price: f64,
}

impl Order {
    pub fn new(security: Arc<Security>, side: Side, qty: f64, price: f64) -> Self {
        Self { security, src: DataSrc::DEFAULT, side, qty, price }
    }

    pub fn with_src(mut self, src: DataSrc) -> Self {
        self.src = src;
        self
    }

    pub fn is_market(&self) -> bool {
        self.price == 0.0
    }

    /// Notional at `price`.
    pub fn value_at(&self, price: f64) -> f64 {
        self.qty * price * self.security.multiplier
    }
}
