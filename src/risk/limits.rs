use serde::{Deserialize, Serialize};

/// Pre-trade thresholds. A zero threshold disables its check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Orders per second, all securities.
    pub msg_rate: f64,
    /// Orders per second, per security.
    pub msg_rate_per_security: f64,
    pub order_qty: f64,
    pub order_value: f64,
    /// Net value per security.
    pub value: f64,
    /// Gross traded value per security.
    pub turnover: f64,
    pub total_value: f64,
    pub total_turnover: f64,
}
