use thiserror::Error;

use crate::market_data::data_src::DataSrc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSrcError {
    #[error("source name {0:?} is longer than {max} bytes", max = DataSrc::MAX_LEN)]
    TooLong(String),
    #[error("source name {0:?} contains non-ASCII or NUL bytes")]
    InvalidByte(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketDataError {
    #[error("derived slot {id} out of range (max {max})")]
    DerivedSlotOutOfRange { id: usize, max: usize },
    #[error("depth level {level} out of range (depth size {depth})")]
    LevelOutOfRange { level: usize, depth: usize },
    #[error("adapter {adapter} was built with a map not owned by this manager for source {src}")]
    ForeignMap { adapter: String, src: DataSrc },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config load failed: {0}")]
    Load(#[from] config::ConfigError),
    #[error("adapter {adapter}: invalid source: {source}")]
    InvalidSource {
        adapter: String,
        #[source]
        source: DataSrcError,
    },
}

/// Why the risk gate refused an order. The `Display` text is the reason
/// exposed through `risk::last_rejection`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskViolation {
    #[error("invalid order quantity {qty}")]
    InvalidQty { qty: f64 },
    #[error("order quantity {qty} exceeds limit {limit}")]
    OrderQty { qty: f64, limit: f64 },
    #[error("order value {value} exceeds limit {limit}")]
    OrderValue { value: f64, limit: f64 },
    #[error("security value {value} would exceed limit {limit}")]
    Value { value: f64, limit: f64 },
    #[error("security turnover {turnover} would exceed limit {limit}")]
    Turnover { turnover: f64, limit: f64 },
    #[error("total value {value} would exceed limit {limit}")]
    TotalValue { value: f64, limit: f64 },
    #[error("total turnover {turnover} would exceed limit {limit}")]
    TotalTurnover { turnover: f64, limit: f64 },
    #[error("message rate {rate}/s reached limit {limit}")]
    MsgRate { rate: u32, limit: f64 },
    #[error("security message rate {rate}/s reached limit {limit}")]
    SecurityMsgRate { rate: u32, limit: f64 },
}

impl RiskViolation {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskViolation::InvalidQty { .. } => "invalid_qty",
            RiskViolation::OrderQty { .. } => "order_qty",
            RiskViolation::OrderValue { .. } => "order_value",
            RiskViolation::Value { .. } => "value",
            RiskViolation::Turnover { .. } => "turnover",
            RiskViolation::TotalValue { .. } => "total_value",
            RiskViolation::TotalTurnover { .. } => "total_turnover",
            RiskViolation::MsgRate { .. } => "msg_rate",
            RiskViolation::SecurityMsgRate { .. } => "msg_rate_per_security",
        }
    }
}
