//! Layered configuration: optional file, then `MDGATE__*` environment
//! variables (e.g. `MDGATE__LIMITS__ORDER_QTY=100`).

use serde::Deserialize;

use crate::error::ConfigError;
use crate::market_data::data_src::DataSrc;
use crate::risk::limits::Limits;
use crate::security::{ExchangeId, Security};

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub name: String,
    /// Source tag, at most four ASCII bytes.
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub markets: Vec<ExchangeId>,
}

impl AdapterConfig {
    pub fn data_src(&self) -> Result<DataSrc, ConfigError> {
        DataSrc::encode(&self.src).map_err(|source| ConfigError::InvalidSource {
            adapter: self.name.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub tick_ms: u64,
    pub order_interval_ms: u64,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { tick_ms: 50, order_interval_ms: 20, seed: 42 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub limits: Limits,
    /// Name of the adapter used for `DataSrc::DEFAULT`; first one if empty.
    pub default_adapter: String,
    pub adapters: Vec<AdapterConfig>,
    pub securities: Vec<Security>,
    pub demo: DemoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            limits: Limits {
                msg_rate: 100.0,
                msg_rate_per_security: 20.0,
                order_qty: 1_000.0,
                order_value: 100_000.0,
                ..Limits::default()
            },
            default_adapter: String::new(),
            adapters: vec![
                AdapterConfig { name: "sim-a".into(), src: "SIMA".into(), markets: vec![ExchangeId(1)] },
                AdapterConfig { name: "sim-b".into(), src: "SIMB".into(), markets: vec![ExchangeId(2)] },
            ],
            securities: vec![
                Security::new(1, 1, "AAA"),
                Security::new(2, 1, "BBB"),
                Security::new(3, 2, "CCC"),
            ],
            demo: DemoConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("MDGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::finish(settings)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()?;
        Self::finish(settings)
    }

    fn finish(settings: config::Config) -> Result<Self, ConfigError> {
        let cfg: AppConfig = settings.try_deserialize()?;
        for adapter in &cfg.adapters {
            adapter.data_src()?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.limits.order_qty, 1_000.0);
        assert_eq!(cfg.adapters[0].data_src().unwrap().name(), "SIMA");
        assert_eq!(cfg.securities.len(), 3);
    }

    #[test]
    fn test_from_toml() {
        let cfg = AppConfig::from_toml(
            r#"
            default_adapter = "ib"

            [limits]
            order_qty = 100
            msg_rate = 5.5

            [[adapters]]
            name = "ib"
            src = "IB"
            markets = [1, 3]

            [[securities]]
            id = 10
            exchange = 3
            symbol = "ES"
            multiplier = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.limits.order_qty, 100.0);
        assert_eq!(cfg.limits.msg_rate, 5.5);
        assert_eq!(cfg.limits.order_value, 0.0);
        assert_eq!(cfg.default_adapter, "ib");
        assert_eq!(cfg.adapters[0].data_src().unwrap(), DataSrc::encode("IB").unwrap());
        assert_eq!(cfg.adapters[0].markets, vec![ExchangeId(1), ExchangeId(3)]);
        assert_eq!(cfg.securities[0].multiplier, 50.0);
        assert_eq!(cfg.demo.tick_ms, 50);
    }

    #[test]
    fn test_bad_source_name() {
        let err = AppConfig::from_toml(
            r#"
            [[adapters]]
            name = "reuters"
            src = "REUTERS"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource { .. }));
    }
}
