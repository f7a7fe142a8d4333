//! Configuration types for poly-lock

use crate::execution::ExecutionError;
use crate::feed::{ReturnWindows, BINANCE_API_URL};
use crate::guardrail::GuardrailConfig;
use crate::market::{Asset, DEFAULT_WINDOW_SECS, GAMMA_API_URL};
use crate::orderbook::CLOB_API_URL;
use crate::risk::RiskConfig;
use crate::signal::{LeaderConfig, ObiConfig, RegimeConfig, ScoreConfig};
use crate::strategy::StrategyConfig;
use crate::telemetry::LogFormat;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Example configuration shipped with the crate, used when no file is found
pub const EXAMPLE_CONFIG: &str = include_str!("../config.toml.example");

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Traded assets and venue endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_assets")]
    pub assets: Vec<Asset>,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_assets() -> Vec<Asset> {
    vec![Asset::Btc, Asset::Sol, Asset::Xrp]
}
fn default_window_secs() -> i64 {
    DEFAULT_WINDOW_SECS
}
fn default_gamma_url() -> String {
    GAMMA_API_URL.to_string()
}
fn default_clob_url() -> String {
    CLOB_API_URL.to_string()
}
fn default_request_timeout_ms() -> u64 {
    3000
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            window_secs: default_window_secs(),
            gamma_url: default_gamma_url(),
            clob_url: default_clob_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl MarketConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Upstream spot feed feeding the score engine
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_binance_url")]
    pub binance_url: String,
    /// Seconds between score refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub returns: ReturnWindows,
}

fn default_binance_url() -> String {
    BINANCE_API_URL.to_string()
}
fn default_refresh_interval_secs() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            binance_url: default_binance_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
            returns: ReturnWindows::default(),
        }
    }
}

/// Leader tracking and order book imbalance
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub leader: LeaderConfig,
    #[serde(default)]
    pub obi: ObiConfig,
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Starting paper balance (USD)
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    /// Taker fee rate charged by the paper exchange
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Tick cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on every external call inside a tick
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_initial_balance() -> Decimal {
    dec!(1000)
}
fn default_fee_rate() -> Decimal {
    dec!(0.02)
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_call_timeout_ms() -> u64 {
    2000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            initial_balance: default_initial_balance(),
            fee_rate: default_fee_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms.max(1))
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_true")]
    pub snapshots_enabled: bool,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
}

fn default_true() -> bool {
    true
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/snapshot.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            snapshots_enabled: true,
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`, or the bundled example when it does not exist
    pub fn load_or_example(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        tracing::warn!(path = %path.display(), "Config not found, using bundled example");
        Ok(toml::from_str(EXAMPLE_CONFIG)?)
    }

    /// Reject settings the process cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.execution.mode == ExecutionMode::Live {
            return Err(ExecutionError::LiveUnsupported.into());
        }
        if self.market.assets.is_empty() {
            anyhow::bail!("market.assets must name at least one asset");
        }
        if self.market.window_secs <= 0 {
            anyhow::bail!("market.window_secs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [market]
            assets = ["BTC", "SOL"]
            window_secs = 900

            [upstream]
            refresh_interval_secs = 15

            [upstream.returns]
            micro = 3
            macro = 45

            [guardrail]
            obi_threshold = -0.25

            [strategy]
            entry_size = 10
            ladder_offsets = [0.01, 0.03]

            [risk]
            max_pair_cost = 0.98

            [risk.default_caps]
            max_shares = 100

            [risk.caps.BTC]
            max_shares = 400
            max_notional = 200
            max_open_orders = 6

            [execution]
            mode = "paper"
            initial_balance = 500.0

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.market.assets, vec![Asset::Btc, Asset::Sol]);
        assert_eq!(config.upstream.refresh_interval_secs, 15);
        assert_eq!(config.upstream.returns.micro, 3);
        assert_eq!(config.upstream.returns.macro_, 45);
        assert_eq!(config.upstream.returns.meso, 15);
        assert_eq!(config.guardrail.obi_threshold, -0.25);
        assert_eq!(config.strategy.entry_size, dec!(10));
        assert_eq!(config.strategy.ladder_offsets, vec![dec!(0.01), dec!(0.03)]);
        assert_eq!(config.risk.max_pair_cost, dec!(0.98));
        assert_eq!(config.risk.default_caps.max_shares, dec!(100));
        assert_eq!(config.risk.caps_for(Asset::Btc).max_shares, dec!(400));
        assert_eq!(config.risk.caps_for(Asset::Sol).max_shares, dec!(100));
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.execution.initial_balance, dec!(500));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.market.assets, vec![Asset::Btc, Asset::Sol, Asset::Xrp]);
        assert_eq!(config.market.window_secs, 900);
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.strategy.max_recovery_shares, dec!(50));
        assert_eq!(config.signal.leader.confirm_ticks, 2);
        assert_eq!(config.signal.obi.window_secs, 90);
        assert!(config.telemetry.metrics_port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_execution_mode_live_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [execution]
            mode = "live"
        "#,
        )
        .unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Live);
        let err = config.validate().unwrap_err();
        assert!(err.downcast_ref::<ExecutionError>().is_some());
    }

    #[test]
    fn test_bundled_example_parses() {
        let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.market.assets.is_empty());
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_example_falls_back() {
        let config = Config::load_or_example("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config.execution.mode, ExecutionMode::Paper);
    }

    #[test]
    fn test_timeouts() {
        let config = ExecutionConfig {
            poll_interval_ms: 0,
            ..ExecutionConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.call_timeout(), Duration::from_millis(2000));
    }
}
