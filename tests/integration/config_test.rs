//! Configuration loading tests

use poly_lock::config::{Config, ExecutionMode};
use poly_lock::market::Asset;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_config_example_loads() {
    let config = Config::load("config.toml.example").unwrap();
    assert_eq!(config.market.assets, vec![Asset::Btc, Asset::Sol, Asset::Xrp]);
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.risk.caps_for(Asset::Btc).max_shares, dec!(300));
    assert_eq!(config.risk.caps_for(Asset::Xrp).max_shares, dec!(200));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [market]
        assets = ["XRP"]

        [strategy]
        endgame_secs = 20
    "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.market.assets, vec![Asset::Xrp]);
    assert_eq!(config.strategy.endgame_secs, 20);
    assert_eq!(config.strategy.entry_size, dec!(5));
    assert_eq!(config.guardrail.obi_threshold, -0.30);
}

#[test]
fn test_live_mode_fails_validation() {
    let config: Config = toml::from_str("[execution]\nmode = \"live\"").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_config_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[market\nassets = 3").unwrap();
    assert!(Config::load(file.path()).is_err());
}
