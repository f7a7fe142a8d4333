//! Binance REST kline source

use super::CandleSource;
use crate::market::Asset;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Binance REST base URL
pub const BINANCE_API_URL: &str = "https://api.binance.com";

/// 1-minute closes from the Binance klines endpoint
pub struct BinanceKlines {
    base_url: String,
    client: Client,
}

impl BinanceKlines {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl CandleSource for BinanceKlines {
    async fn recent_closes(&self, asset: Asset, limit: usize) -> anyhow::Result<Vec<Decimal>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.clamp(1, 1000).to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", asset.spot_symbol()),
                ("interval", "1m"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance klines error: {} - {}", status, body);
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        parse_closes(&rows)
    }
}

/// Extract close prices (index 4) from kline rows
fn parse_closes(rows: &[Vec<Value>]) -> anyhow::Result<Vec<Decimal>> {
    rows.iter()
        .map(|row| {
            let raw = row
                .get(4)
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Malformed kline row"))?;
            Decimal::from_str(raw).map_err(|e| anyhow::anyhow!("Invalid close {:?}: {}", raw, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_closes() {
        let json = r#"[
            [1767638700000, "100.0", "101.0", "99.0", "100.5", "12.3", 1767638759999],
            [1767638760000, "100.5", "102.0", "100.0", "101.25", "8.1", 1767638819999]
        ]"#;
        let rows: Vec<Vec<Value>> = serde_json::from_str(json).unwrap();
        let closes = parse_closes(&rows).unwrap();
        assert_eq!(closes, vec![dec!(100.5), dec!(101.25)]);
    }

    #[test]
    fn test_parse_closes_malformed() {
        let rows: Vec<Vec<Value>> = serde_json::from_str(r#"[[1, "2"]]"#).unwrap();
        assert!(parse_closes(&rows).is_err());
    }
}
