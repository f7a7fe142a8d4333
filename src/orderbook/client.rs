//! Polymarket CLOB REST client for prices and order books

use super::{OrderBook, PriceLevel, PriceSource};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Polymarket CLOB REST base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Configuration for the CLOB client
#[derive(Debug, Clone)]
pub struct ClobConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            base_url: CLOB_API_URL.to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// REST client for token prices and books
pub struct ClobClient {
    config: ClobConfig,
    client: Client,
}

impl ClobClient {
    pub fn with_config(config: ClobConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl PriceSource for ClobClient {
    async fn get_price(&self, token_id: &str) -> anyhow::Result<Decimal> {
        let url = format!("{}/price", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id), ("side", "buy")])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("CLOB price error: {}", response.status());
        }

        let body: PriceResponse = response.json().await?;
        parse_price(&body.price)
    }

    async fn get_order_book(&self, token_id: &str) -> anyhow::Result<OrderBook> {
        let url = format!("{}/book", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("CLOB book error: {}", response.status());
        }

        let body: BookResponse = response.json().await?;
        Ok(book_response_to_orderbook(token_id, body))
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

/// Order book snapshot from the REST API
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    bids: Vec<BookLevel>,
    #[serde(default)]
    asks: Vec<BookLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Price level in the order book
#[derive(Debug, Deserialize)]
struct BookLevel {
    price: String,
    size: String,
}

fn parse_price(raw: &str) -> anyhow::Result<Decimal> {
    let price = Decimal::from_str(raw)
        .map_err(|e| anyhow::anyhow!("Invalid price {:?}: {}", raw, e))?;
    if price < Decimal::ZERO || price > Decimal::ONE {
        anyhow::bail!("Price out of range: {}", price);
    }
    Ok(price)
}

fn parse_levels(levels: Vec<BookLevel>) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|level| {
            let price = Decimal::from_str(&level.price).ok()?;
            let size = Decimal::from_str(&level.size).ok()?;
            Some(PriceLevel { price, size })
        })
        .collect()
}

/// Convert a REST book to our OrderBook, sorted best first
fn book_response_to_orderbook(token_id: &str, book: BookResponse) -> OrderBook {
    let mut bids = parse_levels(book.bids);
    let mut asks = parse_levels(book.asks);
    bids.sort_by(|a, b| b.price.cmp(&a.price));
    asks.sort_by(|a, b| a.price.cmp(&b.price));

    let updated_at = book
        .timestamp
        .as_deref()
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or_else(Utc::now);

    OrderBook {
        token_id: token_id.to_string(),
        bids,
        asks,
        updated_at,
    }
}
