//! Gamma API venue resolver
//!
//! Resolves the up/down market for an asset's current window by its
//! deterministic event slug, e.g. `btc-updown-15m-1767638700`.

use super::{Asset, VenueResolver, Window, WindowMarket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the Gamma resolver
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Client for Polymarket's Gamma API
pub struct GammaResolver {
    config: GammaConfig,
    client: Client,
}

impl GammaResolver {
    /// Create a resolver with custom configuration
    pub fn with_config(config: GammaConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Event slug for an asset's window
    pub fn slug_for(asset: Asset, window: &Window) -> String {
        format!(
            "{}-updown-{}m-{}",
            asset.slug_prefix(),
            window.duration_secs / 60,
            window.id()
        )
    }
}

#[async_trait]
impl VenueResolver for GammaResolver {
    async fn resolve_window_market(
        &self,
        asset: Asset,
        window: &Window,
    ) -> anyhow::Result<Option<WindowMarket>> {
        let slug = Self::slug_for(asset, window);
        let url = format!("{}/markets", self.config.base_url);

        tracing::debug!(%asset, slug = %slug, "Resolving window market");

        let response = self
            .client
            .get(&url)
            .query(&[("slug", slug.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gamma API error: {} - {}", status, body);
        }

        let markets: Vec<GammaMarket> = response.json().await?;
        let Some(market) = markets.into_iter().find(|m| !m.closed) else {
            return Ok(None);
        };

        convert_to_market(asset, window, slug, market).map(Some)
    }
}

/// Raw market response from Gamma API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    condition_id: String,
    /// CLOB token IDs as JSON string
    clob_token_ids: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    closed: bool,
}

fn convert_to_market(
    asset: Asset,
    window: &Window,
    slug: String,
    gamma: GammaMarket,
) -> anyhow::Result<WindowMarket> {
    let token_ids = gamma
        .clob_token_ids
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Missing clobTokenIds"))?;
    let (yes_token_id, no_token_id) = parse_token_ids(token_ids)?;

    let end_time = gamma
        .end_date
        .as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| window.end());

    Ok(WindowMarket {
        asset,
        venue_id: gamma.condition_id,
        slug,
        yes_token_id,
        no_token_id,
        window_start: window.start,
        end_time,
    })
}

/// Parse CLOB token IDs from JSON string
///
/// Format: "[\"token1\", \"token2\"]" where token1 is YES/Up and token2 is NO/Down
fn parse_token_ids(token_ids_str: &str) -> anyhow::Result<(String, String)> {
    let tokens: Vec<String> = serde_json::from_str(token_ids_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse clobTokenIds: {} - {}", token_ids_str, e))?;

    if tokens.len() < 2 {
        anyhow::bail!(
            "Expected 2 token IDs, got {}: {}",
            tokens.len(),
            token_ids_str
        );
    }

    Ok((tokens[0].clone(), tokens[1].clone()))
}
