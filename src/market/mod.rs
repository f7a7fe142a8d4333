//! Market discovery module
//!
//! Assets, fixed-length windows, and resolution of the tradable up/down
//! market for each asset's current window

mod asset;
mod gamma;
mod window;

pub use asset::Asset;
pub use gamma::{GammaConfig, GammaResolver, GAMMA_API_URL};
pub use window::{Window, DEFAULT_WINDOW_SECS};

use crate::signal::Side;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The binary market for one asset and one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMarket {
    pub asset: Asset,
    /// Venue condition identifier
    pub venue_id: String,
    pub slug: String,
    /// YES / Up token identifier
    pub yes_token_id: String,
    /// NO / Down token identifier
    pub no_token_id: String,
    pub window_start: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl WindowMarket {
    /// Token identifier for an outcome side
    pub fn token_id(&self, side: Side) -> &str {
        match side {
            Side::Yes => &self.yes_token_id,
            Side::No => &self.no_token_id,
        }
    }
}

/// Resolves the tradable market for an asset's window
#[async_trait]
pub trait VenueResolver: Send + Sync {
    /// `Ok(None)` means no tradable venue for this window yet
    async fn resolve_window_market(
        &self,
        asset: Asset,
        window: &Window,
    ) -> anyhow::Result<Option<WindowMarket>>;
}
