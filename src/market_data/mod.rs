// =============================================================================
// Market Data — candle and ticker retrieval
// =============================================================================

pub mod bybit;
pub mod retry;

pub use bybit::BybitClient;
pub use retry::RetryPolicy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MarketDataError;
use crate::types::CandleSeries;

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_interval() -> String {
    "15".to_string()
}

fn default_limit() -> u32 {
    100
}

/// Parameters of a candle fetch, as sent by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataRequest {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Exchange interval code: minutes ("1", "5", "15", ...) or "D".
    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for MarketDataRequest {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            interval: default_interval(),
            limit: default_limit(),
        }
    }
}

impl MarketDataRequest {
    /// Check the request against the configured allow-lists and limit cap.
    pub fn validate(
        &self,
        allowed_symbols: &[String],
        allowed_intervals: &[String],
        max_limit: u32,
    ) -> Result<(), MarketDataError> {
        if !allowed_symbols.iter().any(|s| s == &self.symbol) {
            return Err(MarketDataError::InvalidRequest {
                reason: format!("invalid symbol {}", self.symbol),
            });
        }
        if !allowed_intervals.iter().any(|i| i == &self.interval) {
            return Err(MarketDataError::InvalidRequest {
                reason: format!("invalid interval {}", self.interval),
            });
        }
        if self.limit < 1 || self.limit > max_limit {
            return Err(MarketDataError::InvalidRequest {
                reason: format!("limit must be 1-{max_limit}, got {}", self.limit),
            });
        }
        Ok(())
    }
}

/// 24h ticker statistics for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub last_price: f64,
    /// Percent, already scaled from the exchange's fraction.
    pub price_change_24h: f64,
    pub volume_24h: f64,
}

/// Candles plus ticker for one request.
#[derive(Debug, Clone)]
pub struct MarketFeed {
    pub candles: CandleSeries,
    pub ticker: Ticker,
}

/// Source of candle history and ticker data.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(&self, request: &MarketDataRequest) -> Result<MarketFeed, MarketDataError>;
}
