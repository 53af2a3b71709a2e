// =============================================================================
// Signal — hosted-model trading verdicts
// =============================================================================
//
// The signal generator turns a `MarketSnapshot` (or a chart screenshot) into
// a BUY / SELL / HOLD verdict with price levels. The model itself is an
// external collaborator; this module owns the request validation, prompt,
// reply parsing, and the audit record kept for the dashboard.

pub mod gateway;
pub mod prompt;
pub mod record;

pub use gateway::GatewaySignalGenerator;
pub use record::SignalRecord;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SignalError;
use crate::snapshot::MarketSnapshot;
use crate::types::{MarketCondition, Signal};

/// Longest accepted asset-type label.
pub const MAX_ASSET_TYPE_LEN: usize = 50;

/// Verdict returned by the model, in the field names the dashboard reads.
///
/// Built by `prompt::parse_reply`, which tolerates loosely typed replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDecision {
    pub signal: Signal,
    /// 0–100.
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub market_condition: MarketCondition,
    pub pattern_details: String,
    pub indicators_analysis: String,
    pub ai_commentary: String,
}

impl SignalDecision {
    /// Neutral verdict used when the model reply cannot be parsed: HOLD at
    /// the current price with a ±2% band.
    pub fn neutral(current_price: f64, commentary: impl Into<String>) -> Self {
        let commentary = commentary.into();
        Self {
            signal: Signal::Hold,
            confidence: 50.0,
            entry_price: current_price,
            stop_loss: current_price * 0.98,
            take_profit: current_price * 1.02,
            market_condition: MarketCondition::Ranging,
            pattern_details: "Unable to determine patterns".to_string(),
            indicators_analysis: "Analysis unavailable".to_string(),
            ai_commentary: if commentary.trim().is_empty() {
                "Analysis could not be completed.".to_string()
            } else {
                commentary
            },
        }
    }

    /// Clamp confidence into 0–100.
    pub fn normalised(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 100.0)
        } else {
            50.0
        };
        self
    }
}

/// Verdict for a chart screenshot. The model reads price levels off the
/// image, so they are absent (`null`) when it cannot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartAnalysis {
    pub signal: Signal,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub market_condition: MarketCondition,
    pub pattern_details: String,
    pub indicators_analysis: String,
    pub ai_commentary: String,
}

impl ChartAnalysis {
    /// HOLD with no levels, used when the reply cannot be parsed.
    pub fn unavailable(commentary: impl Into<String>) -> Self {
        let commentary = commentary.into();
        Self {
            signal: Signal::Hold,
            confidence: 50.0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            market_condition: MarketCondition::Ranging,
            pattern_details: "Unable to determine patterns".to_string(),
            indicators_analysis: "Chart analysis unavailable".to_string(),
            ai_commentary: if commentary.trim().is_empty() {
                "Analysis could not be completed.".to_string()
            } else {
                commentary
            },
        }
    }
}

fn validate_asset_type(asset_type: &str) -> Result<(), SignalError> {
    let asset_type = asset_type.trim();
    if asset_type.is_empty() || asset_type.len() > MAX_ASSET_TYPE_LEN {
        return Err(SignalError::InvalidRequest {
            reason: "Invalid asset type".to_string(),
        });
    }
    Ok(())
}

/// Validate the inputs of a signal request before anything is sent upstream.
pub fn validate_request(snapshot: &MarketSnapshot, asset_type: &str) -> Result<(), SignalError> {
    validate_asset_type(asset_type)?;
    if snapshot.symbol.trim().is_empty() {
        return Err(SignalError::InvalidRequest {
            reason: "invalid market data: empty symbol".to_string(),
        });
    }
    snapshot
        .ensure_finite()
        .map_err(|e| SignalError::InvalidRequest {
            reason: format!("invalid market data: {e}"),
        })
}

/// Validate a chart-analysis request: an http(s) or inline image URL.
pub fn validate_chart_request(image_url: &str, asset_type: &str) -> Result<(), SignalError> {
    validate_asset_type(asset_type)?;
    let url = image_url.trim();
    let supported = ["https://", "http://", "data:image/"]
        .iter()
        .any(|scheme| url.starts_with(scheme));
    if !supported || url.len() <= "https://".len() {
        return Err(SignalError::InvalidRequest {
            reason: "Invalid image URL".to_string(),
        });
    }
    Ok(())
}

/// Produces trading verdicts from indicator snapshots or chart images.
#[async_trait]
pub trait SignalGenerator: Send + Sync {
    async fn generate_signal(
        &self,
        snapshot: &MarketSnapshot,
        asset_type: &str,
    ) -> Result<SignalDecision, SignalError>;

    async fn analyze_chart(
        &self,
        image_url: &str,
        asset_type: &str,
    ) -> Result<ChartAnalysis, SignalError>;
}
