// =============================================================================
// Signal Record — auditable record of every generated signal
// =============================================================================
//
// Each verdict returned to the dashboard is captured together with the
// snapshot it was derived from, so recent signals can be reviewed without a
// database.
// =============================================================================

use serde::Serialize;

use super::SignalDecision;
use crate::snapshot::MarketSnapshot;

/// A generated signal plus the inputs it was derived from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub symbol: String,

    pub asset_type: String,

    pub decision: SignalDecision,

    pub market_data: MarketSnapshot,

    /// ISO 8601 timestamp of when this record was created.
    pub created_at: String,
}

impl SignalRecord {
    pub fn new(
        asset_type: impl Into<String>,
        decision: SignalDecision,
        market_data: MarketSnapshot,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: market_data.symbol.clone(),
            asset_type: asset_type.into(),
            decision,
            market_data,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
