// =============================================================================
// Signal Desk — library root
// =============================================================================
//
// The indicator engine (`indicators`, `snapshot`, `types`) is usable on its
// own; the remaining modules wire it to the exchange, the model gateway, and
// the HTTP API served by the `signal-desk` binary.
// =============================================================================

pub mod api;
pub mod app_state;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod signal;
pub mod snapshot;
pub mod types;

pub use error::{IndicatorError, MarketDataError, SignalError};
pub use snapshot::{build_snapshot, IndicatorParams, MarketSnapshot, SnapshotAssembler};
pub use types::{Candle, CandleSeries, MarketCondition, Signal};
