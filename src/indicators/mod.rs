// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators fed to the signal
// generator. Every public function returns `Result<_, IndicatorError>` so
// callers are forced to handle insufficient-data and degenerate-input cases
// instead of receiving NaN.

pub mod aligned;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod vwap;

pub use aligned::AlignedSeries;
pub use bollinger::{calculate_bollinger_bands, BollingerBands};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdResult};
pub use rsi::calculate_rsi;
pub use vwap::calculate_vwap;

use crate::error::IndicatorError;

/// Reject a zero look-back period.
pub(crate) fn ensure_period(indicator: &str, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::invalid(format!(
            "{indicator} period must be greater than zero"
        )));
    }
    Ok(())
}

/// Reject NaN / infinite inputs before they leak into an output series.
pub(crate) fn ensure_finite(indicator: &str, values: &[f64]) -> Result<(), IndicatorError> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(IndicatorError::data_quality(format!(
            "{indicator} input has a non-finite value at index {i}"
        )));
    }
    Ok(())
}
