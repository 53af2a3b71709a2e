// =============================================================================
// Relative Strength Index (RSI) — simple windowed averages
// =============================================================================
//
// Step 1 — Per-step gain = max(0, Δ), loss = max(0, -Δ).
// Step 2 — For each window of `period` consecutive gains / losses, take the
//          plain arithmetic mean of each. Every window is recomputed; there
//          is no Wilder smoothing carried between windows.
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// A window with zero average loss saturates at 100, including a perfectly
// flat window.
// =============================================================================

use super::{ensure_finite, ensure_period};
use crate::error::IndicatorError;

/// Compute the RSI series for `values` and `period`.
///
/// Output element `j` corresponds to input index `period + j`; the result
/// has `values.len() - period` elements.
///
/// # Errors
/// - `period == 0` => `InvalidArgument`
/// - `values.len() < period + 1` => `InsufficientData`
/// - any non-finite input => `DataQuality`
pub fn calculate_rsi(values: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    ensure_period("rsi", period)?;
    if values.len() < period + 1 {
        return Err(IndicatorError::insufficient("rsi", period + 1, values.len()));
    }
    ensure_finite("rsi", values)?;

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let period_f = period as f64;
    let result = gains
        .windows(period)
        .zip(losses.windows(period))
        .map(|(g, l)| {
            let avg_gain = g.iter().sum::<f64>() / period_f;
            let avg_loss = l.iter().sum::<f64>() / period_f;
            rsi_from_averages(avg_gain, avg_loss)
        })
        .collect();

    Ok(result)
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
