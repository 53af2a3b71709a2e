// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   k     = 2 / (period + 1)
//   EMA_t = (close_t - EMA_{t-1}) * k + EMA_{t-1}
//
// The very first EMA value is seeded with the SMA of the first `period`
// values, not with an exponentially weighted seed.
// =============================================================================

use super::{ensure_finite, ensure_period, AlignedSeries};
use crate::error::IndicatorError;

/// Compute the EMA series for `values` and look-back `period`.
///
/// Output element `j` corresponds to input index `period - 1 + j`, so the
/// result has `values.len() - period + 1` elements.
///
/// # Errors
/// - `period == 0` => `InvalidArgument`
/// - `values.len() < period` => `InsufficientData`
/// - any non-finite input => `DataQuality`
pub fn calculate_ema(values: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    Ok(ema_aligned(&AlignedSeries::new(0, values.to_vec()), period)?.into_values())
}

/// EMA over an already-aligned series; the result is aligned to the same
/// input index space (`start = series.start() + period - 1`).
pub(crate) fn ema_aligned(
    series: &AlignedSeries,
    period: usize,
) -> Result<AlignedSeries, IndicatorError> {
    ensure_period("ema", period)?;
    let values = series.values();
    if values.len() < period {
        return Err(IndicatorError::insufficient("ema", period, values.len()));
    }
    ensure_finite("ema", values)?;

    let k = 2.0 / (period as f64 + 1.0);

    // Seed: SMA of the first `period` values.
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &v in &values[period..] {
        let next = (v - prev) * k + prev;
        out.push(next);
        prev = next;
    }

    Ok(AlignedSeries::new(series.start() + period - 1, out))
}
