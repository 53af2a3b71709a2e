// =============================================================================
// MACD — Moving Average Convergence Divergence
// =============================================================================
//
//   macd line = EMA(fast) - EMA(slow)
//   signal    = EMA(macd line, signal_period)
//   histogram = macd line - signal
//
// All three series are `AlignedSeries` in the input's index space, so the
// subtraction steps are offset-aware zips rather than manual slicing.
// =============================================================================

use super::ema::ema_aligned;
use super::{ensure_period, AlignedSeries};
use crate::error::IndicatorError;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// MACD line, signal line and histogram.
///
/// `signal` and `histogram` cover the same index range; `macd` starts
/// `signal_period - 1` points earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdResult {
    pub macd: AlignedSeries,
    pub signal: AlignedSeries,
    pub histogram: AlignedSeries,
}

/// Minimum input length for a MACD with the given periods.
pub fn min_len(slow: usize, signal_period: usize) -> usize {
    slow + signal_period - 1
}

/// Compute MACD for `values`.
///
/// # Errors
/// - any period zero, or `fast >= slow` => `InvalidArgument`
/// - input shorter than `slow`, or the MACD line shorter than
///   `signal_period` => `InsufficientData` from the inner EMA
pub fn calculate_macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdResult, IndicatorError> {
    ensure_period("macd fast", fast)?;
    ensure_period("macd slow", slow)?;
    ensure_period("macd signal", signal_period)?;
    if fast >= slow {
        return Err(IndicatorError::invalid(format!(
            "macd fast period {fast} must be shorter than slow period {slow}"
        )));
    }

    let input = AlignedSeries::new(0, values.to_vec());
    let ema_fast = ema_aligned(&input, fast)?;
    let ema_slow = ema_aligned(&input, slow)?;

    let macd = ema_fast.zip_with(&ema_slow, |f, s| f - s);
    let signal = ema_aligned(&macd, signal_period)?;
    let histogram = macd.zip_with(&signal, |m, s| m - s);

    Ok(MacdResult {
        macd,
        signal,
        histogram,
    })
}

/// MACD with the conventional 12 / 26 / 9 periods.
pub fn calculate_macd_default(values: &[f64]) -> Result<MacdResult, IndicatorError> {
    calculate_macd(values, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_ema;

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn macd_lengths_and_offsets() {
        let values = wave(60);
        let r = calculate_macd_default(&values).unwrap();
        // macd line: 60 - 26 + 1 = 35; signal: 35 - 9 + 1 = 27
        assert_eq!(r.macd.len(), 35);
        assert_eq!(r.macd.start(), 25);
        assert_eq!(r.signal.len(), 27);
        assert_eq!(r.signal.start(), 33);
        assert_eq!(r.histogram.len(), r.signal.len());
        assert_eq!(r.histogram.start(), r.signal.start());
    }

    #[test]
    fn macd_line_matches_manual_ema_difference() {
        let values = wave(50);
        let r = calculate_macd_default(&values).unwrap();
        let e12 = calculate_ema(&values, 12).unwrap();
        let e26 = calculate_ema(&values, 26).unwrap();
        let offset = 26 - 12;
        for (i, &m) in r.macd.values().iter().enumerate() {
            assert!((m - (e12[i + offset] - e26[i])).abs() < 1e-12);
        }
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let values = wave(120);
        let r = calculate_macd_default(&values).unwrap();
        let offset = r.macd.len() - r.signal.len();
        for (i, (&h, &s)) in r
            .histogram
            .values()
            .iter()
            .zip(r.signal.values())
            .enumerate()
        {
            assert!((h + s - r.macd.values()[i + offset]).abs() < 1e-9);
        }
    }

    #[test]
    fn macd_minimum_length() {
        let values = wave(min_len(26, 9));
        let r = calculate_macd_default(&values).unwrap();
        assert_eq!(r.signal.len(), 1);

        let err = calculate_macd_default(&values[..33]).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData { indicator: "ema", required: 9, available: 8 }
        ));
    }

    #[test]
    fn macd_too_short_for_slow_ema() {
        let err = calculate_macd_default(&wave(20)).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData { required: 26, available: 20, .. }
        ));
    }

    #[test]
    fn macd_rejects_inverted_periods() {
        let values = wave(60);
        assert!(matches!(
            calculate_macd(&values, 26, 12, 9),
            Err(IndicatorError::InvalidArgument { .. })
        ));
        assert!(matches!(
            calculate_macd(&values, 12, 26, 0),
            Err(IndicatorError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn macd_flat_input_is_zero() {
        let r = calculate_macd_default(&[42.0; 40]).unwrap();
        assert!(r.macd.values().iter().all(|v| v.abs() < 1e-12));
        assert!(r.histogram.values().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn macd_repeated_calls_agree() {
        let values = wave(80);
        assert_eq!(
            calculate_macd_default(&values).unwrap(),
            calculate_macd_default(&values).unwrap()
        );
    }
}
