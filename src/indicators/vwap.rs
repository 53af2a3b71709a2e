// =============================================================================
// Volume-Weighted Average Price (VWAP) — cumulative
// =============================================================================
//
//   typical_t = (high_t + low_t + close_t) / 3
//   VWAP_t    = Σ typical_i * volume_i / Σ volume_i   for i in 0..=t
//
// The sums run from the first candle; there is no window. One output value
// per input candle. A prefix with zero cumulative volume has no defined
// VWAP and is reported as a data-quality error instead of NaN.
// =============================================================================

use super::ensure_finite;
use crate::error::IndicatorError;

/// Compute the cumulative VWAP series.
///
/// # Errors
/// - input slices of different lengths => `InvalidArgument`
/// - empty input => `InsufficientData`
/// - non-finite values, negative volume, zero cumulative volume, or an
///   overflowing running sum at any index => `DataQuality`
pub fn calculate_vwap(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
) -> Result<Vec<f64>, IndicatorError> {
    let n = closes.len();
    if highs.len() != n || lows.len() != n || volumes.len() != n {
        return Err(IndicatorError::invalid(format!(
            "vwap inputs differ in length: highs={}, lows={}, closes={}, volumes={}",
            highs.len(),
            lows.len(),
            n,
            volumes.len()
        )));
    }
    if n == 0 {
        return Err(IndicatorError::insufficient("vwap", 1, 0));
    }
    ensure_finite("vwap highs", highs)?;
    ensure_finite("vwap lows", lows)?;
    ensure_finite("vwap closes", closes)?;
    ensure_finite("vwap volumes", volumes)?;

    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        let volume = volumes[i];
        if volume < 0.0 {
            return Err(IndicatorError::data_quality(format!(
                "vwap volume at index {i} is negative ({volume})"
            )));
        }
        let typical = (highs[i] + lows[i] + closes[i]) / 3.0;
        cum_pv += typical * volume;
        cum_vol += volume;
        if cum_vol == 0.0 {
            return Err(IndicatorError::data_quality(format!(
                "vwap undefined at index {i}: no traded volume yet"
            )));
        }
        let vwap = cum_pv / cum_vol;
        if !vwap.is_finite() {
            return Err(IndicatorError::data_quality(format!(
                "vwap overflowed at index {i}"
            )));
        }
        out.push(vwap);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_candle_equals_typical_price() {
        let v = calculate_vwap(&[12.0], &[6.0], &[9.0], &[3.0]).unwrap();
        assert_eq!(v, vec![9.0]);
    }

    #[test]
    fn one_value_per_candle() {
        let n = 17;
        let highs = vec![11.0; n];
        let lows = vec![9.0; n];
        let closes = vec![10.0; n];
        let volumes = vec![1.0; n];
        assert_eq!(calculate_vwap(&highs, &lows, &closes, &volumes).unwrap().len(), n);
    }

    #[test]
    fn weights_by_volume() {
        // typical prices 10 and 20, volumes 1 and 3 => (10 + 60) / 4
        let v = calculate_vwap(&[10.0, 20.0], &[10.0, 20.0], &[10.0, 20.0], &[1.0, 3.0]).unwrap();
        assert!((v[0] - 10.0).abs() < 1e-12);
        assert!((v[1] - 17.5).abs() < 1e-12);
    }

    #[test]
    fn repeated_candle_contracts_toward_its_typical_price() {
        // Start at typical 10, then feed a typical-20 candle twice.
        let highs = [10.0, 20.0, 20.0];
        let lows = [10.0, 20.0, 20.0];
        let closes = [10.0, 20.0, 20.0];
        let volumes = [5.0, 2.0, 2.0];
        let v = calculate_vwap(&highs, &lows, &closes, &volumes).unwrap();
        assert!(v[1] > v[0]);
        assert!(v[2] > v[1]);
        assert!((20.0 - v[2]) < (20.0 - v[1]));
        assert!(v[2] < 20.0);
    }

    #[test]
    fn leading_zero_volume_is_data_quality_error() {
        let err = calculate_vwap(&[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0], &[0.0, 5.0]).unwrap_err();
        assert!(matches!(err, IndicatorError::DataQuality { .. }));
    }

    #[test]
    fn later_zero_volume_keeps_previous_vwap() {
        let v = calculate_vwap(&[10.0, 50.0], &[10.0, 50.0], &[10.0, 50.0], &[4.0, 0.0]).unwrap();
        assert_eq!(v[1], v[0]);
    }

    #[test]
    fn mismatched_lengths_are_invalid() {
        let err = calculate_vwap(&[1.0], &[1.0, 2.0], &[1.0], &[1.0]).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidArgument { .. }));
    }

    #[test]
    fn empty_input_is_insufficient() {
        let err = calculate_vwap(&[], &[], &[], &[]).unwrap_err();
        assert!(matches!(err, IndicatorError::InsufficientData { .. }));
    }

    #[test]
    fn negative_volume_is_rejected() {
        let err = calculate_vwap(&[1.0], &[1.0], &[1.0], &[-2.0]).unwrap_err();
        assert!(matches!(err, IndicatorError::DataQuality { .. }));
    }

    #[test]
    fn overflowing_sums_are_data_quality_errors() {
        let big = [f64::MAX, f64::MAX];
        let err = calculate_vwap(&big, &big, &big, &[2.0, 2.0]).unwrap_err();
        assert!(matches!(err, IndicatorError::DataQuality { .. }));
    }

    #[test]
    fn repeated_calls_agree() {
        let highs = [11.0, 12.5, 13.0, 12.0];
        let lows = [9.0, 10.5, 11.0, 10.0];
        let closes = [10.0, 12.0, 12.5, 11.0];
        let volumes = [3.0, 0.0, 7.5, 2.0];
        let a = calculate_vwap(&highs, &lows, &closes, &volumes).unwrap();
        let b = calculate_vwap(&highs, &lows, &closes, &volumes).unwrap();
        assert_eq!(a, b);
    }
}
