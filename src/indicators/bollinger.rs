// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). σ is the population standard deviation of
// the window (divisor = period).

use super::{ensure_finite, ensure_period};
use crate::error::IndicatorError;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Upper / middle / lower bands, one triple per full window.
///
/// Element `j` corresponds to input index `period - 1 + j`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn len(&self) -> usize {
        self.middle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }

    /// The most recent `(upper, middle, lower)` triple.
    pub fn last(&self) -> Option<(f64, f64, f64)> {
        Some((
            *self.upper.last()?,
            *self.middle.last()?,
            *self.lower.last()?,
        ))
    }
}

/// Calculate Bollinger Bands over every window of `period` values.
///
/// # Errors
/// - `period == 0`, or a negative / non-finite `multiplier` => `InvalidArgument`
/// - `values.len() < period` => `InsufficientData`
/// - any non-finite input => `DataQuality`
pub fn calculate_bollinger_bands(
    values: &[f64],
    period: usize,
    multiplier: f64,
) -> Result<BollingerBands, IndicatorError> {
    ensure_period("bollinger", period)?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(IndicatorError::invalid(format!(
            "bollinger multiplier must be a finite non-negative number, got {multiplier}"
        )));
    }
    if values.len() < period {
        return Err(IndicatorError::insufficient("bollinger", period, values.len()));
    }
    ensure_finite("bollinger", values)?;

    let period_f = period as f64;
    let count = values.len() - period + 1;
    let mut bands = BollingerBands {
        upper: Vec::with_capacity(count),
        middle: Vec::with_capacity(count),
        lower: Vec::with_capacity(count),
    };

    for window in values.windows(period) {
        let sma = window.iter().sum::<f64>() / period_f;
        let variance = window.iter().map(|x| (x - sma).powi(2)).sum::<f64>() / period_f;
        let sd = variance.sqrt();

        bands.middle.push(sma);
        bands.upper.push(sma + multiplier * sd);
        bands.lower.push(sma - multiplier * sd);
    }

    Ok(bands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let values: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        let bb = calculate_bollinger_bands(&values, 20, 2.0).unwrap();
        assert_eq!(bb.len(), 6);
        for i in 0..bb.len() {
            assert!(bb.upper[i] > bb.middle[i]);
            assert!(bb.lower[i] < bb.middle[i]);
        }
        // first window 1..=20 => mean 10.5
        assert!((bb.middle[0] - 10.5).abs() < 1e-12);
    }

    #[test]
    fn bollinger_uses_population_variance() {
        // window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population sd 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bb = calculate_bollinger_bands(&values, 8, 2.0).unwrap();
        let (upper, middle, lower) = bb.last().unwrap();
        assert!((middle - 5.0).abs() < 1e-12);
        assert!((upper - 9.0).abs() < 1e-12);
        assert!((lower - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bollinger_flat_has_zero_width() {
        let bb = calculate_bollinger_bands(&[5.0; 30], 20, 2.0).unwrap();
        assert_eq!(bb.len(), 11);
        for i in 0..bb.len() {
            assert_eq!(bb.middle[i], 5.0);
            assert_eq!(bb.upper[i], 5.0);
            assert_eq!(bb.lower[i], 5.0);
        }
    }

    #[test]
    fn bollinger_insufficient_data() {
        let err = calculate_bollinger_bands(&[1.0, 2.0, 3.0], 20, 2.0).unwrap_err();
        assert!(matches!(
            err,
            IndicatorError::InsufficientData { indicator: "bollinger", required: 20, available: 3 }
        ));
    }

    #[test]
    fn bollinger_rejects_bad_arguments() {
        let values = [1.0; 25];
        assert!(calculate_bollinger_bands(&values, 0, 2.0).is_err());
        assert!(calculate_bollinger_bands(&values, 20, -1.0).is_err());
        assert!(calculate_bollinger_bands(&values, 20, f64::NAN).is_err());
    }

    #[test]
    fn bollinger_repeated_calls_agree() {
        let values: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.4).cos() * 2.0).collect();
        let a = calculate_bollinger_bands(&values, 20, 2.0).unwrap();
        let b = calculate_bollinger_bands(&values, 20, 2.0).unwrap();
        assert_eq!(a.upper, b.upper);
        assert_eq!(a.middle, b.middle);
        assert_eq!(a.lower, b.lower);
    }
}
