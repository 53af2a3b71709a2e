// =============================================================================
// Shared types used across the signal desk
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;

/// A single OHLCV candle. `time` is the candle open time in epoch ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `(high + low + close) / 3`, the price VWAP weights by volume.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Chronologically ordered, validated candle sequence (oldest first).
///
/// Construction rejects duplicate or decreasing timestamps, non-finite
/// prices, and negative volume. The indicator engine never reorders its
/// input, so ordering is enforced once here.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from candles already in ascending time order.
    pub fn new(candles: Vec<Candle>) -> Result<Self, IndicatorError> {
        for (i, c) in candles.iter().enumerate() {
            let fields = [c.open, c.high, c.low, c.close, c.volume];
            if fields.iter().any(|v| !v.is_finite()) {
                return Err(IndicatorError::data_quality(format!(
                    "candle at {} has a non-finite field",
                    c.time
                )));
            }
            if c.volume < 0.0 {
                return Err(IndicatorError::data_quality(format!(
                    "candle at {} has negative volume {}",
                    c.time, c.volume
                )));
            }
            if i > 0 && candles[i - 1].time >= c.time {
                return Err(IndicatorError::data_quality(format!(
                    "timestamps not strictly increasing: {} followed by {}",
                    candles[i - 1].time,
                    c.time
                )));
            }
        }
        Ok(Self { candles })
    }

    /// Build a series from an exchange payload that lists the newest candle
    /// first (Bybit's kline order).
    pub fn from_newest_first(mut candles: Vec<Candle>) -> Result<Self, IndicatorError> {
        candles.reverse();
        Self::new(candles)
    }

    /// Build a series from `[time, open, high, low, close, volume]` rows.
    ///
    /// The time column must hold whole milliseconds.
    pub fn from_rows(rows: &[[f64; 6]]) -> Result<Self, IndicatorError> {
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let t = r[0];
                if !t.is_finite() || t.fract() != 0.0 || t.abs() > i64::MAX as f64 {
                    return Err(IndicatorError::data_quality(format!(
                        "row {i} has invalid timestamp {t}"
                    )));
                }
                Ok(Candle::new(t as i64, r[1], r[2], r[3], r[4], r[5]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(candles)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The most recent `count` candles, oldest first.
    pub fn tail(&self, count: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(count);
        &self.candles[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// Directional verdict returned by the signal generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Default for Signal {
    fn default() -> Self {
        Self::Hold
    }
}

impl Signal {
    /// Case-insensitive parse of a free-form label (`"buy"`, `" SELL "`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "HOLD" => Some(Self::Hold),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// Broad market classification reported alongside a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCondition {
    Bullish,
    Bearish,
    Ranging,
}

impl Default for MarketCondition {
    fn default() -> Self {
        Self::Ranging
    }
}

impl MarketCondition {
    /// Case-insensitive parse; anything unrecognised is `Ranging`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "bullish" => Self::Bullish,
            "bearish" => Self::Bearish,
            _ => Self::Ranging,
        }
    }
}

impl std::fmt::Display for MarketCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
            Self::Ranging => write!(f, "Ranging"),
        }
    }
}
