// =============================================================================
// Snapshot Assembler — latest indicator values for the signal generator
// =============================================================================
//
// Runs every indicator over a candle series and keeps only the most recent
// value of each. The JSON shape of `MarketSnapshot` is matched on by
// external consumers, so its field names (`currentPrice`, `ema20`,
// `bollingerBands`, ...) must not change even when the EMA periods are
// reconfigured.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IndicatorError;
use crate::indicators::{
    bollinger, calculate_bollinger_bands, calculate_ema, calculate_macd, calculate_rsi,
    calculate_vwap, macd,
};
use crate::types::CandleSeries;

// =============================================================================
// Parameters
// =============================================================================

fn default_ema_short() -> usize {
    20
}

fn default_ema_long() -> usize {
    50
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    macd::DEFAULT_FAST
}

fn default_macd_slow() -> usize {
    macd::DEFAULT_SLOW
}

fn default_macd_signal() -> usize {
    macd::DEFAULT_SIGNAL
}

fn default_bb_period() -> usize {
    bollinger::DEFAULT_PERIOD
}

fn default_bb_multiplier() -> f64 {
    bollinger::DEFAULT_MULTIPLIER
}

/// Look-back periods used to build a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Reported as `ema20`.
    #[serde(default = "default_ema_short")]
    pub ema_short: usize,

    /// Reported as `ema50`.
    #[serde(default = "default_ema_long")]
    pub ema_long: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    #[serde(default = "default_bb_multiplier")]
    pub bb_multiplier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_short: default_ema_short(),
            ema_long: default_ema_long(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bb_period: default_bb_period(),
            bb_multiplier: default_bb_multiplier(),
        }
    }
}

impl IndicatorParams {
    /// Shortest candle series for which every indicator can be computed.
    pub fn min_candles(&self) -> usize {
        [
            self.ema_short,
            self.ema_long,
            self.rsi_period + 1,
            macd::min_len(self.macd_slow, self.macd_signal),
            self.bb_period,
            1,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }

    pub fn validate(&self) -> Result<(), IndicatorError> {
        let periods = [
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bb_period", self.bb_period),
        ];
        for (name, p) in periods {
            if p == 0 {
                return Err(IndicatorError::invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(IndicatorError::invalid(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !self.bb_multiplier.is_finite() || self.bb_multiplier < 0.0 {
            return Err(IndicatorError::invalid("bb_multiplier must be finite and non-negative"));
        }
        Ok(())
    }
}

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSnapshot {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerSnapshot {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Latest value of every indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub ema20: f64,
    pub ema50: f64,
    pub rsi: f64,
    pub macd: MacdSnapshot,
    pub bollinger_bands: BollingerSnapshot,
    pub vwap: f64,
}

impl IndicatorSnapshot {
    /// Every value, flattened, for finiteness checks.
    pub fn values(&self) -> [f64; 10] {
        [
            self.ema20,
            self.ema50,
            self.rsi,
            self.macd.macd,
            self.macd.signal,
            self.macd.histogram,
            self.bollinger_bands.upper,
            self.bollinger_bands.middle,
            self.bollinger_bands.lower,
            self.vwap,
        ]
    }
}

/// Point-in-time projection handed to the signal generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: String,
    pub current_price: f64,
    #[serde(default)]
    pub price_change_24h: f64,
    pub indicators: IndicatorSnapshot,
}

impl MarketSnapshot {
    /// Attach the 24h price change (percent).
    pub fn with_price_change_24h(mut self, pct: f64) -> Self {
        self.price_change_24h = pct;
        self
    }

    /// Ensure no field carries NaN / infinity into a prompt.
    pub fn ensure_finite(&self) -> Result<(), IndicatorError> {
        if !self.current_price.is_finite() || !self.price_change_24h.is_finite() {
            return Err(IndicatorError::data_quality("snapshot price fields must be finite"));
        }
        if self.indicators.values().iter().any(|v| !v.is_finite()) {
            return Err(IndicatorError::data_quality("snapshot indicators must be finite"));
        }
        Ok(())
    }
}

// =============================================================================
// Assembler
// =============================================================================

/// Builds `MarketSnapshot`s with a fixed set of indicator parameters.
#[derive(Debug, Clone, Default)]
pub struct SnapshotAssembler {
    params: IndicatorParams,
}

impl SnapshotAssembler {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Compute every indicator over `series` and keep the latest values.
    ///
    /// Any indicator failure propagates unchanged; the caller decides whether
    /// to re-query with a longer look-back window.
    pub fn assemble(
        &self,
        series: &CandleSeries,
        current_price: f64,
        symbol: &str,
    ) -> Result<MarketSnapshot, IndicatorError> {
        if symbol.trim().is_empty() {
            return Err(IndicatorError::invalid("symbol must not be empty"));
        }
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(IndicatorError::data_quality(format!(
                "current price must be a positive finite number, got {current_price}"
            )));
        }

        // Report candle counts, not the length of an intermediate series.
        let required = self.params.min_candles();
        if series.len() < required {
            return Err(IndicatorError::insufficient("snapshot", required, series.len()));
        }

        let p = &self.params;
        let closes = series.closes();

        let ema20 = latest("ema", calculate_ema(&closes, p.ema_short)?)?;
        let ema50 = latest("ema", calculate_ema(&closes, p.ema_long)?)?;
        let rsi = latest("rsi", calculate_rsi(&closes, p.rsi_period)?)?;

        let m = calculate_macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal)?;
        let macd = MacdSnapshot {
            macd: latest_of("macd", m.macd.last())?,
            signal: latest_of("macd", m.signal.last())?,
            histogram: latest_of("macd", m.histogram.last())?,
        };

        let bb = calculate_bollinger_bands(&closes, p.bb_period, p.bb_multiplier)?;
        let (upper, middle, lower) = bb
            .last()
            .ok_or_else(|| IndicatorError::insufficient("bollinger", p.bb_period, 0))?;

        let vwap = latest(
            "vwap",
            calculate_vwap(&series.highs(), &series.lows(), &closes, &series.volumes())?,
        )?;

        debug!(
            symbol,
            candles = series.len(),
            ema20,
            ema50,
            rsi,
            vwap,
            "market snapshot assembled"
        );

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            current_price,
            price_change_24h: 0.0,
            indicators: IndicatorSnapshot {
                ema20,
                ema50,
                rsi,
                macd,
                bollinger_bands: BollingerSnapshot {
                    upper,
                    middle,
                    lower,
                },
                vwap,
            },
        })
    }
}

/// Build a snapshot with the default indicator parameters
/// (EMA 20/50, RSI 14, MACD 12/26/9, Bollinger 20/2).
pub fn build_snapshot(
    series: &CandleSeries,
    current_price: f64,
    symbol: &str,
) -> Result<MarketSnapshot, IndicatorError> {
    SnapshotAssembler::default().assemble(series, current_price, symbol)
}

fn latest(indicator: &'static str, series: Vec<f64>) -> Result<f64, IndicatorError> {
    latest_of(indicator, series.last().copied())
}

fn latest_of(indicator: &'static str, value: Option<f64>) -> Result<f64, IndicatorError> {
    value.ok_or_else(|| IndicatorError::insufficient(indicator, 1, 0))
}
