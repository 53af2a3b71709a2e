// =============================================================================
// Runtime Configuration — service settings with atomic save
// =============================================================================
//
// Central configuration for the signal desk: upstream endpoints, request
// allow-lists, retry policy, and indicator periods.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file. Secrets (the gateway API key)
// are never stored here; they come from the environment.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::RetryPolicy;
use crate::snapshot::IndicatorParams;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_exchange_base_url() -> String {
    "https://api.bybit.com".to_string()
}

fn default_gateway_url() -> String {
    "https://ai.gateway.lovable.dev/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_symbols() -> Vec<String> {
    [
        "BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "BNBUSDT", "ADAUSDT", "DOGEUSDT", "MATICUSDT",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_intervals() -> Vec<String> {
    ["1", "5", "15", "30", "60", "240", "D"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_limit() -> u32 {
    500
}

fn default_response_candles() -> usize {
    50
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

fn default_max_recent_signals() -> usize {
    100
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the signal desk.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Server -------------------------------------------------------------

    /// Address the HTTP API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Upstreams ----------------------------------------------------------

    /// Exchange REST base URL (Bybit v5).
    #[serde(default = "default_exchange_base_url")]
    pub exchange_base_url: String,

    /// Chat-completions endpoint of the hosted model gateway.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Model identifier sent to the gateway.
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for exchange requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for gateway requests (model replies are slow).
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,

    /// Backoff applied to rate-limited upstream calls.
    #[serde(default)]
    pub retry: RetryPolicy,

    // --- Request validation -------------------------------------------------

    /// Symbols accepted by the market-data endpoint.
    #[serde(default = "default_symbols")]
    pub allowed_symbols: Vec<String>,

    /// Exchange interval codes accepted by the market-data endpoint.
    #[serde(default = "default_intervals")]
    pub allowed_intervals: Vec<String>,

    /// Upper bound for the candle `limit` of a request.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Number of most recent candles echoed back for charting.
    #[serde(default = "default_response_candles")]
    pub response_candles: usize,

    // --- Indicators ---------------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorParams,

    // --- Audit --------------------------------------------------------------

    /// Size of the in-memory ring of recent signals.
    #[serde(default = "default_max_recent_signals")]
    pub max_recent_signals: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            exchange_base_url: default_exchange_base_url(),
            gateway_url: default_gateway_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
            retry: RetryPolicy::default(),
            allowed_symbols: default_symbols(),
            allowed_intervals: default_intervals(),
            max_limit: default_max_limit(),
            response_candles: default_response_candles(),
            indicators: IndicatorParams::default(),
            max_recent_signals: default_max_recent_signals(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.allowed_symbols,
            bind_addr = %config.bind_addr,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `SIGNAL_DESK_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("SIGNAL_DESK_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
        if let Ok(syms) = std::env::var("SIGNAL_DESK_SYMBOLS") {
            let symbols: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.allowed_symbols = symbols;
            }
        }
        if let Ok(url) = std::env::var("SIGNAL_DESK_EXCHANGE_URL") {
            if !url.trim().is_empty() {
                self.exchange_base_url = url.trim().to_string();
            }
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_symbols.is_empty() {
            bail!("allowed_symbols must not be empty");
        }
        if self.allowed_intervals.is_empty() {
            bail!("allowed_intervals must not be empty");
        }
        if self.max_limit == 0 {
            bail!("max_limit must be greater than zero");
        }
        let min_candles = self.indicators.min_candles();
        if (self.max_limit as usize) < min_candles {
            bail!(
                "max_limit {} cannot cover the {} candles the indicators need",
                self.max_limit,
                min_candles
            );
        }
        self.indicators
            .validate()
            .context("invalid indicator parameters")?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3001");
        assert_eq!(cfg.allowed_symbols.len(), 8);
        assert_eq!(cfg.allowed_symbols[0], "BTCUSDT");
        assert_eq!(cfg.allowed_intervals, vec!["1", "5", "15", "30", "60", "240", "D"]);
        assert_eq!(cfg.max_limit, 500);
        assert_eq!(cfg.response_candles, 50);
        assert_eq!(cfg.indicators, IndicatorParams::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.model, "google/gemini-2.5-flash");
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.indicators.rsi_period, 14);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "allowed_symbols": ["ETHUSDT"], "indicators": { "rsi_period": 21 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.allowed_symbols, vec!["ETHUSDT"]);
        assert_eq!(cfg.indicators.rsi_period, 21);
        assert_eq!(cfg.indicators.ema_long, 50);
        assert_eq!(cfg.max_limit, 500);
    }

    #[test]
    fn validate_rejects_unusable_limits() {
        let cfg = RuntimeConfig {
            max_limit: 30,
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RuntimeConfig {
            allowed_symbols: Vec::new(),
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_indicator_params() {
        let mut cfg = RuntimeConfig::default();
        cfg.indicators.macd_fast = 40;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("signal-desk-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.max_recent_signals = 7;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.max_recent_signals, 7);
        assert!(!path.with_extension("json.tmp").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_is_error() {
        assert!(RuntimeConfig::load("/nonexistent/signal-desk.json").is_err());
    }
}
