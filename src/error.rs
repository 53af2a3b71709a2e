// =============================================================================
// Error taxonomy for the indicator engine and its collaborators
// =============================================================================
//
// Indicator functions return `IndicatorError` and never catch their own
// failures. The network collaborators (exchange, signal gateway) have their
// own enums so the API layer can map each failure to a distinct status.
// =============================================================================

use thiserror::Error;

/// Errors raised by the indicator engine and candle ingestion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("insufficient data for {indicator}: need {required} points, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("data quality error: {reason}")]
    DataQuality { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl IndicatorError {
    pub(crate) fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            indicator,
            required,
            available,
        }
    }

    pub(crate) fn data_quality(reason: impl Into<String>) -> Self {
        Self::DataQuality {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Errors raised while fetching candles and ticker data from the exchange.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("invalid market data request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Rate limit exceeded on the exchange. Please try again later.")]
    RateLimited,

    #[error("exchange error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("exchange returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed exchange payload: {reason}")]
    Malformed { reason: String },

    #[error("exchange transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Data(#[from] IndicatorError),
}

impl MarketDataError {
    /// Whether the failure is transient and worth another attempt.
    ///
    /// Malformed payloads and validation failures are fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the hosted signal gateway adapter.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid signal request: {reason}")]
    InvalidRequest { reason: String },

    #[error("signal gateway API key is not configured")]
    MissingApiKey,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Payment required. Please add credits to your workspace.")]
    PaymentRequired,

    #[error("signal gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed gateway payload: {reason}")]
    Malformed { reason: String },

    #[error("signal gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SignalError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
