// =============================================================================
// API error mapping
// =============================================================================
//
// The only place domain errors and malformed request bodies become HTTP
// responses. Every error body is `{"error": message}`. Insufficient candle
// history is reported as a user-facing "widen your lookback window"
// message; upstream failures become 502 unless they carry their own meaning
// (429 rate limit, 402 payment required).
// =============================================================================

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use crate::error::{IndicatorError, MarketDataError, SignalError};

#[derive(Debug)]
pub enum ApiError {
    /// Body was not JSON, or did not match the request type.
    Body(JsonRejection),
    Indicator(IndicatorError),
    MarketData(MarketDataError),
    Signal(SignalError),
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::Body(e)
    }
}

impl From<IndicatorError> for ApiError {
    fn from(e: IndicatorError) -> Self {
        Self::Indicator(e)
    }
}

impl From<MarketDataError> for ApiError {
    fn from(e: MarketDataError) -> Self {
        match e {
            MarketDataError::Data(inner) => Self::Indicator(inner),
            other => Self::MarketData(other),
        }
    }
}

impl From<SignalError> for ApiError {
    fn from(e: SignalError) -> Self {
        Self::Signal(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Indicator(e) => match e {
                IndicatorError::InsufficientData { .. } | IndicatorError::DataQuality { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                IndicatorError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            },
            Self::MarketData(e) => match e {
                MarketDataError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                MarketDataError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                MarketDataError::Data(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Signal(e) => match e {
                SignalError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                SignalError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
                SignalError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                SignalError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Body(rejection) => format!("Invalid request body: {}", rejection.body_text()),
            Self::Indicator(IndicatorError::InsufficientData {
                required, available, ..
            }) => format!(
                "insufficient history, widen your lookback window (need at least {required} candles, got {available})"
            ),
            Self::Indicator(e) => e.to_string(),
            Self::MarketData(e) => e.to_string(),
            Self::Signal(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "request rejected");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
