// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The dashboard calls `market-data`
// and `signal` in sequence; `analyze` performs both in one round trip.
// `analyze-chart` asks the model to read a chart screenshot instead.
//
// JSON bodies are extracted as `Result<Json<T>, JsonRejection>` so malformed
// requests go through `ApiError` like every other failure.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::ApiError;
use crate::app_state::AppState;
use crate::market_data::{MarketDataRequest, MarketFeed};
use crate::signal::{
    validate_chart_request, validate_request, ChartAnalysis, SignalDecision, SignalRecord,
};
use crate::snapshot::MarketSnapshot;
use crate::types::Candle;

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/market-data", post(market_data))
        .route("/api/v1/signal", post(signal))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/analyze-chart", post(analyze_chart))
        .route("/api/v1/signals/recent", get(recent_signals))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    uptime_secs: u64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        uptime_secs: state.uptime_secs(),
    })
}

// =============================================================================
// Market data
// =============================================================================

/// Snapshot plus the recent candles and 24h volume, for charting.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataResponse {
    #[serde(flatten)]
    pub snapshot: MarketSnapshot,
    pub interval: String,
    pub candles: Vec<Candle>,
    pub volume_24h: f64,
}

/// Validate, fetch, and assemble the snapshot for one request.
async fn load_market_data(
    state: &AppState,
    request: &MarketDataRequest,
) -> Result<MarketDataResponse, ApiError> {
    let cfg = &state.config;
    request.validate(&cfg.allowed_symbols, &cfg.allowed_intervals, cfg.max_limit)?;

    info!(
        symbol = %request.symbol,
        interval = %request.interval,
        limit = request.limit,
        "fetching market data"
    );

    let MarketFeed { candles, ticker } = state.market_data.fetch(request).await?;
    let snapshot = state
        .assembler
        .assemble(&candles, ticker.last_price, &request.symbol)?
        .with_price_change_24h(ticker.price_change_24h);

    info!(symbol = %snapshot.symbol, candles = candles.len(), "market data fetched");

    Ok(MarketDataResponse {
        snapshot,
        interval: request.interval.clone(),
        candles: candles.tail(cfg.response_candles).to_vec(),
        volume_24h: ticker.volume_24h,
    })
}

async fn market_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MarketDataRequest>, JsonRejection>,
) -> Result<Json<MarketDataResponse>, ApiError> {
    let Json(request) = payload?;
    load_market_data(&state, &request).await.map(Json)
}

// =============================================================================
// Signal
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignalRequest {
    market_data: MarketSnapshot,
    asset_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResponse<M: Serialize> {
    #[serde(flatten)]
    pub decision: SignalDecision,
    pub market_data: M,
}

/// Run the signal generator and record the verdict.
async fn generate_and_record(
    state: &AppState,
    snapshot: &MarketSnapshot,
    asset_type: &str,
) -> Result<SignalDecision, ApiError> {
    validate_request(snapshot, asset_type)?;
    let decision = state
        .signal_generator
        .generate_signal(snapshot, asset_type)
        .await?;
    state.push_signal(SignalRecord::new(asset_type, decision.clone(), snapshot.clone()));
    Ok(decision)
}

async fn signal(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignalRequest>, JsonRejection>,
) -> Result<Json<SignalResponse<MarketSnapshot>>, ApiError> {
    let Json(request) = payload?;
    let decision =
        generate_and_record(&state, &request.market_data, &request.asset_type).await?;
    Ok(Json(SignalResponse {
        decision,
        market_data: request.market_data,
    }))
}

// =============================================================================
// Analyze (market data + signal)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    #[serde(flatten)]
    market: MarketDataRequest,
    asset_type: String,
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<SignalResponse<MarketDataResponse>>, ApiError> {
    let Json(request) = payload?;
    let market = load_market_data(&state, &request.market).await?;
    let decision = generate_and_record(&state, &market.snapshot, &request.asset_type).await?;
    Ok(Json(SignalResponse {
        decision,
        market_data: market,
    }))
}

// =============================================================================
// Chart screenshot analysis
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartRequest {
    image_url: String,
    asset_type: String,
}

async fn analyze_chart(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChartRequest>, JsonRejection>,
) -> Result<Json<ChartAnalysis>, ApiError> {
    let Json(request) = payload?;
    validate_chart_request(&request.image_url, &request.asset_type)?;
    info!(asset_type = %request.asset_type, "analyzing chart");
    let analysis = state
        .signal_generator
        .analyze_chart(&request.image_url, &request.asset_type)
        .await?;
    Ok(Json(analysis))
}

// =============================================================================
// Recent signals
// =============================================================================

async fn recent_signals(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.recent_signals())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::error::{MarketDataError, SignalError};
    use crate::market_data::{MarketDataSource, Ticker};
    use crate::runtime_config::RuntimeConfig;
    use crate::signal::SignalGenerator;
    use crate::types::{CandleSeries, MarketCondition, Signal};

    /// Market source that serves the last `limit` candles of a fixed series.
    pub(crate) struct StubMarket {
        candles: Vec<Candle>,
        rate_limited: bool,
    }

    impl StubMarket {
        pub(crate) fn rising(n: usize) -> Self {
            let candles = (0..n)
                .map(|i| {
                    let close = 100.0 + i as f64 + (i as f64 * 0.7).sin();
                    Candle::new(
                        i as i64 * 900_000,
                        close - 0.5,
                        close + 1.0,
                        close - 1.0,
                        close,
                        5.0 + i as f64,
                    )
                })
                .collect();
            Self {
                candles,
                rate_limited: false,
            }
        }

        fn rate_limited() -> Self {
            Self {
                candles: Vec::new(),
                rate_limited: true,
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for StubMarket {
        async fn fetch(&self, request: &MarketDataRequest) -> Result<MarketFeed, MarketDataError> {
            if self.rate_limited {
                return Err(MarketDataError::RateLimited);
            }
            let start = self.candles.len().saturating_sub(request.limit as usize);
            let candles = CandleSeries::new(self.candles[start..].to_vec())?;
            let last_price = candles.last().map(|c| c.close).unwrap_or(1.0);
            Ok(MarketFeed {
                candles,
                ticker: Ticker {
                    last_price,
                    price_change_24h: 2.5,
                    volume_24h: 1_000.0,
                },
            })
        }
    }

    /// Signal generator that always answers (BUY for snapshots, SELL for
    /// charts), or always fails with 402.
    pub(crate) struct StubSignals {
        payment_required: bool,
    }

    impl StubSignals {
        pub(crate) fn ok() -> Self {
            Self {
                payment_required: false,
            }
        }

        fn payment_required() -> Self {
            Self {
                payment_required: true,
            }
        }
    }

    #[async_trait]
    impl SignalGenerator for StubSignals {
        async fn analyze_chart(
            &self,
            _image_url: &str,
            _asset_type: &str,
        ) -> Result<ChartAnalysis, SignalError> {
            if self.payment_required {
                return Err(SignalError::PaymentRequired);
            }
            Ok(ChartAnalysis {
                signal: Signal::Sell,
                confidence: 70.0,
                entry_price: Some(1.2345),
                stop_loss: None,
                take_profit: None,
                market_condition: MarketCondition::Bearish,
                pattern_details: "Double Top".into(),
                indicators_analysis: "RSI divergence".into(),
                ai_commentary: "Reversal likely".into(),
            })
        }

        async fn generate_signal(
            &self,
            snapshot: &MarketSnapshot,
            _asset_type: &str,
        ) -> Result<SignalDecision, SignalError> {
            if self.payment_required {
                return Err(SignalError::PaymentRequired);
            }
            Ok(SignalDecision {
                signal: Signal::Buy,
                confidence: 80.0,
                entry_price: snapshot.current_price,
                stop_loss: snapshot.current_price * 0.98,
                take_profit: snapshot.current_price * 1.03,
                market_condition: MarketCondition::Bullish,
                pattern_details: "Higher highs".into(),
                indicators_analysis: "EMA20 above EMA50".into(),
                ai_commentary: "Trend continuation".into(),
            })
        }
    }

    fn app_with(market: StubMarket, signals: StubSignals) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            RuntimeConfig::default(),
            Arc::new(market),
            Arc::new(signals),
        ));
        (router(state.clone()), state)
    }

    fn app() -> (Router, Arc<AppState>) {
        app_with(StubMarket::rising(200), StubSignals::ok())
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn snapshot_json() -> Value {
        let (router, _) = app();
        let (_, body) = send(router, "POST", "/api/v1/market-data", Some(json!({}))).await;
        json!({
            "symbol": body["symbol"],
            "currentPrice": body["currentPrice"],
            "priceChange24h": body["priceChange24h"],
            "indicators": body["indicators"],
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (router, _) = app();
        let (status, body) = send(router, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["stateVersion"].is_u64());
    }

    #[tokio::test]
    async fn market_data_returns_snapshot_and_candles() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/market-data",
            Some(json!({ "symbol": "ETHUSDT", "interval": "60", "limit": 100 })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "ETHUSDT");
        assert_eq!(body["interval"], "60");
        assert_eq!(body["priceChange24h"], 2.5);
        assert_eq!(body["volume24h"], 1000.0);
        assert_eq!(body["candles"].as_array().map(Vec::len), Some(50));
        assert!(body["indicators"]["ema50"].is_number());
        assert!(body["indicators"]["macd"]["histogram"].is_number());
        assert!(body["indicators"]["bollingerBands"]["middle"].is_number());
        let rsi = body["indicators"]["rsi"].as_f64().unwrap();
        assert!((0.0..=100.0).contains(&rsi));
    }

    #[tokio::test]
    async fn short_history_asks_to_widen_window() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/market-data",
            Some(json!({ "limit": 30 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("widen your lookback window"));
    }

    #[tokio::test]
    async fn invalid_symbol_is_bad_request() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/market-data",
            Some(json!({ "symbol": "FOOBAR" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid symbol"));
    }

    #[tokio::test]
    async fn exchange_rate_limit_is_429() {
        let (router, _) = app_with(StubMarket::rate_limited(), StubSignals::ok());
        let (status, _) = send(router, "POST", "/api/v1/market-data", Some(json!({}))).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn signal_echoes_market_data_and_records() {
        let snapshot = snapshot_json().await;
        let (router, state) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/signal",
            Some(json!({ "marketData": snapshot, "assetType": "crypto" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signal"], "BUY");
        assert_eq!(body["market_condition"], "Bullish");
        assert_eq!(body["marketData"]["symbol"], "BTCUSDT");
        assert_eq!(state.recent_signals().len(), 1);
    }

    #[tokio::test]
    async fn signal_rejects_blank_asset_type() {
        let snapshot = snapshot_json().await;
        let (router, state) = app();
        let (status, _) = send(
            router,
            "POST",
            "/api/v1/signal",
            Some(json!({ "marketData": snapshot, "assetType": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.recent_signals().is_empty());
    }

    #[tokio::test]
    async fn payment_required_is_passed_through() {
        let snapshot = snapshot_json().await;
        let (router, _) = app_with(StubMarket::rising(200), StubSignals::payment_required());
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/signal",
            Some(json!({ "marketData": snapshot, "assetType": "crypto" })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert!(body["error"].as_str().unwrap().contains("Payment required"));
    }

    #[tokio::test]
    async fn analyze_runs_full_pipeline() {
        let (router, state) = app();
        let (status, body) = send(
            router.clone(),
            "POST",
            "/api/v1/analyze",
            Some(json!({ "symbol": "SOLUSDT", "interval": "5", "assetType": "crypto" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signal"], "BUY");
        assert_eq!(body["marketData"]["symbol"], "SOLUSDT");
        assert_eq!(body["marketData"]["interval"], "5");
        assert!(body["marketData"]["indicators"]["vwap"].is_number());

        let (status, recent) = send(router, "GET", "/api/v1/signals/recent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(recent.as_array().map(Vec::len), Some(1));
        assert_eq!(recent[0]["symbol"], "SOLUSDT");
        assert_eq!(state.recent_signals().len(), 1);
    }

    #[tokio::test]
    async fn signal_without_asset_type_is_json_bad_request() {
        let snapshot = snapshot_json().await;
        let (router, state) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/signal",
            Some(json!({ "marketData": snapshot })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
        assert!(state.recent_signals().is_empty());
    }

    #[tokio::test]
    async fn analyze_without_asset_type_is_json_bad_request() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/analyze",
            Some(json!({ "symbol": "BTCUSDT" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("assetType"));
    }

    #[tokio::test]
    async fn unparseable_body_is_json_bad_request() {
        let (router, _) = app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/market-data")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn analyze_chart_returns_optional_levels() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/analyze-chart",
            Some(json!({ "imageUrl": "https://example.com/chart.png", "assetType": "forex" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["signal"], "SELL");
        assert_eq!(body["entry_price"], 1.2345);
        assert!(body["stop_loss"].is_null());
        assert_eq!(body["pattern_details"], "Double Top");
    }

    #[tokio::test]
    async fn analyze_chart_rejects_bad_image_url() {
        let (router, _) = app();
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/analyze-chart",
            Some(json!({ "imageUrl": "chart.png", "assetType": "forex" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid image URL"));
    }

    #[tokio::test]
    async fn analyze_chart_passes_payment_required_through() {
        let (router, _) = app_with(StubMarket::rising(200), StubSignals::payment_required());
        let (status, _) = send(
            router,
            "POST",
            "/api/v1/analyze-chart",
            Some(json!({ "imageUrl": "https://example.com/chart.png", "assetType": "crypto" })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }
}
