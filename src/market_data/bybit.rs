// =============================================================================
// Bybit v5 REST client — public spot market data
// =============================================================================
//
// Only unauthenticated endpoints are used:
//   GET /v5/market/kline    — candle history, newest candle first
//   GET /v5/market/tickers  — last price and 24h statistics
//
// Bybit wraps every payload in `{ retCode, retMsg, result }` and encodes
// numbers as strings. A non-zero retCode is an API error; 10006 means the
// IP is rate limited and is retried like an HTTP 429.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{MarketDataRequest, MarketDataSource, MarketFeed, RetryPolicy, Ticker};
use crate::error::MarketDataError;
use crate::types::{Candle, CandleSeries};

/// Bybit's "too many visits" return code.
const RET_CODE_RATE_LIMITED: i64 = 10006;

/// Bybit REST client for spot klines and tickers.
#[derive(Clone)]
pub struct BybitClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl BybitClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build exchange HTTP client")?;

        debug!(base_url = %base_url, "BybitClient initialised");

        Ok(Self {
            base_url,
            client,
            retry,
        })
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /v5/market/kline — returns candles oldest first.
    #[instrument(skip(self), name = "bybit::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<CandleSeries, MarketDataError> {
        let limit = limit.to_string();
        let query = [
            ("category", "spot"),
            ("symbol", symbol),
            ("interval", interval),
            ("limit", limit.as_str()),
        ];
        let body = self
            .retry
            .run("bybit::kline", MarketDataError::is_retryable, || {
                self.get_json("/v5/market/kline", &query)
            })
            .await?;

        let series = parse_klines(&body)?;
        debug!(symbol, interval, count = series.len(), "klines fetched");
        Ok(series)
    }

    /// GET /v5/market/tickers for a single symbol.
    #[instrument(skip(self), name = "bybit::get_ticker")]
    pub async fn get_ticker(&self, symbol: &str) -> Result<Ticker, MarketDataError> {
        let query = [("category", "spot"), ("symbol", symbol)];
        let body = self
            .retry
            .run("bybit::tickers", MarketDataError::is_retryable, || {
                self.get_json("/v5/market/tickers", &query)
            })
            .await?;

        let ticker = parse_ticker(&body)?;
        debug!(symbol, last_price = ticker.last_price, "ticker fetched");
        Ok(ticker)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).query(query).send().await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(MarketDataError::RateLimited);
        }
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(MarketDataError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| MarketDataError::malformed(format!("{path}: {e}")))?;
        check_ret_code(&body)?;
        Ok(body)
    }
}

impl std::fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

#[async_trait]
impl MarketDataSource for BybitClient {
    async fn fetch(&self, request: &MarketDataRequest) -> Result<MarketFeed, MarketDataError> {
        let (candles, ticker) = tokio::try_join!(
            self.get_klines(&request.symbol, &request.interval, request.limit),
            self.get_ticker(&request.symbol),
        )?;
        Ok(MarketFeed { candles, ticker })
    }
}

// =============================================================================
// Payload parsing
// =============================================================================

fn check_ret_code(body: &Value) -> Result<(), MarketDataError> {
    let code = body["retCode"]
        .as_i64()
        .ok_or_else(|| MarketDataError::malformed("missing retCode"))?;
    match code {
        0 => Ok(()),
        RET_CODE_RATE_LIMITED => Err(MarketDataError::RateLimited),
        _ => Err(MarketDataError::Api {
            code,
            message: body["retMsg"].as_str().unwrap_or_default().to_string(),
        }),
    }
}

/// Parse `result.list` rows `[startTime, open, high, low, close, volume, turnover]`
/// (newest first) into an oldest-first series.
pub(crate) fn parse_klines(body: &Value) -> Result<CandleSeries, MarketDataError> {
    let rows = body["result"]["list"]
        .as_array()
        .ok_or_else(|| MarketDataError::malformed("kline result.list is not an array"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let arr = row
            .as_array()
            .ok_or_else(|| MarketDataError::malformed(format!("kline row {i} is not an array")))?;
        if arr.len() < 6 {
            return Err(MarketDataError::malformed(format!(
                "kline row {i} has {} fields, expected at least 6",
                arr.len()
            )));
        }
        candles.push(Candle::new(
            parse_i64(&arr[0], "startTime")?,
            parse_f64(&arr[1], "open")?,
            parse_f64(&arr[2], "high")?,
            parse_f64(&arr[3], "low")?,
            parse_f64(&arr[4], "close")?,
            parse_f64(&arr[5], "volume")?,
        ));
    }

    Ok(CandleSeries::from_newest_first(candles)?)
}

/// Parse the first entry of `result.list` from the tickers endpoint.
pub(crate) fn parse_ticker(body: &Value) -> Result<Ticker, MarketDataError> {
    let entry = body["result"]["list"]
        .as_array()
        .and_then(|list| list.first())
        .ok_or_else(|| MarketDataError::malformed("ticker result.list is empty"))?;

    Ok(Ticker {
        last_price: parse_f64(&entry["lastPrice"], "lastPrice")?,
        price_change_24h: parse_f64(&entry["price24hPcnt"], "price24hPcnt")? * 100.0,
        volume_24h: parse_f64(&entry["volume24h"], "volume24h")?,
    })
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_f64(val: &Value, name: &str) -> Result<f64, MarketDataError> {
    match val {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| MarketDataError::malformed(format!("failed to parse {name} '{s}' as f64"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MarketDataError::malformed(format!("{name} is not a valid f64"))),
        _ => Err(MarketDataError::malformed(format!("{name} has unexpected JSON type"))),
    }
}

fn parse_i64(val: &Value, name: &str) -> Result<i64, MarketDataError> {
    match val {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| MarketDataError::malformed(format!("failed to parse {name} '{s}' as i64"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| MarketDataError::malformed(format!("{name} is not a valid i64"))),
        _ => Err(MarketDataError::malformed(format!("{name} has unexpected JSON type"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndicatorError;
    use serde_json::json;

    fn kline_body() -> Value {
        json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "spot",
                "symbol": "BTCUSDT",
                "list": [
                    ["1700000120000", "37020.0", "37080.0", "37000.0", "37060.0", "12.5", "463250.0"],
                    ["1700000060000", "37000.0", "37050.0", "36990.0", "37020.0", "10.0", "370200.0"],
                    ["1700000000000", "36950.0", "37010.0", "36940.0", "37000.0", "8.0", "296000.0"]
                ]
            }
        })
    }

    #[test]
    fn klines_are_reversed_to_oldest_first() {
        let series = parse_klines(&kline_body()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.candles()[0].time, 1_700_000_000_000);
        assert_eq!(series.closes(), vec![37000.0, 37020.0, 37060.0]);
        assert_eq!(series.volumes(), vec![8.0, 10.0, 12.5]);
    }

    #[test]
    fn short_kline_row_is_malformed() {
        let body = json!({ "retCode": 0, "result": { "list": [["1700000000000", "1.0"]] } });
        assert!(matches!(parse_klines(&body), Err(MarketDataError::Malformed { .. })));
    }

    #[test]
    fn unparseable_price_is_malformed() {
        let body = json!({
            "retCode": 0,
            "result": { "list": [["1700000000000", "abc", "1", "1", "1", "1"]] }
        });
        assert!(matches!(parse_klines(&body), Err(MarketDataError::Malformed { .. })));
    }

    #[test]
    fn duplicate_kline_timestamps_are_data_errors() {
        let body = json!({
            "retCode": 0,
            "result": { "list": [
                ["1700000000000", "1", "1", "1", "1", "1"],
                ["1700000000000", "1", "1", "1", "1", "1"]
            ] }
        });
        assert!(matches!(
            parse_klines(&body),
            Err(MarketDataError::Data(IndicatorError::DataQuality { .. }))
        ));
    }

    #[test]
    fn ticker_change_is_scaled_to_percent() {
        let body = json!({
            "retCode": 0,
            "result": { "list": [{
                "symbol": "BTCUSDT",
                "lastPrice": "37060.5",
                "price24hPcnt": "0.0125",
                "volume24h": "1234.5"
            }] }
        });
        let t = parse_ticker(&body).unwrap();
        assert_eq!(t.last_price, 37060.5);
        assert!((t.price_change_24h - 1.25).abs() < 1e-12);
        assert_eq!(t.volume_24h, 1234.5);
    }

    #[test]
    fn empty_ticker_list_is_malformed() {
        let body = json!({ "retCode": 0, "result": { "list": [] } });
        assert!(matches!(parse_ticker(&body), Err(MarketDataError::Malformed { .. })));
    }

    #[test]
    fn ret_codes_map_to_errors() {
        assert!(check_ret_code(&json!({ "retCode": 0 })).is_ok());
        assert!(matches!(
            check_ret_code(&json!({ "retCode": 10006, "retMsg": "Too many visits!" })),
            Err(MarketDataError::RateLimited)
        ));
        match check_ret_code(&json!({ "retCode": 10001, "retMsg": "params error" })) {
            Err(MarketDataError::Api { code, message }) => {
                assert_eq!(code, 10001);
                assert_eq!(message, "params error");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(check_ret_code(&json!({})), Err(MarketDataError::Malformed { .. })));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let c = BybitClient::new("https://api.bybit.com/", Duration::from_secs(5), RetryPolicy::none())
            .unwrap();
        assert_eq!(c.base_url, "https://api.bybit.com");
    }
}
