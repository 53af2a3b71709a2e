// =============================================================================
// Hosted model gateway — OpenAI-compatible chat completions
// =============================================================================
//
// SECURITY: the API key is read from the environment, sent only as a bearer
// header, and never logged or serialized.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::prompt::{chart_request_body, parse_chart_reply, parse_reply, request_body};
use super::{
    validate_chart_request, validate_request, ChartAnalysis, SignalDecision, SignalGenerator,
};
use crate::error::SignalError;
use crate::market_data::RetryPolicy;
use crate::snapshot::{IndicatorParams, MarketSnapshot};

/// Signal generator backed by a hosted chat-completions gateway.
#[derive(Clone)]
pub struct GatewaySignalGenerator {
    url: String,
    model: String,
    client: Option<reqwest::Client>,
    retry: RetryPolicy,
    /// Periods used to label indicator values in the prompt.
    indicators: IndicatorParams,
}

impl GatewaySignalGenerator {
    /// Build the generator. A missing `api_key` is not fatal at startup;
    /// every signal request then fails with `MissingApiKey`.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = match api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                let mut headers = HeaderMap::new();
                let mut auth = HeaderValue::from_str(&format!("Bearer {key}"))
                    .context("gateway API key is not a valid header value")?;
                auth.set_sensitive(true);
                headers.insert(AUTHORIZATION, auth);

                let client = reqwest::Client::builder()
                    .default_headers(headers)
                    .timeout(timeout)
                    .build()
                    .context("failed to build gateway HTTP client")?;
                Some(client)
            }
            None => {
                warn!("signal gateway API key not configured; signal requests will fail");
                None
            }
        };

        Ok(Self {
            url: url.into(),
            model: model.into(),
            client,
            retry,
            indicators: IndicatorParams::default(),
        })
    }

    /// Label prompt values with the periods the snapshots are built with.
    pub fn with_indicator_params(mut self, params: IndicatorParams) -> Self {
        self.indicators = params;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.client.is_some()
    }

    async fn post_completion(
        &self,
        client: &reqwest::Client,
        body: &Value,
    ) -> Result<Value, SignalError> {
        let resp = client.post(&self.url).json(body).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "signal gateway error");
            return Err(match status.as_u16() {
                429 => SignalError::RateLimited,
                402 => SignalError::PaymentRequired,
                code => SignalError::Status { status: code, body: text },
            });
        }

        resp.json::<Value>().await.map_err(|e| SignalError::Malformed {
            reason: format!("gateway response is not JSON: {e}"),
        })
    }

    /// Send `body` with retries and return the model's reply text.
    async fn complete(&self, label: &str, body: &Value) -> Result<String, SignalError> {
        let client = self.client.as_ref().ok_or(SignalError::MissingApiKey)?;
        let response = self
            .retry
            .run(label, SignalError::is_retryable, || {
                self.post_completion(client, body)
            })
            .await?;

        let reply = reply_content(&response)?;
        debug!(reply_len = reply.len(), "model reply received");
        Ok(reply.to_string())
    }
}

impl std::fmt::Debug for GatewaySignalGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySignalGenerator")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Reply text at `choices[0].message.content`.
pub(crate) fn reply_content(body: &Value) -> Result<&str, SignalError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| SignalError::Malformed {
            reason: "missing choices[0].message.content".to_string(),
        })
}

#[async_trait]
impl SignalGenerator for GatewaySignalGenerator {
    #[instrument(skip(self, snapshot), fields(symbol = %snapshot.symbol), name = "gateway::generate_signal")]
    async fn generate_signal(
        &self,
        snapshot: &MarketSnapshot,
        asset_type: &str,
    ) -> Result<SignalDecision, SignalError> {
        validate_request(snapshot, asset_type)?;

        info!(symbol = %snapshot.symbol, asset_type, "generating signal");
        let body = request_body(&self.model, snapshot, asset_type, &self.indicators);
        let reply = self.complete("gateway::chat_completions", &body).await?;

        let decision = parse_reply(&reply, snapshot.current_price);
        info!(
            symbol = %snapshot.symbol,
            signal = %decision.signal,
            confidence = decision.confidence,
            "signal generated"
        );
        Ok(decision)
    }

    #[instrument(skip(self, image_url), name = "gateway::analyze_chart")]
    async fn analyze_chart(
        &self,
        image_url: &str,
        asset_type: &str,
    ) -> Result<ChartAnalysis, SignalError> {
        validate_chart_request(image_url, asset_type)?;

        info!(asset_type, "analyzing chart");
        let body = chart_request_body(&self.model, image_url.trim(), asset_type);
        let reply = self.complete("gateway::chart_completions", &body).await?;

        let analysis = parse_chart_reply(&reply);
        info!(
            signal = %analysis.signal,
            confidence = analysis.confidence,
            "chart analyzed"
        );
        Ok(analysis)
    }
}
