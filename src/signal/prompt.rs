// =============================================================================
// Prompt construction and reply parsing for the signal gateway
// =============================================================================
//
// Model replies are free-form text wrapping a JSON object whose fields are
// only loosely typed: numbers arrive as strings, labels in any case, price
// levels as `null`. Fields are read one by one so an off-schema value never
// discards the rest of the verdict; only a reply without a parseable JSON
// object falls back to HOLD.
// =============================================================================

use serde_json::{json, Map, Value};
use tracing::warn;

use super::{ChartAnalysis, SignalDecision};
use crate::snapshot::{IndicatorParams, MarketSnapshot};
use crate::types::{MarketCondition, Signal};

pub const USER_PROMPT: &str =
    "Analyze the current market data and generate a trading signal with detailed technical analysis.";

pub const CHART_USER_PROMPT: &str =
    "Analyze this trading chart and provide a comprehensive signal analysis.";

const REPLY_SCHEMA: &str = r#"{
  "signal": "BUY|SELL|HOLD",
  "confidence": 85,
  "entry_price": 43250.50,
  "stop_loss": 42800.00,
  "take_profit": 44100.00,
  "market_condition": "Bullish|Bearish|Ranging",
  "pattern_details": "Description",
  "indicators_analysis": "Detailed analysis",
  "ai_commentary": "Professional reasoning"
}"#;

// =============================================================================
// Indicator snapshot prompt
// =============================================================================

/// System prompt carrying every snapshot value, labelled with the periods
/// that produced it, and the reply schema.
pub fn system_prompt(
    snapshot: &MarketSnapshot,
    asset_type: &str,
    params: &IndicatorParams,
) -> String {
    let ind = &snapshot.indicators;
    format!(
        "You are an expert algorithmic trading analyst specializing in {asset_type} markets. \
Analyze the provided real-time market data and technical indicators to generate a comprehensive trading signal.

Market Data Provided:
- Symbol: {symbol}
- Current Price: {price}
- 24h Change: {change}%
- Technical Indicators:
  * EMA {ema_short}: {ema_short_value}
  * EMA {ema_long}: {ema_long_value}
  * RSI ({rsi_period}): {rsi}
  * MACD ({fast}/{slow}/{signal_period}): {macd}
  * MACD Signal: {macd_signal}
  * MACD Histogram: {macd_hist}
  * Bollinger Upper ({bb_period}, {bb_mult}x): {bb_upper}
  * Bollinger Middle: {bb_middle}
  * Bollinger Lower: {bb_lower}
  * VWAP: {vwap}

Analyze these indicators and provide:
1. Signal: BUY, SELL, or HOLD
2. Confidence: 0-100% based on indicator alignment
3. Entry Price: Optimal entry level
4. Stop Loss: Risk management level
5. Take Profit: Target profit level (use realistic 2-5% moves)
6. Market Condition: Bullish, Bearish, or Ranging
7. Pattern Details: Key technical patterns detected
8. Indicators Analysis: Detailed analysis of each indicator
9. AI Commentary: Professional reasoning for the signal

Consider:
- EMA crossovers (bullish if EMA{ema_short} > EMA{ema_long}, bearish if opposite)
- RSI levels (oversold <30, overbought >70, neutral 30-70)
- MACD signals (bullish if MACD > signal, bearish if opposite)
- Bollinger Bands (price near upper = overbought, near lower = oversold)
- VWAP (price above = bullish, below = bearish)

Format response as JSON:
{REPLY_SCHEMA}",
        symbol = snapshot.symbol,
        price = snapshot.current_price,
        change = snapshot.price_change_24h,
        ema_short = params.ema_short,
        ema_long = params.ema_long,
        ema_short_value = ind.ema20,
        ema_long_value = ind.ema50,
        rsi_period = params.rsi_period,
        rsi = ind.rsi,
        fast = params.macd_fast,
        slow = params.macd_slow,
        signal_period = params.macd_signal,
        macd = ind.macd.macd,
        macd_signal = ind.macd.signal,
        macd_hist = ind.macd.histogram,
        bb_period = params.bb_period,
        bb_mult = params.bb_multiplier,
        bb_upper = ind.bollinger_bands.upper,
        bb_middle = ind.bollinger_bands.middle,
        bb_lower = ind.bollinger_bands.lower,
        vwap = ind.vwap,
    )
}

/// Chat-completions request body for a snapshot verdict.
pub fn request_body(
    model: &str,
    snapshot: &MarketSnapshot,
    asset_type: &str,
    params: &IndicatorParams,
) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt(snapshot, asset_type, params) },
            { "role": "user", "content": USER_PROMPT },
        ],
    })
}

// =============================================================================
// Chart image prompt
// =============================================================================

pub fn chart_system_prompt(asset_type: &str) -> String {
    format!(
        "You are an expert trading analyst specializing in technical analysis for {asset_type} markets. \
Analyze the provided chart image and provide a comprehensive trading signal analysis.

Your analysis must include:
1. Signal: Determine if this is a BUY, SELL, or HOLD opportunity
2. Confidence: Rate your confidence from 0-100%
3. Entry Price: Suggested entry price level
4. Stop Loss: Recommended stop loss level
5. Take Profit: Target profit level
6. Market Condition: Classify as \"Bullish\", \"Bearish\", or \"Ranging\"
7. Pattern Details: Identify chart patterns (e.g., \"Double Top\", \"Head & Shoulders\", \"Triangle\")
8. Indicators Analysis: Analyze visible indicators (RSI, MACD, EMA trends, volume)
9. AI Commentary: Detailed explanation of your analysis and reasoning

Format your response as JSON with this structure:
{REPLY_SCHEMA}"
    )
}

/// Vision request: the user message carries a text part and the image URL.
pub fn chart_request_body(model: &str, image_url: &str, asset_type: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": chart_system_prompt(asset_type) },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": CHART_USER_PROMPT },
                    { "type": "image_url", "image_url": { "url": image_url } },
                ],
            },
        ],
    })
}

// =============================================================================
// Reply parsing
// =============================================================================

/// Extract the outermost `{ ... }` block from free-form model text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// A number, or a string holding one (`"80"`, `"80%"`, `"43,250.5"`).
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .replace(',', "")
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Reply fields after lenient reading; absent or unusable values are `None`.
struct ReplyFields {
    signal: Signal,
    confidence: f64,
    entry_price: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    market_condition: MarketCondition,
    pattern_details: String,
    indicators_analysis: String,
    ai_commentary: String,
}

fn read_reply(reply: &str) -> Result<ReplyFields, String> {
    let json = extract_json_object(reply).ok_or("no JSON object in reply")?;
    let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let obj: &Map<String, Value> = value.as_object().ok_or("reply JSON is not an object")?;
    let field = |key: &str| obj.get(key).filter(|v| !v.is_null());
    let level = |key: &str| lenient_f64(field(key)).filter(|p| *p > 0.0);

    Ok(ReplyFields {
        signal: lenient_text(field("signal"))
            .and_then(|s| Signal::from_label(&s))
            .unwrap_or_default(),
        confidence: lenient_f64(field("confidence"))
            .map(|c| c.clamp(0.0, 100.0))
            .unwrap_or(50.0),
        entry_price: level("entry_price"),
        stop_loss: level("stop_loss"),
        take_profit: level("take_profit"),
        market_condition: lenient_text(field("market_condition"))
            .map(|s| MarketCondition::from_label(&s))
            .unwrap_or_default(),
        pattern_details: lenient_text(field("pattern_details")).unwrap_or_default(),
        indicators_analysis: lenient_text(field("indicators_analysis")).unwrap_or_default(),
        ai_commentary: lenient_text(field("ai_commentary")).unwrap_or_default(),
    })
}

/// Parse a snapshot verdict. Missing levels default to the current price
/// with a ±2% band; a reply with no usable JSON becomes a neutral HOLD.
pub fn parse_reply(reply: &str, current_price: f64) -> SignalDecision {
    match read_reply(reply) {
        Ok(f) => SignalDecision {
            signal: f.signal,
            confidence: f.confidence,
            entry_price: f.entry_price.unwrap_or(current_price),
            stop_loss: f.stop_loss.unwrap_or(current_price * 0.98),
            take_profit: f.take_profit.unwrap_or(current_price * 1.02),
            market_condition: f.market_condition,
            pattern_details: f.pattern_details,
            indicators_analysis: f.indicators_analysis,
            ai_commentary: f.ai_commentary,
        }
        .normalised(),
        Err(reason) => {
            warn!(reason = %reason, "model reply unparseable, falling back to HOLD");
            SignalDecision::neutral(current_price, reply)
        }
    }
}

/// Parse a chart verdict. Levels the model did not give stay `None`.
pub fn parse_chart_reply(reply: &str) -> ChartAnalysis {
    match read_reply(reply) {
        Ok(f) => ChartAnalysis {
            signal: f.signal,
            confidence: f.confidence,
            entry_price: f.entry_price,
            stop_loss: f.stop_loss,
            take_profit: f.take_profit,
            market_condition: f.market_condition,
            pattern_details: f.pattern_details,
            indicators_analysis: f.indicators_analysis,
            ai_commentary: f.ai_commentary,
        },
        Err(reason) => {
            warn!(reason = %reason, "chart reply unparseable, falling back to HOLD");
            ChartAnalysis::unavailable(reply)
        }
    }
}
