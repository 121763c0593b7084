//! Yahoo v8 chart provider.
//!
//! `GET {base}/v8/finance/chart/{symbol}?period1=..&period2=..&interval=1d`
//!
//! Payload shape (fields we read):
//!
//! ```text
//! {"chart": {"result": [{"meta": {"gmtoffset": -18000},
//!                        "timestamp": [..],
//!                        "indicators": {"quote": [{"close": [.., null, ..]}]}}],
//!            "error": null | {"code": "..", "description": ".."}}}
//! ```
//!
//! Timestamps are session opens in UTC; shifting by `gmtoffset` before taking
//! the date gives the exchange-local trading day. `null` closes are skipped.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::provider::{ChartProvider, ChartRequest, ProviderError};
use crate::series::{ChartSeries, PricePoint};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; pfl/0.1)";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Yahoo-backed daily close provider. No API key.
#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_options(DEFAULT_BASE_URL, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ProviderError> {
        Self::with_options(base_url, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn with_options(
        base_url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ProviderError::Config(format!(
                "chart base url must be http(s): '{base_url}'"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::Config(format!("http client build failed: {e}")))?;
        Ok(Self { http, base_url })
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, encode_symbol(symbol))
    }
}

#[async_trait::async_trait]
impl ChartProvider for YahooChartProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily(&self, req: &ChartRequest) -> Result<ChartSeries, ProviderError> {
        let period1 = epoch_at_midnight(req.window.start);
        // period2 is exclusive; include the whole end day.
        let period2 = epoch_at_midnight(req.window.end) + 86_400;

        let resp = self
            .http
            .get(self.chart_url(&req.symbol))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            // Yahoo reports unknown symbols as 404 with a JSON error body.
            return Err(match serde_json::from_slice::<ChartEnvelope>(&body) {
                Ok(env) => match env.chart.error {
                    Some(e) => e.into_provider_error(),
                    None => ProviderError::Http {
                        status: status.as_u16(),
                    },
                },
                Err(_) => ProviderError::Http {
                    status: status.as_u16(),
                },
            });
        }

        decode_chart(&body, &req.symbol)
    }
}

/// Decode a chart payload into a series filed under `symbol`.
pub fn decode_chart(body: &[u8], symbol: &str) -> Result<ChartSeries, ProviderError> {
    let env: ChartEnvelope = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Decode(format!("chart payload for {symbol}: {e}")))?;

    if let Some(e) = env.chart.error {
        return Err(e.into_provider_error());
    }

    let result = env
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::Empty {
            symbol: symbol.to_string(),
        })?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    if result.timestamp.len() != closes.len() {
        return Err(ProviderError::Decode(format!(
            "{symbol}: {} timestamps but {} closes",
            result.timestamp.len(),
            closes.len()
        )));
    }

    let offset = result.meta.gmtoffset;
    let points = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts.checked_add(offset)?, 0)?.date_naive();
            Some(PricePoint::new(date, close?))
        });

    let series = ChartSeries::new(symbol, points);
    if series.is_empty() {
        return Err(ProviderError::Empty {
            symbol: symbol.to_string(),
        });
    }
    Ok(series)
}

fn epoch_at_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

// Index symbols (`^GSPC`) and FX pairs (`EURUSD=X`) carry characters that must
// be escaped in a path segment.
fn encode_symbol(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for b in symbol.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_' | b'=') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

// -----------------
// Wire types
// -----------------

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ChartError {
    fn into_provider_error(self) -> ProviderError {
        ProviderError::Api {
            code: self.code,
            message: self.description.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// -----------------
// Tests (no network)
// -----------------
