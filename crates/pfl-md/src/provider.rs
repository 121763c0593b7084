//! Provider boundary for daily close series.
//!
//! This module defines **only** the request types, the error type and the
//! provider trait. Concrete providers live beside it (`yahoo.rs`); batch
//! orchestration lives in `fetch.rs`.

use std::fmt;

use chrono::NaiveDate;

use crate::series::ChartSeries;

// ---------------------------------------------------------------------------
// Fetch request
// ---------------------------------------------------------------------------

/// Inclusive date range of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// One symbol over one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    /// Symbol exactly as sent upstream (e.g. `"BRK-B"`).
    pub symbol: String,
    pub window: FetchWindow,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a [`ChartProvider`] implementation may return.
///
/// Every variant is treated the same by the batch fetch: that ticker has no
/// data. The distinction exists for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network or transport failure (including per-request timeouts).
    Transport(String),
    /// Non-2xx response without a decodable error body.
    Http { status: u16 },
    /// The upstream API returned an application-level error.
    Api {
        code: Option<String>,
        message: String,
    },
    /// A response payload could not be decoded.
    Decode(String),
    /// The response decoded but carried no usable closes.
    Empty { symbol: String },
    /// The provider could not be constructed (bad base URL, TLS setup).
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Http { status } => write!(f, "http status {status}"),
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "provider api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "provider api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::Empty { symbol } => write!(f, "no closes returned for {symbol}"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Upstream daily-close provider contract.
///
/// Object-safe so callers can hold a `&dyn ChartProvider`; `Send + Sync` so
/// fetch futures can be driven from any runtime worker.
#[async_trait::async_trait]
pub trait ChartProvider: Send + Sync {
    /// Human-readable name identifying this provider (e.g. `"yahoo"`).
    fn name(&self) -> &'static str;

    /// Fetch daily closes for `req.symbol` over `req.window`.
    ///
    /// The returned series is filed under `req.symbol`. An `Ok` series may be
    /// empty; callers treat that the same as [`ProviderError::Empty`].
    async fn fetch_daily(&self, req: &ChartRequest) -> Result<ChartSeries, ProviderError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
