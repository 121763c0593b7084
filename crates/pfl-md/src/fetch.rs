//! Bounded-concurrency batch fetch.
//!
//! Every distinct ticker is fetched exactly once, at most
//! [`FetchOptions::concurrency`] at a time. A ticker whose own symbol yields
//! nothing is retried under its alternate spellings. Any failure (transport,
//! HTTP status, empty payload, deadline) is logged and leaves that ticker out
//! of the book; the batch itself never fails.

use std::collections::BTreeSet;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alias::{normalize_ticker, symbol_candidates};
use crate::book::PriceBook;
use crate::provider::{ChartProvider, ChartRequest, FetchWindow};
use crate::series::ChartSeries;

pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum in-flight requests. `0` is treated as `1`.
    pub concurrency: usize,
    /// Wall-clock cutoff for the whole batch. Fetches still outstanding at
    /// the deadline count as "no data"; completed ones are kept.
    pub deadline: Option<Instant>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }
}

impl FetchOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Deadline `budget` from now.
    pub fn with_deadline_in(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }
}

/// Fetch `tickers` over `window` into a [`PriceBook`].
pub async fn fetch_book<P>(
    provider: &P,
    tickers: &[String],
    window: FetchWindow,
    opts: &FetchOptions,
) -> PriceBook
where
    P: ChartProvider + ?Sized,
{
    let queue: BTreeSet<String> = tickers
        .iter()
        .map(|t| normalize_ticker(t))
        .filter(|t| !t.is_empty())
        .collect();
    let requested = queue.len();
    let deadline = opts.deadline;

    debug!(
        provider = provider.name(),
        requested,
        concurrency = opts.concurrency.max(1),
        start = %window.start,
        end = %window.end,
        "price fetch starting"
    );

    let results: Vec<(String, Option<ChartSeries>)> = stream::iter(queue)
        .map(|ticker| async move {
            let got = match deadline {
                Some(at) => {
                    match tokio::time::timeout_at(at, fetch_one(provider, &ticker, window)).await
                    {
                        Ok(got) => got,
                        Err(_) => {
                            warn!(ticker = %ticker, "price fetch deadline expired");
                            None
                        }
                    }
                }
                None => fetch_one(provider, &ticker, window).await,
            };
            (ticker, got)
        })
        .buffer_unordered(opts.concurrency.max(1))
        .collect()
        .await;

    let mut book = PriceBook::new();
    for (ticker, series) in results {
        if let Some(series) = series {
            book.insert(&ticker, series);
        }
    }

    info!(
        provider = provider.name(),
        requested,
        priced = book.len(),
        "price fetch complete"
    );
    book
}

async fn fetch_one<P>(provider: &P, ticker: &str, window: FetchWindow) -> Option<ChartSeries>
where
    P: ChartProvider + ?Sized,
{
    for symbol in symbol_candidates(ticker) {
        let req = ChartRequest {
            symbol: symbol.clone(),
            window,
        };
        match provider.fetch_daily(&req).await {
            Ok(series) if !series.is_empty() => {
                if symbol != ticker {
                    debug!(ticker, symbol = %symbol, "priced under alternate symbol");
                }
                return Some(series.with_ticker(ticker));
            }
            Ok(_) => debug!(ticker, symbol = %symbol, "empty series"),
            Err(e) => warn!(ticker, symbol = %symbol, error = %e, "price fetch failed"),
        }
    }
    None
}
