//! Fetch-then-compute entry point.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use pfl_md::{fetch_book, normalize_ticker, ChartProvider, FetchOptions, FetchWindow};
use tracing::{debug, info};

use crate::engine::{compute, NavError};
use crate::history::SnapshotHistory;
use crate::report::PerformanceReport;

/// Days of extra history fetched before inception so the first as-of lookup
/// can walk back across weekends and holidays.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavOptions {
    pub lookback_days: u32,
    pub fetch: FetchOptions,
}

impl Default for NavOptions {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            fetch: FetchOptions::default(),
        }
    }
}

/// Distinct tickers held by any snapshot applicable at `target`, plus the
/// benchmark. Normalized and sorted.
pub fn required_tickers(
    history: &SnapshotHistory,
    target: NaiveDate,
    benchmark: Option<&str>,
) -> Vec<String> {
    let mut out: BTreeSet<String> = history
        .applicable(target)
        .iter()
        .flat_map(|s| s.portfolio.holdings.iter())
        .map(|h| normalize_ticker(&h.ticker))
        .collect();
    if let Some(b) = benchmark {
        out.insert(normalize_ticker(b));
    }
    out.retain(|t| !t.is_empty());
    out.into_iter().collect()
}

/// `[inception - 1 - lookback, target]`, or `None` when no snapshot applies.
pub fn fetch_window(
    history: &SnapshotHistory,
    target: NaiveDate,
    lookback_days: u32,
) -> Option<FetchWindow> {
    let inception = history.applicable(target).first()?.date;
    let back = Days::new(u64::from(lookback_days) + 1);
    let start = inception.checked_sub_days(back).unwrap_or(NaiveDate::MIN);
    Some(FetchWindow::new(start, target))
}

/// Fetch every required series once, then [`compute`].
///
/// Returns [`NavError::NoSnapshots`] before any network work when nothing
/// applies at `target`.
pub async fn evaluate<P>(
    provider: &P,
    history: &SnapshotHistory,
    target: NaiveDate,
    benchmark: Option<&str>,
    opts: &NavOptions,
) -> Result<PerformanceReport, NavError>
where
    P: ChartProvider + ?Sized,
{
    let window = fetch_window(history, target, opts.lookback_days)
        .ok_or(NavError::NoSnapshots { target })?;
    let tickers = required_tickers(history, target, benchmark);

    debug!(
        %target,
        tickers = tickers.len(),
        benchmark = benchmark.unwrap_or("-"),
        "evaluating nav"
    );

    let book = fetch_book(provider, &tickers, window, &opts.fetch).await;
    let report = compute(history, target, benchmark, &book)?;

    info!(
        %target,
        fund_return_pct = report.fund_return_pct,
        benchmark_return_pct = ?report.benchmark_return_pct,
        covered_weight_pct = report.covered_weight_pct,
        segments = report.segments.len(),
        "nav computed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Snapshot;
    use pfl_portfolio::{Bps, Holding, Portfolio};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn history() -> SnapshotHistory {
        SnapshotHistory::from(vec![
            Snapshot::new(
                d("2024-03-04"),
                Portfolio::new(vec![
                    Holding::new("brk.b", Bps::new(5000), "Financials"),
                    Holding::new("AAPL", Bps::new(5000), "Technology"),
                ]),
            ),
            Snapshot::new(
                d("2024-04-01"),
                Portfolio::new(vec![Holding::new("NVDA", Bps::FULL, "Technology")]),
            ),
        ])
    }

    #[test]
    fn required_tickers_only_cover_applicable_snapshots() {
        let h = history();
        assert_eq!(
            required_tickers(&h, d("2024-03-20"), Some("spy")),
            ["AAPL", "BRK.B", "SPY"]
        );
        assert_eq!(
            required_tickers(&h, d("2024-04-02"), None),
            ["AAPL", "BRK.B", "NVDA"]
        );
        assert!(required_tickers(&h, d("2024-01-01"), None).is_empty());
    }

    #[test]
    fn fetch_window_reaches_back_before_inception() {
        let h = history();
        let w = fetch_window(&h, d("2024-03-20"), 10).unwrap();
        assert_eq!(w.start, d("2024-02-22"));
        assert_eq!(w.end, d("2024-03-20"));
        assert!(fetch_window(&h, d("2024-03-03"), 10).is_none());
    }
}
