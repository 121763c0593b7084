//! Scenario: evaluate fetches once, then computes
//!
//! # Invariants under test
//!
//! 1. A target before inception reports `no_snapshots` without any provider
//!    call.
//! 2. Every required ticker (holdings plus benchmark) is requested once over
//!    a window that reaches back before inception.
//! 3. Class-share tickers priced under an alternate spelling still count as
//!    covered.
//! 4. A ticker the provider cannot price lowers coverage; the report is still
//!    produced.
//!
//! No network: an in-process provider serves canned daily closes.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use pfl_md::{ChartProvider, ChartRequest, ChartSeries, FetchWindow, PricePoint, ProviderError};
use pfl_nav::{evaluate, NavError, NavOptions, Snapshot, SnapshotHistory};
use pfl_portfolio::{Bps, Holding, Portfolio};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[derive(Default)]
struct CannedProvider {
    closes: BTreeMap<String, Vec<(NaiveDate, f64)>>,
    calls: Mutex<Vec<(String, FetchWindow)>>,
}

impl CannedProvider {
    fn serve(mut self, symbol: &str, rows: &[(&str, f64)]) -> Self {
        let rows = rows.iter().map(|(day, c)| (d(day), *c)).collect();
        self.closes.insert(symbol.to_string(), rows);
        self
    }

    fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(s, _)| s.clone())
            .collect();
        out.sort();
        out
    }
}

#[async_trait::async_trait]
impl ChartProvider for CannedProvider {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn fetch_daily(&self, req: &ChartRequest) -> Result<ChartSeries, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((req.symbol.clone(), req.window));
        let rows = self.closes.get(&req.symbol).ok_or(ProviderError::Empty {
            symbol: req.symbol.clone(),
        })?;
        Ok(ChartSeries::new(
            req.symbol.as_str(),
            rows.iter()
                .filter(|(day, _)| *day >= req.window.start && *day <= req.window.end)
                .map(|(day, c)| PricePoint::new(*day, *c)),
        ))
    }
}

fn history() -> SnapshotHistory {
    SnapshotHistory::from(vec![Snapshot::new(
        d("2024-03-04"),
        Portfolio::new(vec![
            Holding::new("AAPL", Bps::new(5000), "Technology"),
            Holding::new("BRK.B", Bps::new(3000), "Financials"),
            Holding::new("VANISHED", Bps::new(2000), "Energy"),
        ]),
    )])
}

// ---------------------------------------------------------------------------
// 1: No snapshots, no network
// ---------------------------------------------------------------------------

#[tokio::test]
async fn before_inception_makes_no_provider_calls() {
    let provider = CannedProvider::default();
    let err = evaluate(
        &provider,
        &history(),
        d("2024-03-01"),
        Some("SPY"),
        &NavOptions::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        NavError::NoSnapshots {
            target: d("2024-03-01")
        }
    );
    assert_eq!(err.reason(), "no_snapshots");
    assert!(provider.symbols().is_empty());
}

// ---------------------------------------------------------------------------
// 2 + 3 + 4: Happy path with an alias and a gap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetches_each_ticker_once_and_reports_partial_coverage() {
    let provider = CannedProvider::default()
        .serve("AAPL", &[("2024-03-01", 100.0), ("2024-03-08", 111.0)])
        .serve("BRK-B", &[("2024-03-01", 400.0), ("2024-03-08", 412.0)])
        .serve("SPY", &[("2024-03-01", 500.0), ("2024-03-08", 510.0)]);

    let report = evaluate(
        &provider,
        &history(),
        d("2024-03-08"),
        Some("SPY"),
        &NavOptions::default(),
    )
    .await
    .unwrap();

    // VANISHED has no alternates; BRK.B is retried as BRK-B.
    assert_eq!(
        provider.symbols(),
        ["AAPL", "BRK-B", "BRK.B", "SPY", "VANISHED"]
    );
    for (_, window) in provider.calls.lock().unwrap().iter() {
        assert_eq!(window.start, d("2024-02-22"));
        assert_eq!(window.end, d("2024-03-08"));
    }

    // (50 * 11 + 30 * 3) / 80
    assert_eq!(report.fund_return_pct, 8.0);
    assert_eq!(report.covered_weight_pct, 80.0);
    assert_eq!(report.benchmark_return_pct, Some(2.0));
    assert_eq!(report.excess_return_pct, Some(6.0));
    assert_eq!(report.segments[0].holdings_priced, 2);
    assert_eq!(report.segments[0].holdings_total, 3);
}
