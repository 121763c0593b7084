//! Scenario: Segment-linked returns chain correctly and tolerate gaps
//!
//! # Invariants under test
//!
//! 1. One holding at 100 % moving 100 → 110 reports `fund_return_pct = 10.00`.
//! 2. Switching TICK_A → TICK_B at a rebalance chains the two legs
//!    multiplicatively.
//! 3. Three equal holdings with one unpriced report ~66.67 % coverage and a
//!    return over the covered weight only.
//! 4. Overall coverage is the weakest segment's coverage, and a later segment
//!    that prices nothing fails the whole computation.
//! 5. Snapshots appended after the target date do not change the result.
//! 6. The benchmark is measured over the same aligned windows and yields an
//!    excess return.
//!
//! All tests are pure; prices come from an in-memory book.

use chrono::NaiveDate;
use pfl_md::{ChartSeries, PriceBook, PricePoint};
use pfl_nav::{compute, NavError, Snapshot, SnapshotHistory};
use pfl_portfolio::{Bps, Holding, Portfolio};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn series(t: &str, pts: &[(&str, f64)]) -> ChartSeries {
    ChartSeries::new(t, pts.iter().map(|(s, c)| PricePoint::new(d(s), *c)))
}

fn snapshot(date: &str, rows: &[(&str, i64)]) -> Snapshot {
    Snapshot::new(
        d(date),
        Portfolio::new(
            rows.iter()
                .map(|(t, bp)| Holding::new(*t, Bps::new(*bp), "Technology"))
                .collect(),
        ),
    )
}

// ---------------------------------------------------------------------------
// 1 + 2: Chaining
// ---------------------------------------------------------------------------

#[test]
fn single_holding_ten_percent() {
    let h = SnapshotHistory::from(vec![snapshot("2024-03-04", &[("TICK", 10_000)])]);
    let book: PriceBook = [series("TICK", &[("2024-03-01", 100.0), ("2024-03-08", 110.0)])]
        .into_iter()
        .collect();

    let r = compute(&h, d("2024-03-08"), None, &book).unwrap();
    assert_eq!(r.fund_return_pct, 10.0);
    assert_eq!(r.segments.len(), 1);
}

#[test]
fn rebalance_switch_chains_both_legs() {
    let h = SnapshotHistory::from(vec![
        snapshot("2024-03-04", &[("TICK_A", 10_000)]),
        snapshot("2024-03-11", &[("TICK_B", 10_000)]),
    ]);
    let book: PriceBook = [
        series(
            "TICK_A",
            &[("2024-03-01", 100.0), ("2024-03-08", 105.0), ("2024-03-11", 110.0)],
        ),
        series("TICK_B", &[("2024-03-08", 49.0), ("2024-03-11", 50.0), ("2024-03-15", 60.0)]),
    ]
    .into_iter()
    .collect();

    let r = compute(&h, d("2024-03-15"), None, &book).unwrap();
    // 1.10 * 1.20
    assert_eq!(r.fund_return_pct, 32.0);
    assert_eq!(r.inception_date, d("2024-03-04"));
    assert_eq!(r.asof_portfolio_date, d("2024-03-11"));
    assert_eq!(r.asof_price_date, d("2024-03-15"));
    assert_eq!(r.segments[0].return_pct, 10.0);
    assert_eq!(r.segments[1].return_pct, 20.0);
}

// ---------------------------------------------------------------------------
// 3: Partial coverage
// ---------------------------------------------------------------------------

#[test]
fn unpriced_holding_lowers_coverage_not_return() {
    let h = SnapshotHistory::from(vec![snapshot(
        "2024-03-04",
        &[("A", 3334), ("B", 3333), ("GHOST", 3333)],
    )]);
    let book: PriceBook = [
        series("A", &[("2024-03-01", 100.0), ("2024-03-08", 110.0)]),
        series("B", &[("2024-03-01", 100.0), ("2024-03-08", 100.0)]),
    ]
    .into_iter()
    .collect();

    let r = compute(&h, d("2024-03-08"), None, &book).unwrap();
    assert_eq!(r.covered_weight_pct, 66.67);
    // 33.34 * 10 / 66.67
    assert_eq!(r.fund_return_pct, 5.0);
    assert_eq!(r.segments[0].holdings_priced, 2);
    assert_eq!(r.segments[0].holdings_total, 3);
}

#[test]
fn nothing_priced_is_no_data() {
    let h = SnapshotHistory::from(vec![snapshot("2024-03-04", &[("GHOST", 10_000)])]);
    let err = compute(&h, d("2024-03-08"), None, &PriceBook::new()).unwrap_err();
    assert!(matches!(err, NavError::NoCoverage { .. }));

    let err = compute(&h, d("2024-03-01"), None, &PriceBook::new()).unwrap_err();
    assert_eq!(
        err,
        NavError::NoSnapshots {
            target: d("2024-03-01")
        }
    );
}

// ---------------------------------------------------------------------------
// 4: Coverage across segments
// ---------------------------------------------------------------------------

#[test]
fn overall_coverage_is_the_weakest_segment() {
    let h = SnapshotHistory::from(vec![
        snapshot("2024-03-04", &[("A", 10_000)]),
        snapshot("2024-03-11", &[("A", 3334), ("B", 3333), ("GHOST", 3333)]),
    ]);
    let book: PriceBook = [
        series(
            "A",
            &[("2024-03-01", 100.0), ("2024-03-11", 110.0), ("2024-03-15", 121.0)],
        ),
        series("B", &[("2024-03-01", 50.0), ("2024-03-11", 50.0), ("2024-03-15", 55.0)]),
    ]
    .into_iter()
    .collect();

    let r = compute(&h, d("2024-03-15"), None, &book).unwrap();
    let per_segment: Vec<f64> = r.segments.iter().map(|s| s.covered_weight_pct).collect();
    assert_eq!(per_segment, [100.0, 66.67]);
    assert_eq!(r.covered_weight_pct, 66.67);
    // 1.10 * 1.10
    assert_eq!(r.fund_return_pct, 21.0);
    assert_eq!(r.segments[1].holdings_priced, 2);
}

#[test]
fn later_segment_without_prices_fails_whole_nav() {
    let h = SnapshotHistory::from(vec![
        snapshot("2024-03-04", &[("A", 10_000)]),
        snapshot("2024-03-11", &[("GHOST", 10_000)]),
    ]);
    let book: PriceBook = [series(
        "A",
        &[("2024-03-01", 100.0), ("2024-03-11", 110.0), ("2024-03-15", 121.0)],
    )]
    .into_iter()
    .collect();

    // The first segment alone would price fine.
    assert!(compute(&h, d("2024-03-11"), None, &book).is_ok());

    let err = compute(&h, d("2024-03-15"), None, &book).unwrap_err();
    assert_eq!(
        err,
        NavError::NoCoverage {
            start: d("2024-03-11"),
            end: d("2024-03-15"),
        }
    );
}

// ---------------------------------------------------------------------------
// 5: Later snapshots are invisible
// ---------------------------------------------------------------------------

#[test]
fn later_appended_snapshots_do_not_change_the_past() {
    let book: PriceBook = [
        series(
            "A",
            &[("2024-03-01", 100.0), ("2024-03-08", 104.0), ("2024-03-15", 99.0)],
        ),
        series("B", &[("2024-03-01", 20.0), ("2024-03-08", 21.0), ("2024-03-15", 25.0)]),
    ]
    .into_iter()
    .collect();

    let mut h = SnapshotHistory::from(vec![snapshot("2024-03-04", &[("A", 6000), ("B", 4000)])]);
    let before = compute(&h, d("2024-03-08"), Some("B"), &book).unwrap();

    h.push(snapshot("2024-03-11", &[("B", 10_000)])).unwrap();
    let after = compute(&h, d("2024-03-08"), Some("B"), &book).unwrap();

    assert_eq!(before, after);
}

// ---------------------------------------------------------------------------
// 6: Benchmark
// ---------------------------------------------------------------------------

#[test]
fn benchmark_and_excess_over_aligned_windows() {
    let h = SnapshotHistory::from(vec![snapshot("2024-03-04", &[("A", 10_000)])]);
    let book: PriceBook = [
        series("A", &[("2024-03-01", 100.0), ("2024-03-08", 110.0)]),
        series("SPY", &[("2024-03-01", 500.0), ("2024-03-08", 525.0)]),
    ]
    .into_iter()
    .collect();

    let r = compute(&h, d("2024-03-10"), Some("SPY"), &book).unwrap();
    assert_eq!(r.fund_return_pct, 10.0);
    assert_eq!(r.benchmark_return_pct, Some(5.0));
    assert_eq!(r.excess_return_pct, Some(5.0));
    assert_eq!(r.benchmark_covered_weight_pct, Some(100.0));
    // Target is a Sunday; the last close used is Friday's.
    assert_eq!(r.asof_price_date, d("2024-03-08"));

    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["benchmark_ticker"], "SPY");
    assert_eq!(json["inception_date"], "2024-03-04");
}
