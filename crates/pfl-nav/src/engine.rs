//! Segment-linked NAV.
//!
//! # Segments
//!
//! Snapshot `i` governs `[date_i, date_{i+1}]`; the last applicable snapshot
//! governs `[date_last, target]` when the target is later. The first segment
//! starts the day before inception, so a fund evaluated on its own inception
//! date still has one segment.
//!
//! # Alignment
//!
//! Holdings on different calendars (equities vs crypto, holidays) resolve to
//! different as-of dates. Each segment is measured between the *earliest*
//! resolved start date and the *earliest* resolved end date across holdings
//! (and the benchmark while it is available), and every holding is re-priced
//! at those aligned dates. Holdings missing either aligned price drop out of
//! the segment and lower its coverage instead of biasing its return.
//!
//! # Chaining
//!
//! `nav_{k+1} = nav_k * (1 + r_k / 100)` from `nav_0 = 100`. The benchmark
//! chains the same way until a segment cannot price it; from then on the
//! benchmark is unavailable.

use std::fmt;

use chrono::{Days, NaiveDate};
use pfl_md::PriceLookup;

use crate::history::{Snapshot, SnapshotHistory};
use crate::report::{round2, round_dp, PerformanceReport, SegmentReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// No snapshot dated on or before the target.
    NoSnapshots { target: NaiveDate },
    /// A segment priced none of its holdings.
    NoCoverage { start: NaiveDate, end: NaiveDate },
}

impl NavError {
    pub fn reason(&self) -> &'static str {
        match self {
            NavError::NoSnapshots { .. } => "no_snapshots",
            NavError::NoCoverage { .. } => "no_coverage",
        }
    }
}

impl fmt::Display for NavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavError::NoSnapshots { target } => {
                write!(f, "no snapshot on or before {target}")
            }
            NavError::NoCoverage { start, end } => {
                write!(f, "no holding could be priced for segment {start}..{end}")
            }
        }
    }
}

impl std::error::Error for NavError {}

/// A governing snapshot and its requested boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub snapshot: &'a Snapshot,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Segments for `target`. Empty iff no snapshot applies.
pub fn segments(history: &SnapshotHistory, target: NaiveDate) -> Vec<Segment<'_>> {
    let applicable = history.applicable(target);
    let mut out = Vec::with_capacity(applicable.len());

    for (i, snapshot) in applicable.iter().enumerate() {
        let start = if i == 0 {
            snapshot
                .date
                .checked_sub_days(Days::new(1))
                .unwrap_or(snapshot.date)
        } else {
            snapshot.date
        };
        let end = applicable.get(i + 1).map(|next| next.date).unwrap_or(target);
        if end > start {
            out.push(Segment {
                snapshot,
                start,
                end,
            });
        }
    }
    out
}

fn simple_return_pct(start: f64, end: f64) -> f64 {
    (end / start - 1.0) * 100.0
}

fn measure<L: PriceLookup + ?Sized>(
    seg: &Segment<'_>,
    benchmark: Option<&str>,
    prices: &L,
) -> Result<SegmentReport, NavError> {
    let holdings = &seg.snapshot.portfolio.holdings;

    // a) raw resolution at the requested boundaries.
    let mut start_dates: Vec<NaiveDate> = Vec::new();
    let mut end_dates: Vec<NaiveDate> = Vec::new();
    for h in holdings {
        if let (Some(s), Some(e)) = (
            prices.resolve(&h.ticker, seg.start),
            prices.resolve(&h.ticker, seg.end),
        ) {
            start_dates.push(s.date);
            end_dates.push(e.date);
        }
    }
    let bench_raw = benchmark.and_then(|b| {
        Some((prices.resolve(b, seg.start)?, prices.resolve(b, seg.end)?))
    });
    if let Some((s, e)) = bench_raw {
        start_dates.push(s.date);
        end_dates.push(e.date);
    }

    // b) aligned window.
    let no_coverage = NavError::NoCoverage {
        start: seg.start,
        end: seg.end,
    };
    let aligned_start = start_dates.iter().min().copied().ok_or(no_coverage.clone())?;
    let aligned_end = end_dates
        .iter()
        .min()
        .copied()
        .ok_or(no_coverage.clone())?
        .max(aligned_start);

    // c) re-price at aligned dates.
    let mut covered = 0.0;
    let mut weighted = 0.0;
    let mut priced = 0;
    for h in holdings {
        if let (Some(s), Some(e)) = (
            prices.resolve(&h.ticker, aligned_start),
            prices.resolve(&h.ticker, aligned_end),
        ) {
            let w = h.weight.as_pct();
            covered += w;
            weighted += w * simple_return_pct(s.close, e.close);
            priced += 1;
        }
    }

    // d) coverage.
    if covered <= 0.0 {
        return Err(no_coverage);
    }
    let return_pct = weighted / covered;

    // e) benchmark on the same window.
    let bench_return = match (benchmark, bench_raw) {
        (Some(b), Some(_)) => match (
            prices.resolve(b, aligned_start),
            prices.resolve(b, aligned_end),
        ) {
            (Some(s), Some(e)) => Some(simple_return_pct(s.close, e.close)),
            _ => None,
        },
        _ => None,
    };

    Ok(SegmentReport {
        snapshot_date: seg.snapshot.date,
        start: seg.start,
        end: seg.end,
        aligned_start,
        aligned_end,
        return_pct,
        covered_weight_pct: covered,
        holdings_priced: priced,
        holdings_total: holdings.len(),
        benchmark_return_pct: bench_return,
    })
}

/// Chain segment returns from inception to `target`.
///
/// Snapshots dated after `target` are ignored, so appending later snapshots
/// never changes a past evaluation.
pub fn compute<L: PriceLookup + ?Sized>(
    history: &SnapshotHistory,
    target: NaiveDate,
    benchmark: Option<&str>,
    prices: &L,
) -> Result<PerformanceReport, NavError> {
    let segs = segments(history, target);
    let (first, latest) = match (segs.first(), history.applicable(target).last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return Err(NavError::NoSnapshots { target }),
    };
    let inception_date = first.snapshot.date;
    let asof_portfolio_date = latest.date;

    let mut nav = 100.0;
    let mut bench_nav = 100.0;
    let mut bench_live = benchmark.is_some();
    let mut weakest = f64::INFINITY;
    let mut reports = Vec::with_capacity(segs.len());

    for seg in &segs {
        let live = if bench_live { benchmark } else { None };
        let mut report = measure(seg, live, prices)?;

        nav *= 1.0 + report.return_pct / 100.0;
        match report.benchmark_return_pct {
            Some(r) => bench_nav *= 1.0 + r / 100.0,
            None => bench_live = false,
        }
        weakest = weakest.min(report.covered_weight_pct);

        report.return_pct = round_dp(report.return_pct, 4);
        report.covered_weight_pct = round_dp(report.covered_weight_pct, 4);
        report.benchmark_return_pct = report.benchmark_return_pct.map(|r| round_dp(r, 4));
        reports.push(report);
    }

    let asof_price_date = reports
        .last()
        .map(|r| r.aligned_end)
        .unwrap_or(asof_portfolio_date);

    let fund_return_pct = round2(nav - 100.0);
    let benchmark_return_pct = bench_live.then(|| round2(bench_nav - 100.0));
    let excess_return_pct = benchmark_return_pct.map(|b| round2(fund_return_pct - b));

    Ok(PerformanceReport {
        inception_date,
        asof_portfolio_date,
        asof_price_date,
        fund_return_pct,
        benchmark_ticker: benchmark.map(str::to_string),
        benchmark_return_pct,
        excess_return_pct,
        covered_weight_pct: round2(weakest),
        benchmark_covered_weight_pct: bench_live.then_some(100.0),
        segments: reports,
    })
}
