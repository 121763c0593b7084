use chrono::NaiveDate;
use serde::Serialize;

/// One linked segment of the NAV chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReport {
    /// Snapshot governing this segment.
    pub snapshot_date: NaiveDate,
    /// Requested boundaries.
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Price dates actually used on each side.
    pub aligned_start: NaiveDate,
    pub aligned_end: NaiveDate,
    pub return_pct: f64,
    pub covered_weight_pct: f64,
    pub holdings_priced: usize,
    pub holdings_total: usize,
    /// `None` once the benchmark has dropped out.
    pub benchmark_return_pct: Option<f64>,
}

/// Benchmark-relative performance since inception.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub inception_date: NaiveDate,
    pub asof_portfolio_date: NaiveDate,
    pub asof_price_date: NaiveDate,
    pub fund_return_pct: f64,
    pub benchmark_ticker: Option<String>,
    pub benchmark_return_pct: Option<f64>,
    pub excess_return_pct: Option<f64>,
    /// Weakest per-segment coverage.
    pub covered_weight_pct: f64,
    /// `Some(100.0)` when the benchmark priced every segment.
    pub benchmark_covered_weight_pct: Option<f64>,
    pub segments: Vec<SegmentReport>,
}

/// Round half away from zero to 2 decimals.
pub fn round2(x: f64) -> f64 {
    round_dp(x, 2)
}

pub(crate) fn round_dp(x: f64, dp: i32) -> f64 {
    let k = 10f64.powi(dp);
    (x * k).round() / k
}
