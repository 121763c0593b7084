//! pfl-nav
//!
//! Segment-linked NAV calculator.
//! - Append-only snapshot history
//! - Segment construction from rebalance dates
//! - Cross-calendar price alignment with partial coverage
//! - Benchmark chaining with permanent drop-out
//!
//! [`compute`] is pure over any [`pfl_md::PriceLookup`]; [`evaluate`] adds the
//! single batch fetch in front of it.

mod engine;
mod evaluate;
mod history;
mod report;

pub use engine::{compute, segments, NavError, Segment};
pub use evaluate::{evaluate, fetch_window, required_tickers, NavOptions, DEFAULT_LOOKBACK_DAYS};
pub use history::{HistoryError, Snapshot, SnapshotHistory};
pub use report::{round2, PerformanceReport, SegmentReport};
