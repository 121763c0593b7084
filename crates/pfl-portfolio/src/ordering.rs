//! Holding ordering policy.
//!
//! Every place the repair engine has to choose between holdings (top-N trim,
//! trimming toward the floor, ±1 bp reconciliation, output order) goes
//! through the comparators here so that identical inputs always produce
//! identical outputs.
//!
//! # Canonical sort key
//!
//! `(weight desc, ticker asc)`. Ticker order is the ultimate tie-break.
//! Float weights compare with [`f64::total_cmp`], so NaN can never make the
//! order input-dependent.

use std::cmp::Ordering;

use crate::types::Holding;

/// Compare two `(weight, ticker)` pairs in canonical order: heavier first,
/// then lexical ticker.
pub fn cmp_weight_desc(a_weight: f64, a_ticker: &str, b_weight: f64, b_ticker: &str) -> Ordering {
    b_weight
        .total_cmp(&a_weight)
        .then_with(|| a_ticker.cmp(b_ticker))
}

/// Sort holdings into canonical order **in place**.
pub fn sort_holdings_canonical(holdings: &mut [Holding]) {
    holdings.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}
