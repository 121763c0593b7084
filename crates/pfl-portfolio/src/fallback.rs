//! Equal-weight fallback and the accept / auto-correct / fallback decision.

use serde::{Deserialize, Serialize};

use crate::bps::Bps;
use crate::repair::{repair, Adjustment, RepairFailure};
use crate::types::{ConstraintConfig, Holding, Portfolio, ProposedHolding};

/// One entry of a lane's fallback universe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTicker {
    pub ticker: String,
    pub sector: String,
}

impl ReferenceTicker {
    pub fn new<T: Into<String>, S: Into<String>>(ticker: T, sector: S) -> Self {
        Self {
            ticker: ticker.into(),
            sector: sector.into(),
        }
    }
}

/// Built-in universe used when a lane does not configure its own: one large
/// cap per GICS sector.
pub fn default_reference_universe() -> Vec<ReferenceTicker> {
    [
        ("AAPL", "Technology"),
        ("MSFT", "Technology"),
        ("JPM", "Financials"),
        ("JNJ", "Health Care"),
        ("XOM", "Energy"),
        ("PG", "Consumer Staples"),
        ("AMZN", "Consumer Discretionary"),
        ("CAT", "Industrials"),
        ("NEE", "Utilities"),
        ("LIN", "Materials"),
        ("PLD", "Real Estate"),
        ("GOOGL", "Communication Services"),
    ]
    .into_iter()
    .map(|(t, s)| ReferenceTicker::new(t, s))
    .collect()
}

/// Equal-weight portfolio over the first `positions` entries of `universe`.
///
/// `10_000 / n` bp each; the remainder goes out one bp at a time in ticker
/// order so the total is exactly [`Bps::FULL`]. The result is in canonical
/// order (weight desc, ticker asc). A universe shorter than `positions`
/// yields a short portfolio; lane config rejects that case at load.
pub fn equal_weight_fallback(universe: &[ReferenceTicker], positions: usize) -> Portfolio {
    let picked = &universe[..positions.min(universe.len())];
    if picked.is_empty() {
        return Portfolio::default();
    }

    let n = picked.len() as i64;
    let base = Bps::FULL.raw() / n;
    let remainder = (Bps::FULL.raw() % n) as usize;

    let mut by_ticker: Vec<&ReferenceTicker> = picked.iter().collect();
    by_ticker.sort_by(|a, b| a.ticker.cmp(&b.ticker));

    let mut holdings: Vec<Holding> = by_ticker
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let extra = if i < remainder { 1 } else { 0 };
            Holding::new(r.ticker.clone(), Bps::new(base + extra), r.sector.clone())
        })
        .collect();
    crate::ordering::sort_holdings_canonical(&mut holdings);
    Portfolio::new(holdings)
}

// ─── Decision ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    /// Proposal already satisfied every cap.
    Accepted,
    /// Proposal was repaired.
    AutoCorrected,
    /// Repair failed; the equal-weight fallback was substituted.
    Fallback,
}

/// What the orchestrator records for one lane run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RepairDecision {
    pub status: RepairStatus,
    pub portfolio: Portfolio,
    pub adjustments: Vec<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RepairFailure>,
}

/// Repair `proposal`, substituting the equal-weight fallback over `universe`
/// when repair fails.
pub fn repair_or_fallback(
    proposal: &[ProposedHolding],
    cfg: &ConstraintConfig,
    universe: &[ReferenceTicker],
) -> RepairDecision {
    match repair(proposal, cfg) {
        Ok(r) => RepairDecision {
            status: if r.was_corrected() {
                RepairStatus::AutoCorrected
            } else {
                RepairStatus::Accepted
            },
            portfolio: r.portfolio,
            adjustments: r.adjustments,
            failure: None,
        },
        Err(failure) => RepairDecision {
            status: RepairStatus::Fallback,
            portfolio: equal_weight_fallback(universe, cfg.positions()),
            adjustments: Vec::new(),
            failure: Some(failure),
        },
    }
}
