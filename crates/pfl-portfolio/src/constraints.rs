//! pfl-portfolio: constraints
//!
//! After-the-fact verification of a portfolio against a lane's caps:
//!   - Position count and ticker uniqueness
//!   - Per-position weight bounds
//!   - Sector and crypto-class limits
//!   - Fully-invested total
//!
//! All checks run on integer basis points. Bounds and group caps allow
//! [`TOLERANCE`] (0.01 percentage point); the total must be exact.
//!
//! The repair engine runs [`check_portfolio`] as its final gate, so a
//! portfolio the engine returns always passes this module.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::bps::Bps;
use crate::types::{ConstraintConfig, Portfolio};

/// Slack on per-position bounds and group caps.
pub const TOLERANCE: Bps = Bps::ONE;

// ─── ConstraintViolation ──────────────────────────────────────────────────────

/// A single constraint breach.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintViolation {
    PositionCount { expected: usize, actual: usize },
    DuplicateTicker { ticker: String },
    WeightTooLarge { ticker: String, weight: Bps, limit: Bps },
    WeightTooSmall { ticker: String, weight: Bps, limit: Bps },
    SectorCapExceeded { sector: String, actual: Bps, limit: Bps },
    CryptoCapExceeded { actual: Bps, limit: Bps },
    TotalMismatch { actual: Bps, expected: Bps },
}

impl std::fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionCount { expected, actual } => {
                write!(f, "{actual} positions, expected exactly {expected}")
            }
            Self::DuplicateTicker { ticker } => write!(f, "ticker '{ticker}' appears twice"),
            Self::WeightTooLarge {
                ticker,
                weight,
                limit,
            } => write!(f, "weight {weight}% for '{ticker}' exceeds max {limit}%"),
            Self::WeightTooSmall {
                ticker,
                weight,
                limit,
            } => write!(f, "weight {weight}% for '{ticker}' below min {limit}%"),
            Self::SectorCapExceeded {
                sector,
                actual,
                limit,
            } => write!(f, "sector '{sector}' total {actual}% exceeds cap {limit}%"),
            Self::CryptoCapExceeded { actual, limit } => {
                write!(f, "crypto total {actual}% exceeds cap {limit}%")
            }
            Self::TotalMismatch { actual, expected } => {
                write!(f, "total weight {actual}% != {expected}%")
            }
        }
    }
}

// ─── Checks ───────────────────────────────────────────────────────────────────

/// Position count and ticker uniqueness.
pub fn check_shape(portfolio: &Portfolio, cfg: &ConstraintConfig) -> Vec<ConstraintViolation> {
    let mut violations = Vec::new();

    if portfolio.len() != cfg.positions() {
        violations.push(ConstraintViolation::PositionCount {
            expected: cfg.positions(),
            actual: portfolio.len(),
        });
    }

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for h in &portfolio.holdings {
        if !seen.insert(h.ticker.as_str()) {
            violations.push(ConstraintViolation::DuplicateTicker {
                ticker: h.ticker.clone(),
            });
        }
    }

    violations
}

/// Per-position `[min, max]` bounds.
pub fn check_weight_bounds(
    portfolio: &Portfolio,
    cfg: &ConstraintConfig,
) -> Vec<ConstraintViolation> {
    let limits = cfg.limits();
    let mut violations = Vec::new();

    for h in &portfolio.holdings {
        if h.weight > limits.max_position + TOLERANCE {
            violations.push(ConstraintViolation::WeightTooLarge {
                ticker: h.ticker.clone(),
                weight: h.weight,
                limit: limits.max_position,
            });
        }
        if h.weight < limits.min_position - TOLERANCE {
            violations.push(ConstraintViolation::WeightTooSmall {
                ticker: h.ticker.clone(),
                weight: h.weight,
                limit: limits.min_position,
            });
        }
    }

    violations
}

/// Sector caps and the crypto-class cap.
pub fn check_group_limits(
    portfolio: &Portfolio,
    cfg: &ConstraintConfig,
) -> Vec<ConstraintViolation> {
    let limits = cfg.limits();
    let mut violations = Vec::new();

    for (sector, total) in portfolio.sector_totals() {
        if total > limits.max_sector + TOLERANCE {
            violations.push(ConstraintViolation::SectorCapExceeded {
                sector: sector.to_string(),
                actual: total,
                limit: limits.max_sector,
            });
        }
    }

    let crypto = portfolio.crypto_total();
    if crypto > limits.max_crypto + TOLERANCE {
        violations.push(ConstraintViolation::CryptoCapExceeded {
            actual: crypto,
            limit: limits.max_crypto,
        });
    }

    violations
}

/// Every check, in a fixed order. Empty ⇒ the portfolio is valid for `cfg`.
pub fn check_portfolio(portfolio: &Portfolio, cfg: &ConstraintConfig) -> Vec<ConstraintViolation> {
    let mut violations = check_shape(portfolio, cfg);
    violations.extend(check_weight_bounds(portfolio, cfg));
    violations.extend(check_group_limits(portfolio, cfg));

    let total = portfolio.total();
    if total != Bps::FULL {
        violations.push(ConstraintViolation::TotalMismatch {
            actual: total,
            expected: Bps::FULL,
        });
    }

    violations
}
