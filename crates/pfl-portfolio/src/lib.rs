//! pfl-portfolio
//!
//! Constraint repair for paper-fund lanes.
//! - Proposal sanitizing, dedup and top-N trim
//! - Clip / floor / scale / redistribute against position, sector and crypto caps
//! - Integer basis-point rounding with exact 100 % reconciliation
//! - Structured failure + equal-weight fallback
//! - Pure deterministic logic (no IO, no time, no logging)

mod bps;
mod ordering;
mod types;

pub mod constraints;
pub mod fallback;
pub mod repair;

pub use bps::{Bps, BPS_PER_PCT};
pub use constraints::{
    check_group_limits, check_portfolio, check_shape, check_weight_bounds, ConstraintViolation,
    TOLERANCE,
};
pub use fallback::{
    default_reference_universe, equal_weight_fallback, repair_or_fallback, ReferenceTicker,
    RepairDecision, RepairStatus,
};
pub use ordering::{cmp_weight_desc, sort_holdings_canonical};
pub use repair::{repair, Adjustment, RepairFailure, RepairReason, Repaired};
pub use types::{
    AssetClass, ConfigError, ConstraintConfig, Holding, Limits, Portfolio, ProposedHolding,
    UNKNOWN_SECTOR,
};
