//! pfl-portfolio: repair
//!
//! Forces an arbitrary proposed weight vector into a portfolio that satisfies
//! a lane's [`ConstraintConfig`], moving weights as little as the caps allow.
//!
//! Responsibilities (pure, no IO, no clock):
//! - Sanitize and merge the raw proposal.
//! - Trim to the lane's position count.
//! - Reject proposals no redistribution could fix (empty, infeasible caps).
//! - Clip / floor / scale / redistribute until every cap holds.
//! - Round to whole basis points and reconcile the residual.
//! - Validate with [`check_portfolio`] before returning.
//!
//! # Algorithm
//!
//! 1. Merge duplicate tickers (weights summed, first non-`UNKNOWN` sector).
//! 2. Keep the top `positions` by weight (ties: ticker ascending).
//! 3. Empty or zero-weight ⇒ [`RepairReason::EmptyOrInvalidPortfolio`].
//! 4. Sector capacity `Σ min(n_s · max_pos, max_sector)` (crypto class capped
//!    at `max_crypto`) below 100 %, or floors that cannot fit inside a group
//!    cap ⇒ [`RepairReason::InfeasibleSectorCapacity`].
//! 5. Normalize to 100 %.
//! 6. Raise weights to the floor, clip at the position cap.
//! 7. Scale over-cap sectors (and the crypto class) down to the cap,
//!    shrinking only the part of each weight above the floor.
//! 8. Hand a shortfall out in proportion to each holding's room; take a
//!    surplus back in proportion to each holding's weight above the floor.
//! 9. Repeat 6–8 until every cap holds ([`MAX_OUTER_ROUNDS`]).
//! 10. Over 100 % ⇒ level the largest holdings down toward the floor; short
//!     of 100 % with no room left ⇒ [`RepairReason::PostRepairConstraintsFailed`].
//! 11. Round to basis points; nudge ±1 bp until the total is exactly 100 %.
//! 12. Final validation.
//!
//! Every loop has a fixed bound, so termination does not depend on the input.

use std::collections::BTreeMap;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::bps::Bps;
use crate::constraints::{check_portfolio, ConstraintViolation};
use crate::ordering::{cmp_weight_desc, sort_holdings_canonical};
use crate::types::{
    AssetClass, ConstraintConfig, Holding, Limits, Portfolio, ProposedHolding, UNKNOWN_SECTOR,
};

/// Bound on clip/scale/redistribute passes (step 9).
pub const MAX_OUTER_ROUNDS: usize = 12;
/// Bound on proportional redistribution rounds within one pass (step 8).
pub const MAX_REDISTRIBUTION_ROUNDS: usize = 80;
/// Bound on ±1 bp nudges during rounding reconciliation (step 11).
pub const MAX_RECONCILE_STEPS: usize = 500;
/// Convergence tolerance, in percentage points.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

const CAP_EPSILON: f64 = 1e-9;

// ─── Outcome types ───────────────────────────────────────────────────────────

/// Machine-readable failure reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairReason {
    EmptyOrInvalidPortfolio,
    InfeasibleSectorCapacity,
    PostRepairConstraintsFailed,
}

impl RepairReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyOrInvalidPortfolio => "empty_or_invalid_portfolio",
            Self::InfeasibleSectorCapacity => "infeasible_sector_capacity",
            Self::PostRepairConstraintsFailed => "post_repair_constraints_failed",
        }
    }
}

impl std::fmt::Display for RepairReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured repair failure. The caller substitutes a fallback portfolio.
#[derive(Clone, Debug, PartialEq)]
pub struct RepairFailure {
    pub reason: RepairReason,
    pub detail: String,
    /// Populated for [`RepairReason::PostRepairConstraintsFailed`] when the
    /// final validation tripped.
    pub violations: Vec<ConstraintViolation>,
}

impl RepairFailure {
    fn new(reason: RepairReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            violations: Vec::new(),
        }
    }
}

impl std::fmt::Display for RepairFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

impl std::error::Error for RepairFailure {}

// Wire shape: {"failed": true, "reason": "...", "detail": "...", "violations": [...]}
impl Serialize for RepairFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.violations.is_empty() { 3 } else { 4 };
        let mut st = serializer.serialize_struct("RepairFailure", len)?;
        st.serialize_field("failed", &true)?;
        st.serialize_field("reason", &self.reason)?;
        st.serialize_field("detail", &self.detail)?;
        if !self.violations.is_empty() {
            st.serialize_field("violations", &self.violations)?;
        }
        st.end()
    }
}

/// One change the engine made to the proposal.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    /// Entry at `index` had no ticker and was discarded.
    BlankTickerDropped { index: usize },
    /// Weight was negative, non-finite or unparseable and was treated as 0.
    SanitizedWeight { ticker: String },
    MergedDuplicate { ticker: String, occurrences: usize },
    DroppedForPositionCount { ticker: String },
    /// Final weight differs from the proposed weight.
    Reweighted { ticker: String, proposed: Bps, repaired: Bps },
}

/// A successfully repaired portfolio plus the changes that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Repaired {
    pub portfolio: Portfolio,
    pub adjustments: Vec<Adjustment>,
}

impl Repaired {
    /// `true` when the output differs from what was proposed.
    pub fn was_corrected(&self) -> bool {
        !self.adjustments.is_empty()
    }
}

// ─── Working state ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Slot {
    ticker: String,
    sector: String,
    sector_ix: usize,
    crypto: bool,
    proposed: f64,
    weight: f64,
}

/// Caps as plain percentages.
#[derive(Clone, Copy, Debug)]
struct Caps {
    min: f64,
    max: f64,
    sector: f64,
    crypto: f64,
}

impl From<&ConstraintConfig> for Caps {
    fn from(cfg: &ConstraintConfig) -> Self {
        Self {
            min: cfg.min_position_pct(),
            max: cfg.max_position_pct(),
            sector: cfg.max_sector_pct(),
            crypto: cfg.max_crypto_pct(),
        }
    }
}

/// Holdings indexed by position with their sector index precomputed.
#[derive(Debug)]
struct Book {
    slots: Vec<Slot>,
    sectors: Vec<String>,
}

impl Book {
    fn new(mut slots: Vec<Slot>) -> Self {
        let mut sectors: Vec<String> = slots.iter().map(|s| s.sector.clone()).collect();
        sectors.sort();
        sectors.dedup();
        for s in &mut slots {
            s.sector_ix = sectors.binary_search(&s.sector).unwrap_or(0);
        }
        Self { slots, sectors }
    }

    fn total(&self) -> f64 {
        self.slots.iter().map(|s| s.weight).sum()
    }

    fn sector_totals(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.sectors.len()];
        for s in &self.slots {
            out[s.sector_ix] += s.weight;
        }
        out
    }

    fn crypto_total(&self) -> f64 {
        self.slots.iter().filter(|s| s.crypto).map(|s| s.weight).sum()
    }

    fn normalize(&mut self, total: f64) {
        let k = 100.0 / total;
        for s in &mut self.slots {
            s.weight *= k;
        }
    }

    fn apply_floor_and_clip(&mut self, caps: &Caps) {
        for s in &mut self.slots {
            s.weight = s.weight.clamp(caps.min, caps.max);
        }
    }

    /// Shrink every over-cap group to its cap. Only the part of each weight
    /// above the floor is scaled, so floors survive.
    fn scale_groups(&mut self, caps: &Caps) {
        let totals = self.sector_totals();
        for (ix, total) in totals.iter().enumerate() {
            if *total > caps.sector + CAP_EPSILON {
                self.scale_members(|s| s.sector_ix == ix, *total - caps.sector, caps.min);
            }
        }
        let crypto = self.crypto_total();
        if crypto > caps.crypto + CAP_EPSILON {
            self.scale_members(|s| s.crypto, crypto - caps.crypto, caps.min);
        }
    }

    fn scale_members<F: Fn(&Slot) -> bool>(&mut self, member: F, remove: f64, floor: f64) {
        let above: f64 = self
            .slots
            .iter()
            .filter(|s| member(s))
            .map(|s| (s.weight - floor).max(0.0))
            .sum();
        if above <= 0.0 {
            return;
        }
        let keep = (1.0 - remove / above).max(0.0);
        for s in self.slots.iter_mut().filter(|s| member(s)) {
            let excess = (s.weight - floor).max(0.0);
            s.weight = floor.min(s.weight) + excess * keep;
        }
    }

    /// Remaining room per holding: position cap, sector headroom and (for
    /// crypto) class headroom, whichever is tightest.
    fn rooms(&self, caps: &Caps) -> (Vec<f64>, Vec<f64>, f64) {
        let sector_room: Vec<f64> = self
            .sector_totals()
            .iter()
            .map(|t| (caps.sector - t).max(0.0))
            .collect();
        let crypto_room = (caps.crypto - self.crypto_total()).max(0.0);
        let rooms = self
            .slots
            .iter()
            .map(|s| {
                let mut r = (caps.max - s.weight).min(sector_room[s.sector_ix]);
                if s.crypto {
                    r = r.min(crypto_room);
                }
                r.max(0.0)
            })
            .collect();
        (rooms, sector_room, crypto_room)
    }

    fn total_room(&self, caps: &Caps) -> f64 {
        self.rooms(caps).0.iter().sum()
    }

    /// Distribute `amount` proportionally to room. Returns what could not be
    /// placed.
    fn redistribute(&mut self, mut amount: f64, caps: &Caps) -> f64 {
        for _ in 0..MAX_REDISTRIBUTION_ROUNDS {
            if amount <= CONVERGENCE_TOLERANCE {
                break;
            }
            let (rooms, sector_room, crypto_room) = self.rooms(caps);
            let total_room: f64 = rooms.iter().sum();
            if total_room <= CONVERGENCE_TOLERANCE {
                break;
            }

            let share = (amount / total_room).min(1.0);
            let mut adds: Vec<f64> = rooms.iter().map(|r| r * share).collect();

            // Several members of one sector each see the full sector headroom;
            // keep their combined add inside it.
            let mut sector_adds = vec![0.0; self.sectors.len()];
            for (s, a) in self.slots.iter().zip(&adds) {
                sector_adds[s.sector_ix] += a;
            }
            for (s, a) in self.slots.iter().zip(adds.iter_mut()) {
                let given = sector_adds[s.sector_ix];
                if given > sector_room[s.sector_ix] && given > 0.0 {
                    *a *= sector_room[s.sector_ix] / given;
                }
            }
            let crypto_add: f64 = self
                .slots
                .iter()
                .zip(&adds)
                .filter(|(s, _)| s.crypto)
                .map(|(_, a)| *a)
                .sum();
            if crypto_add > crypto_room && crypto_add > 0.0 {
                let k = crypto_room / crypto_add;
                for (s, a) in self.slots.iter().zip(adds.iter_mut()) {
                    if s.crypto {
                        *a *= k;
                    }
                }
            }

            let given: f64 = adds.iter().sum();
            if given <= 0.0 {
                break;
            }
            for (s, a) in self.slots.iter_mut().zip(&adds) {
                s.weight += a;
            }
            amount -= given;
        }
        amount.max(0.0)
    }

    fn within_caps(&self, caps: &Caps) -> bool {
        let positions_ok = self
            .slots
            .iter()
            .all(|s| s.weight <= caps.max + CAP_EPSILON && s.weight >= caps.min - CAP_EPSILON);
        let sectors_ok = self
            .sector_totals()
            .iter()
            .all(|t| *t <= caps.sector + CAP_EPSILON);
        positions_ok && sectors_ok && self.crypto_total() <= caps.crypto + CAP_EPSILON
    }

    /// Remove `amount` from the part of each weight above the floor,
    /// proportionally. Returns what could not be removed.
    fn take_back(&mut self, amount: f64, floor: f64) -> f64 {
        let above: f64 = self.slots.iter().map(|s| (s.weight - floor).max(0.0)).sum();
        if above <= 0.0 {
            return amount;
        }
        let take = amount.min(above);
        for s in &mut self.slots {
            let excess = (s.weight - floor).max(0.0);
            s.weight -= excess * take / above;
        }
        amount - take
    }

    /// Level the largest holdings down toward the floor until `gap` is
    /// removed. Returns the part of `gap` that could not be removed.
    fn trim_largest(&mut self, gap: f64, floor: f64) -> f64 {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by(|&a, &b| {
            let (sa, sb) = (&self.slots[a], &self.slots[b]);
            cmp_weight_desc(sa.weight, &sa.ticker, sb.weight, &sb.ticker)
        });

        let mut remaining = gap;
        let mut level = match order.first() {
            Some(&i) => self.slots[i].weight,
            None => return remaining,
        };
        let mut k = 1;
        while remaining > CONVERGENCE_TOLERANCE && level > floor {
            let next = if k < order.len() {
                self.slots[order[k]].weight.max(floor)
            } else {
                floor
            };
            let cost = (level - next) * k as f64;
            if cost >= remaining {
                level -= remaining / k as f64;
                remaining = 0.0;
            } else {
                level = next;
                remaining -= cost;
                if k < order.len() {
                    k += 1;
                }
            }
            for &i in &order[..k] {
                self.slots[i].weight = self.slots[i].weight.min(level);
            }
        }
        remaining
    }
}

// ─── Steps ───────────────────────────────────────────────────────────────────

fn sanitize_and_merge(
    proposal: &[ProposedHolding],
    adjustments: &mut Vec<Adjustment>,
) -> Vec<Slot> {
    let mut by_ticker: BTreeMap<String, (Slot, usize)> = BTreeMap::new();

    for (index, p) in proposal.iter().enumerate() {
        let ticker = p.ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            adjustments.push(Adjustment::BlankTickerDropped { index });
            continue;
        }
        let weight = if p.weight_pct.is_finite() && p.weight_pct >= 0.0 {
            p.weight_pct
        } else {
            adjustments.push(Adjustment::SanitizedWeight {
                ticker: ticker.clone(),
            });
            0.0
        };
        let sector = p
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SECTOR)
            .to_string();

        match by_ticker.get_mut(&ticker) {
            Some((slot, seen)) => {
                slot.proposed += weight;
                *seen += 1;
                if slot.sector == UNKNOWN_SECTOR && sector != UNKNOWN_SECTOR {
                    slot.sector = sector;
                }
            }
            None => {
                let slot = Slot {
                    ticker: ticker.clone(),
                    sector,
                    sector_ix: 0,
                    crypto: false,
                    proposed: weight,
                    weight,
                };
                by_ticker.insert(ticker, (slot, 1));
            }
        }
    }

    by_ticker
        .into_values()
        .map(|(mut slot, seen)| {
            if seen > 1 {
                adjustments.push(Adjustment::MergedDuplicate {
                    ticker: slot.ticker.clone(),
                    occurrences: seen,
                });
            }
            slot.weight = slot.proposed;
            slot.crypto = AssetClass::classify(&slot.ticker, &slot.sector) == AssetClass::Crypto;
            slot
        })
        .collect()
}

fn keep_top_n(mut slots: Vec<Slot>, n: usize, adjustments: &mut Vec<Adjustment>) -> Vec<Slot> {
    if slots.len() <= n {
        return slots;
    }
    slots.sort_by(|a, b| cmp_weight_desc(a.weight, &a.ticker, b.weight, &b.ticker));
    for dropped in slots.drain(n..) {
        adjustments.push(Adjustment::DroppedForPositionCount {
            ticker: dropped.ticker,
        });
    }
    slots.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    slots
}

fn check_capacity(book: &Book, caps: &Caps) -> Result<(), RepairFailure> {
    let mut capacity = 0.0;
    let mut equity_capacity = 0.0;
    let mut crypto_capacity = 0.0;
    let mut crypto_count = 0usize;

    for (ix, sector) in book.sectors.iter().enumerate() {
        let members: Vec<&Slot> = book.slots.iter().filter(|s| s.sector_ix == ix).collect();
        let n = members.len() as f64;
        let n_crypto = members.iter().filter(|s| s.crypto).count();
        crypto_count += n_crypto;

        if n * caps.min > caps.sector + CAP_EPSILON {
            return Err(RepairFailure::new(
                RepairReason::InfeasibleSectorCapacity,
                format!(
                    "sector '{sector}': {} holdings at the {}% floor exceed the {}% sector cap",
                    members.len(),
                    caps.min,
                    caps.sector
                ),
            ));
        }

        capacity += (n * caps.max).min(caps.sector);
        equity_capacity += ((n - n_crypto as f64) * caps.max).min(caps.sector);
        crypto_capacity += (n_crypto as f64 * caps.max).min(caps.sector);
    }

    if crypto_count as f64 * caps.min > caps.crypto + CAP_EPSILON {
        return Err(RepairFailure::new(
            RepairReason::InfeasibleSectorCapacity,
            format!(
                "{crypto_count} crypto holdings at the {}% floor exceed the {}% crypto cap",
                caps.min, caps.crypto
            ),
        ));
    }

    let feasible = capacity.min(equity_capacity + crypto_capacity.min(caps.crypto));
    if feasible < 100.0 - CAP_EPSILON {
        return Err(RepairFailure::new(
            RepairReason::InfeasibleSectorCapacity,
            format!(
                "feasible capacity {:.2}% across {} sector(s) is below 100%",
                feasible,
                book.sectors.len()
            ),
        ));
    }
    Ok(())
}

fn rebalance(book: &mut Book, caps: &Caps) {
    for _ in 0..MAX_OUTER_ROUNDS {
        book.apply_floor_and_clip(caps);
        book.scale_groups(caps);

        let gap = 100.0 - book.total();
        if gap > CONVERGENCE_TOLERANCE {
            book.redistribute(gap, caps);
        } else if gap < -CONVERGENCE_TOLERANCE {
            book.take_back(-gap, caps.min);
        }

        if book.within_caps(caps) {
            let gap = 100.0 - book.total();
            if gap.abs() <= CONVERGENCE_TOLERANCE
                || (gap > 0.0 && book.total_room(caps) <= CONVERGENCE_TOLERANCE)
            {
                break;
            }
        }
    }
}

fn close_gap(book: &mut Book, caps: &Caps) -> Result<(), RepairFailure> {
    let total = book.total();
    if total > 100.0 + CONVERGENCE_TOLERANCE {
        let left = book.trim_largest(total - 100.0, caps.min);
        if left > CONVERGENCE_TOLERANCE {
            return Err(RepairFailure::new(
                RepairReason::PostRepairConstraintsFailed,
                format!("could not trim {left:.4}% without breaching the position floor"),
            ));
        }
    } else if total < 100.0 - CONVERGENCE_TOLERANCE {
        return Err(RepairFailure::new(
            RepairReason::PostRepairConstraintsFailed,
            format!("total {total:.4}% is short of 100% and no holding has room left"),
        ));
    }
    Ok(())
}

/// Integer headroom of slot `i` for a +1 bp nudge.
fn up_room(i: usize, bps: &[Bps], book: &Book, limits: &Limits) -> Bps {
    let slot = &book.slots[i];
    let sector: Bps = book
        .slots
        .iter()
        .zip(bps)
        .filter(|(s, _)| s.sector_ix == slot.sector_ix)
        .map(|(_, b)| *b)
        .sum();
    let mut room = (limits.max_position - bps[i]).min(limits.max_sector - sector);
    if slot.crypto {
        let crypto: Bps = book
            .slots
            .iter()
            .zip(bps)
            .filter(|(s, _)| s.crypto)
            .map(|(_, b)| *b)
            .sum();
        room = room.min(limits.max_crypto - crypto);
    }
    room
}

/// Pick the holding with the most headroom; ties go to the heavier holding,
/// then the lower ticker.
fn pick_nudge(book: &Book, bps: &[Bps], headroom: impl Fn(usize) -> Bps) -> Option<usize> {
    (0..book.slots.len())
        .map(|i| (i, headroom(i)))
        .filter(|(_, room)| room.is_positive())
        .min_by(|(a, ra), (b, rb)| {
            rb.cmp(ra)
                .then_with(|| bps[*b].cmp(&bps[*a]))
                .then_with(|| book.slots[*a].ticker.cmp(&book.slots[*b].ticker))
        })
        .map(|(i, _)| i)
}

fn round_and_reconcile(book: &Book, cfg: &ConstraintConfig) -> Portfolio {
    let limits = cfg.limits();
    let mut bps: Vec<Bps> = book
        .slots
        .iter()
        .map(|s| Bps::from_pct(s.weight).unwrap_or(Bps::ZERO))
        .collect();

    let mut steps = 0;

    // Rounding can push a group a few bp over its cap; take those back first.
    for ix in 0..book.sectors.len() {
        let member = |i: usize| book.slots[i].sector_ix == ix;
        while steps < MAX_RECONCILE_STEPS {
            let total: Bps = (0..bps.len()).filter(|&i| member(i)).map(|i| bps[i]).sum();
            if total <= limits.max_sector {
                break;
            }
            let down = |i: usize| {
                if member(i) {
                    bps[i] - limits.min_position
                } else {
                    Bps::ZERO
                }
            };
            let pick = pick_nudge(book, &bps, down);
            match pick {
                Some(i) => bps[i] -= Bps::ONE,
                None => break,
            }
            steps += 1;
        }
    }
    while steps < MAX_RECONCILE_STEPS {
        let crypto: Bps = (0..bps.len())
            .filter(|&i| book.slots[i].crypto)
            .map(|i| bps[i])
            .sum();
        if crypto <= limits.max_crypto {
            break;
        }
        let down = |i: usize| {
            if book.slots[i].crypto {
                bps[i] - limits.min_position
            } else {
                Bps::ZERO
            }
        };
        let pick = pick_nudge(book, &bps, down);
        match pick {
            Some(i) => bps[i] -= Bps::ONE,
            None => break,
        }
        steps += 1;
    }

    while steps < MAX_RECONCILE_STEPS {
        let residual = Bps::FULL - bps.iter().sum::<Bps>();
        if residual == Bps::ZERO {
            break;
        }
        let pick = if residual.is_positive() {
            pick_nudge(book, &bps, |i| up_room(i, &bps, book, &limits))
        } else {
            pick_nudge(book, &bps, |i| bps[i] - limits.min_position)
        };
        match pick {
            Some(i) if residual.is_positive() => bps[i] += Bps::ONE,
            Some(i) => bps[i] -= Bps::ONE,
            None => break,
        }
        steps += 1;
    }

    let mut holdings: Vec<Holding> = book
        .slots
        .iter()
        .zip(&bps)
        .map(|(s, b)| Holding::new(s.ticker.clone(), *b, s.sector.clone()))
        .collect();
    sort_holdings_canonical(&mut holdings);
    Portfolio::new(holdings)
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Repair `proposal` against `cfg`.
///
/// Pure and deterministic: the same inputs always produce the same output,
/// regardless of proposal order. Never panics on malformed input.
pub fn repair(
    proposal: &[ProposedHolding],
    cfg: &ConstraintConfig,
) -> Result<Repaired, RepairFailure> {
    let mut adjustments = Vec::new();

    let merged = sanitize_and_merge(proposal, &mut adjustments);
    let kept = keep_top_n(merged, cfg.positions(), &mut adjustments);

    let total: f64 = kept.iter().map(|s| s.weight).sum();
    if kept.is_empty() || total <= 0.0 || !total.is_finite() {
        return Err(RepairFailure::new(
            RepairReason::EmptyOrInvalidPortfolio,
            format!(
                "{} usable holding(s) with total weight {:.4}%",
                kept.len(),
                if total.is_finite() { total } else { 0.0 }
            ),
        ));
    }

    let caps = Caps::from(cfg);
    let mut book = Book::new(kept);
    check_capacity(&book, &caps)?;

    book.normalize(total);
    rebalance(&mut book, &caps);
    close_gap(&mut book, &caps)?;

    let portfolio = round_and_reconcile(&book, cfg);

    let violations = check_portfolio(&portfolio, cfg);
    if !violations.is_empty() {
        let detail = violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RepairFailure {
            reason: RepairReason::PostRepairConstraintsFailed,
            detail,
            violations,
        });
    }

    for s in &book.slots {
        let proposed = Bps::from_pct(s.proposed).unwrap_or(Bps::ZERO);
        let repaired = portfolio.get(&s.ticker).map(|h| h.weight).unwrap_or(Bps::ZERO);
        if proposed != repaired {
            adjustments.push(Adjustment::Reweighted {
                ticker: s.ticker.clone(),
                proposed,
                repaired,
            });
        }
    }

    Ok(Repaired {
        portfolio,
        adjustments,
    })
}
