//! Basis-point weight type.
//!
//! # Motivation
//!
//! Portfolio weights cross two boundaries: they arrive as free-form decimal
//! percentages from the proposal step and they leave as 2dp percentages in
//! recorded snapshots. Rounding, residual reconciliation and constraint
//! validation all happen in between, and they must agree with each other to
//! the last hundredth of a percent.
//!
//! `Bps` wraps an `i64` count of basis points so the discrete phase of repair
//! and every constraint check run on exact integers. Continuous math (the
//! proportional redistribution loop) stays in `f64` percentages and converts
//! exactly once via [`Bps::from_pct`].
//!
//! # Scale
//!
//! `Bps(1)` is 0.01 percentage point; a fully invested portfolio is
//! [`Bps::FULL`] (`10_000`).
//!
//! # Serde
//!
//! Serialized as a decimal percentage (`1234` → `12.34`) so the wire format
//! stays `weight_pct`. Deserialization rounds to the nearest basis point.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Basis points per percentage point.
pub const BPS_PER_PCT: i64 = 100;

/// A portfolio weight in basis points (1e-4 of portfolio value).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bps(i64);

impl Bps {
    pub const ZERO: Bps = Bps(0);

    /// 100.00 %.
    pub const FULL: Bps = Bps(10_000);

    /// One hundredth of a percentage point.
    pub const ONE: Bps = Bps(1);

    #[inline]
    pub const fn new(raw: i64) -> Self {
        Bps(raw)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Convert a decimal percentage (`12.34`) to basis points, rounding half
    /// away from zero.
    ///
    /// Returns `None` for non-finite input or values outside the `i64` range.
    pub fn from_pct(pct: f64) -> Option<Bps> {
        if !pct.is_finite() {
            return None;
        }
        let scaled = (pct * BPS_PER_PCT as f64).round();
        if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
            return None;
        }
        Some(Bps(scaled as i64))
    }

    /// Decimal percentage view (`1234` → `12.34`).
    #[inline]
    pub fn as_pct(self) -> f64 {
        self.0 as f64 / BPS_PER_PCT as f64
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Bps {
    type Output = Bps;
    #[inline]
    fn add(self, rhs: Bps) -> Bps {
        Bps(self.0 + rhs.0)
    }
}

impl Sub for Bps {
    type Output = Bps;
    #[inline]
    fn sub(self, rhs: Bps) -> Bps {
        Bps(self.0 - rhs.0)
    }
}

impl AddAssign for Bps {
    #[inline]
    fn add_assign(&mut self, rhs: Bps) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Bps {
    #[inline]
    fn sub_assign(&mut self, rhs: Bps) {
        self.0 -= rhs.0;
    }
}

impl Sum for Bps {
    fn sum<I: Iterator<Item = Bps>>(iter: I) -> Bps {
        iter.fold(Bps::ZERO, |acc, b| acc + b)
    }
}

impl<'a> Sum<&'a Bps> for Bps {
    fn sum<I: Iterator<Item = &'a Bps>>(iter: I) -> Bps {
        iter.fold(Bps::ZERO, |acc, b| acc + *b)
    }
}

impl std::fmt::Display for Bps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / BPS_PER_PCT;
        let frac = (self.0 % BPS_PER_PCT).abs();
        // -0.xx would otherwise lose its sign through the integer division.
        if self.0 < 0 && whole == 0 {
            write!(f, "-{whole}.{frac:02}")
        } else {
            write!(f, "{whole}.{frac:02}")
        }
    }
}

impl Serialize for Bps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_pct())
    }
}

impl<'de> Deserialize<'de> for Bps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pct = f64::deserialize(deserializer)?;
        Bps::from_pct(pct)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid weight_pct {pct}")))
    }
}
