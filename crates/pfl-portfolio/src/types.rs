use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::bps::Bps;

/// Sector label used when a proposal omits one.
pub const UNKNOWN_SECTOR: &str = "UNKNOWN";

// ─── Proposal input ──────────────────────────────────────────────────────────

/// One line of a proposed portfolio, exactly as emitted by the upstream
/// decision process.
///
/// Nothing here is trusted: the ticker may be blank or duplicated, the weight
/// may be negative, non-finite, a numeric string (`"12.5%"`) or missing, and
/// the sector may be absent. The repair engine sanitizes every field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProposedHolding {
    #[serde(default)]
    pub ticker: String,
    #[serde(default = "nan", deserialize_with = "lenient_pct")]
    pub weight_pct: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

impl ProposedHolding {
    pub fn new<T: Into<String>, S: Into<String>>(ticker: T, weight_pct: f64, sector: S) -> Self {
        Self {
            ticker: ticker.into(),
            weight_pct,
            sector: Some(sector.into()),
        }
    }
}

fn nan() -> f64 {
    f64::NAN
}

// Accept numbers, numeric strings ("12.5", "12.5%") and null. Anything else
// becomes NaN and is sanitized to zero weight by the repair engine.
fn lenient_pct<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

// ─── Holdings / Portfolio ────────────────────────────────────────────────────

/// A position in a recorded portfolio.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    #[serde(rename = "weight_pct")]
    pub weight: Bps,
    #[serde(default = "unknown_sector")]
    pub sector: String,
}

fn unknown_sector() -> String {
    UNKNOWN_SECTOR.to_string()
}

impl Holding {
    pub fn new<T: Into<String>, S: Into<String>>(ticker: T, weight: Bps, sector: S) -> Self {
        Self {
            ticker: ticker.into(),
            weight,
            sector: sector.into(),
        }
    }

    pub fn asset_class(&self) -> AssetClass {
        AssetClass::classify(&self.ticker, &self.sector)
    }
}

/// A set of holdings. Post-repair the holdings are unique by ticker, exactly
/// `positions` long and sum to [`Bps::FULL`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self { holdings }
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total(&self) -> Bps {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    pub fn get(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker == ticker)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.holdings.iter().map(|h| h.ticker.as_str())
    }

    /// Sector → total weight, in sector-name order.
    pub fn sector_totals(&self) -> BTreeMap<&str, Bps> {
        let mut out: BTreeMap<&str, Bps> = BTreeMap::new();
        for h in &self.holdings {
            *out.entry(h.sector.as_str()).or_insert(Bps::ZERO) += h.weight;
        }
        out
    }

    /// Total weight of holdings classified as [`AssetClass::Crypto`].
    pub fn crypto_total(&self) -> Bps {
        self.holdings
            .iter()
            .filter(|h| h.asset_class() == AssetClass::Crypto)
            .map(|h| h.weight)
            .sum()
    }
}

// ─── Asset class ─────────────────────────────────────────────────────────────

/// Coarse asset class used for the class-level cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Crypto,
}

impl AssetClass {
    /// Crypto when the sector mentions crypto or the ticker is a `-USD` pair
    /// (`BTC-USD`). Everything else is treated as equity.
    pub fn classify(ticker: &str, sector: &str) -> AssetClass {
        let sector_lc = sector.to_ascii_lowercase();
        if sector_lc.contains("crypto") || ticker.to_ascii_uppercase().ends_with("-USD") {
            AssetClass::Crypto
        } else {
            AssetClass::Equity
        }
    }
}

// ─── ConstraintConfig ────────────────────────────────────────────────────────

/// Why a [`ConstraintConfig`] was rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    ZeroPositions,
    NonFinite { field: &'static str },
    NonPositiveMinPosition { min: f64 },
    MinAboveMax { min: f64, max: f64 },
    MaxPositionAboveTotal { max: f64 },
    FloorsExceedTotal { min: f64, positions: usize },
    NonPositiveSectorCap { cap: f64 },
    NegativeCryptoCap { cap: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroPositions => write!(f, "positions must be >= 1"),
            Self::NonFinite { field } => write!(f, "{field} must be a finite number"),
            Self::NonPositiveMinPosition { min } => {
                write!(f, "min_position_pct {min} must be > 0")
            }
            Self::MinAboveMax { min, max } => {
                write!(f, "min_position_pct {min} exceeds max_position_pct {max}")
            }
            Self::MaxPositionAboveTotal { max } => {
                write!(f, "max_position_pct {max} exceeds 100")
            }
            Self::FloorsExceedTotal { min, positions } => write!(
                f,
                "min_position_pct {min} x {positions} positions exceeds 100"
            ),
            Self::NonPositiveSectorCap { cap } => write!(f, "max_sector_pct {cap} must be > 0"),
            Self::NegativeCryptoCap { cap } => write!(f, "max_crypto_pct {cap} must be >= 0"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Slack allowed on `min_position_pct * positions <= 100`.
const FLOOR_TOTAL_SLACK_PCT: f64 = 0.0001;

/// Cap configuration for one lane.
///
/// Only constructible through [`ConstraintConfig::new`] (or deserialization,
/// which routes through it), so every instance satisfies
/// `0 < min <= max <= 100` and `min * positions <= 100.0001`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConstraintConfigFields", into = "ConstraintConfigFields")]
pub struct ConstraintConfig {
    positions: usize,
    min_position_pct: f64,
    max_position_pct: f64,
    max_sector_pct: f64,
    max_crypto_pct: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstraintConfigFields {
    positions: usize,
    min_position_pct: f64,
    max_position_pct: f64,
    max_sector_pct: f64,
    #[serde(default = "no_crypto_cap")]
    max_crypto_pct: f64,
}

fn no_crypto_cap() -> f64 {
    100.0
}

impl TryFrom<ConstraintConfigFields> for ConstraintConfig {
    type Error = ConfigError;

    fn try_from(f: ConstraintConfigFields) -> Result<Self, Self::Error> {
        ConstraintConfig::new(
            f.positions,
            f.min_position_pct,
            f.max_position_pct,
            f.max_sector_pct,
            f.max_crypto_pct,
        )
    }
}

impl From<ConstraintConfig> for ConstraintConfigFields {
    fn from(c: ConstraintConfig) -> Self {
        Self {
            positions: c.positions,
            min_position_pct: c.min_position_pct,
            max_position_pct: c.max_position_pct,
            max_sector_pct: c.max_sector_pct,
            max_crypto_pct: c.max_crypto_pct,
        }
    }
}

impl ConstraintConfig {
    pub fn new(
        positions: usize,
        min_position_pct: f64,
        max_position_pct: f64,
        max_sector_pct: f64,
        max_crypto_pct: f64,
    ) -> Result<Self, ConfigError> {
        for (field, v) in [
            ("min_position_pct", min_position_pct),
            ("max_position_pct", max_position_pct),
            ("max_sector_pct", max_sector_pct),
            ("max_crypto_pct", max_crypto_pct),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if positions == 0 {
            return Err(ConfigError::ZeroPositions);
        }
        if min_position_pct <= 0.0 {
            return Err(ConfigError::NonPositiveMinPosition {
                min: min_position_pct,
            });
        }
        if min_position_pct > max_position_pct {
            return Err(ConfigError::MinAboveMax {
                min: min_position_pct,
                max: max_position_pct,
            });
        }
        if max_position_pct > 100.0 {
            return Err(ConfigError::MaxPositionAboveTotal {
                max: max_position_pct,
            });
        }
        if min_position_pct * positions as f64 > 100.0 + FLOOR_TOTAL_SLACK_PCT {
            return Err(ConfigError::FloorsExceedTotal {
                min: min_position_pct,
                positions,
            });
        }
        if max_sector_pct <= 0.0 {
            return Err(ConfigError::NonPositiveSectorCap {
                cap: max_sector_pct,
            });
        }
        if max_crypto_pct < 0.0 {
            return Err(ConfigError::NegativeCryptoCap {
                cap: max_crypto_pct,
            });
        }
        Ok(Self {
            positions,
            min_position_pct,
            max_position_pct,
            max_sector_pct,
            max_crypto_pct,
        })
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn min_position_pct(&self) -> f64 {
        self.min_position_pct
    }

    pub fn max_position_pct(&self) -> f64 {
        self.max_position_pct
    }

    pub fn max_sector_pct(&self) -> f64 {
        self.max_sector_pct
    }

    pub fn max_crypto_pct(&self) -> f64 {
        self.max_crypto_pct
    }

    /// The same caps in basis points, as used by validation and rounding.
    pub fn limits(&self) -> Limits {
        Limits {
            min_position: pct_limit(self.min_position_pct),
            max_position: pct_limit(self.max_position_pct),
            max_sector: pct_limit(self.max_sector_pct),
            max_crypto: pct_limit(self.max_crypto_pct),
        }
    }
}

// Config values are validated finite and within [0, 100], so the conversion
// cannot fail; the fallback only exists to keep this total.
fn pct_limit(pct: f64) -> Bps {
    Bps::from_pct(pct).unwrap_or(Bps::ZERO)
}

/// Integer view of a [`ConstraintConfig`]'s caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub min_position: Bps,
    pub max_position: Bps,
    pub max_sector: Bps,
    pub max_crypto: Bps,
}
