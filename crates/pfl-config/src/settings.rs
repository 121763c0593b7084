//! Typed view over the merged config JSON.
//!
//! ```yaml
//! market_data:
//!   provider: yahoo
//!   concurrency: 6
//!   request_timeout_secs: 10
//!   fetch_deadline_secs: 60
//!   lookback_days: 10
//! lanes:
//!   core:
//!     benchmark: SPY
//!     constraints:
//!       positions: 10
//!       min_position_pct: 5
//!       max_position_pct: 20
//!       max_sector_pct: 30
//!       max_crypto_pct: 10
//! ```

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use pfl_portfolio::{default_reference_universe, ConstraintConfig, ReferenceTicker};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoadedConfig;

/// Env var overriding `market_data.base_url` (mock servers, proxies).
pub const CHART_BASE_URL_ENV: &str = "PFL_CHART_BASE_URL";

const SUPPORTED_PROVIDERS: &[&str] = &["yahoo"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketDataConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// `None` uses the provider's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Budget for the whole fetch phase. `None` waits for every request.
    #[serde(default)]
    pub fetch_deadline_secs: Option<u64>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_provider() -> String {
    "yahoo".to_string()
}

fn default_concurrency() -> usize {
    6
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_lookback_days() -> u32 {
    10
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            fetch_deadline_secs: None,
            lookback_days: default_lookback_days(),
        }
    }
}

impl MarketDataConfig {
    /// Replace `base_url` when `url` is present.
    pub fn with_base_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.base_url = Some(url);
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.as_str()) {
            bail!(
                "CONFIG_INVALID market_data.provider='{}'; expected one of: {}",
                self.provider,
                SUPPORTED_PROVIDERS.join(" | ")
            );
        }
        if self.concurrency == 0 {
            bail!("CONFIG_INVALID market_data.concurrency must be >= 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("CONFIG_INVALID market_data.request_timeout_secs must be >= 1");
        }
        Ok(())
    }
}

/// One fund lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaneConfig {
    #[serde(default)]
    pub benchmark: Option<String>,
    pub constraints: ConstraintConfig,
    #[serde(default = "default_reference_universe")]
    pub fallback_universe: Vec<ReferenceTicker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PflConfig {
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub lanes: BTreeMap<String, LaneConfig>,
}

impl PflConfig {
    /// Deserialize and validate. Only `market_data` and `lanes` are read;
    /// other sections are left to the unused-key guard.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let market_data = match config_json.get("market_data") {
            None | Some(Value::Null) => MarketDataConfig::default(),
            Some(v) => MarketDataConfig::deserialize(v).context("CONFIG_INVALID market_data")?,
        };
        market_data.validate()?;

        let mut lanes = BTreeMap::new();
        if let Some(raw) = config_json.get("lanes").filter(|v| !v.is_null()) {
            let map = raw.as_object().ok_or_else(|| {
                anyhow!("CONFIG_INVALID lanes must be a mapping of lane id -> lane")
            })?;
            for (id, v) in map {
                let lane = LaneConfig::deserialize(v)
                    .with_context(|| format!("CONFIG_INVALID lanes.{id}"))?;
                if lane.fallback_universe.len() < lane.constraints.positions() {
                    bail!(
                        "CONFIG_INVALID lanes.{id}.fallback_universe has {} tickers; \
                         constraints.positions needs at least {}",
                        lane.fallback_universe.len(),
                        lane.constraints.positions()
                    );
                }
                lanes.insert(id.clone(), lane);
            }
        }

        Ok(Self { market_data, lanes })
    }

    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_config_json(&loaded.config_json)
    }

    pub fn lane(&self, id: &str) -> Result<&LaneConfig> {
        self.lanes.get(id).ok_or_else(|| {
            let known: Vec<&str> = self.lanes.keys().map(String::as_str).collect();
            anyhow!("CONFIG_UNKNOWN_LANE lane='{id}'; configured lanes: {known:?}")
        })
    }
}

/// Non-blank value of [`CHART_BASE_URL_ENV`].
pub fn chart_base_url_from_env() -> Option<String> {
    match std::env::var(CHART_BASE_URL_ENV) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}
