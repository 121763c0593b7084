//! `pfl nav`: benchmark-relative performance of a lane since inception.
//!
//! Prints the `PerformanceReport` JSON, or a `no_data` status object when no
//! snapshot applies or a segment priced nothing. Both exit 0.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use pfl_config::{chart_base_url_from_env, CommandMode, MarketDataConfig};
use pfl_md::yahoo::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use pfl_md::{FetchOptions, YahooChartProvider};
use pfl_nav::{evaluate, NavOptions, SnapshotHistory};
use serde::Serialize;
use tracing::{info, warn};

use super::{load_config, print_json, read_json_file};

pub struct NavArgs {
    pub config_paths: Vec<String>,
    pub lane: String,
    pub history_path: String,
    pub asof: String,
    pub benchmark: Option<String>,
    pub no_benchmark: bool,
    pub strict_config: bool,
}

#[derive(Debug, Serialize)]
struct NoData<'a> {
    status: &'static str,
    reason: &'static str,
    detail: String,
    lane: &'a str,
    asof: NaiveDate,
}

/// `--no-benchmark` wins, then `--benchmark`, then the lane's own.
pub fn choose_benchmark(
    flag: Option<&str>,
    no_benchmark: bool,
    lane_default: Option<&str>,
) -> Option<String> {
    if no_benchmark {
        return None;
    }
    flag.or(lane_default)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn nav_options(md: &MarketDataConfig) -> NavOptions {
    let mut fetch = FetchOptions::default().with_concurrency(md.concurrency);
    if let Some(secs) = md.fetch_deadline_secs {
        fetch = fetch.with_deadline_in(Duration::from_secs(secs));
    }
    NavOptions {
        lookback_days: md.lookback_days,
        fetch,
    }
}

pub async fn run_nav(args: NavArgs) -> Result<()> {
    let (_loaded, cfg) = load_config(&args.config_paths, CommandMode::Nav, args.strict_config)?;
    let lane = cfg.lane(&args.lane)?;

    let asof = NaiveDate::parse_from_str(args.asof.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid --asof '{}', expected YYYY-MM-DD", args.asof))?;

    let history: SnapshotHistory =
        serde_json::from_value(read_json_file(&args.history_path, "history")?)
            .context("history must be a list of {date, portfolio} snapshots")?;

    let benchmark = choose_benchmark(
        args.benchmark.as_deref(),
        args.no_benchmark,
        lane.benchmark.as_deref(),
    );

    let md = cfg
        .market_data
        .clone()
        .with_base_url_override(chart_base_url_from_env());
    let provider = YahooChartProvider::with_options(
        md.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        Duration::from_secs(md.request_timeout_secs),
        DEFAULT_USER_AGENT,
    )
    .context("chart provider setup failed")?;

    info!(
        lane = %args.lane,
        %asof,
        snapshots = history.len(),
        benchmark = benchmark.as_deref().unwrap_or("-"),
        "nav requested"
    );

    match evaluate(
        &provider,
        &history,
        asof,
        benchmark.as_deref(),
        &nav_options(&md),
    )
    .await
    {
        Ok(report) => print_json(&report),
        Err(e) => {
            warn!(lane = %args.lane, %asof, reason = e.reason(), "nav has no data");
            print_json(&NoData {
                status: "no_data",
                reason: e.reason(),
                detail: e.to_string(),
                lane: &args.lane,
                asof,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_precedence() {
        assert_eq!(choose_benchmark(None, false, Some("SPY")).as_deref(), Some("SPY"));
        assert_eq!(
            choose_benchmark(Some("QQQ"), false, Some("SPY")).as_deref(),
            Some("QQQ")
        );
        assert_eq!(choose_benchmark(Some("QQQ"), true, Some("SPY")), None);
        assert_eq!(choose_benchmark(Some("  "), false, None), None);
    }

    #[test]
    fn market_data_maps_onto_nav_options() {
        let md = MarketDataConfig {
            concurrency: 3,
            lookback_days: 5,
            ..MarketDataConfig::default()
        };
        let opts = nav_options(&md);
        assert_eq!(opts.lookback_days, 5);
        assert_eq!(opts.fetch.concurrency, 3);
        assert!(opts.fetch.deadline.is_none());

        let md = MarketDataConfig {
            fetch_deadline_secs: Some(30),
            ..MarketDataConfig::default()
        };
        assert!(nav_options(&md).fetch.deadline.is_some());
    }
}
