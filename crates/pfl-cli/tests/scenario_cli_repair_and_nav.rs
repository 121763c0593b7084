//! Scenario: `pfl` commands end to end
//!
//! # Invariants under test
//!
//! 1. `config-hash` prints `config_hash=<64 hex>` and the canonical JSON.
//! 2. `repair` accepts a valid proposal unchanged (exit 0, status accepted).
//! 3. `repair` on an infeasible sector layout exits 0 with status fallback,
//!    reason `infeasible_sector_capacity` and the equal-weight portfolio.
//! 4. `repair` with an unknown lane fails and names the configured lanes.
//! 5. `nav` before inception prints `no_data` and touches no network.
//! 6. `nav` against a mock chart server prints the performance report.
//!
//! Each test runs the binary in a fresh temp dir so no `.env.local` leaks in.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CONFIG: &str = r#"
market_data:
  provider: yahoo
  concurrency: 2
  request_timeout_secs: 5
  lookback_days: 5
lanes:
  core:
    benchmark: SPY
    constraints:
      positions: 3
      min_position_pct: 10
      max_position_pct: 50
      max_sector_pct: 60
  tight:
    constraints:
      positions: 10
      min_position_pct: 5
      max_position_pct: 20
      max_sector_pct: 30
"#;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p
}

fn pfl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("pfl").unwrap();
    cmd.current_dir(dir.path())
        .env("RUST_LOG", "warn")
        .env_remove("PFL_CHART_BASE_URL");
    cmd
}

fn stdout_json(out: &std::process::Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// 1: config-hash
// ---------------------------------------------------------------------------

#[test]
fn config_hash_prints_hash_and_canonical_json() {
    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);

    pfl(&dir)
        .arg("config-hash")
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^config_hash=[0-9a-f]{64}\n\{").unwrap())
        .stdout(predicate::str::contains(r#""positions":3"#));
}

// ---------------------------------------------------------------------------
// 2 + 3 + 4: repair
// ---------------------------------------------------------------------------

#[test]
fn repair_accepts_valid_proposal() {
    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let proposal = write(
        dir.path(),
        "proposal.json",
        r#"{"holdings": [
            {"ticker": "AAPL", "weight_pct": 40, "sector": "Technology"},
            {"ticker": "JPM", "weight_pct": 35, "sector": "Financials"},
            {"ticker": "XOM", "weight_pct": 25, "sector": "Energy"}
        ]}"#,
    );

    let out = pfl(&dir)
        .arg("repair")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "core", "--proposal"])
        .arg(&proposal)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v = stdout_json(&out);
    assert_eq!(v["status"], "accepted");
    assert_eq!(v["portfolio"]["holdings"][0]["ticker"], "AAPL");
    assert_eq!(v["portfolio"]["holdings"][0]["weight_pct"], 40.0);
    assert!(v.get("failure").is_none());
}

#[test]
fn repair_falls_back_on_infeasible_sectors() {
    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let rows: Vec<String> = (0..10)
        .map(|i| {
            let sector = if i < 5 { "Technology" } else { "Energy" };
            format!(r#"{{"ticker": "T{i}", "weight_pct": 10, "sector": "{sector}"}}"#)
        })
        .collect();
    let proposal = write(dir.path(), "proposal.json", &format!("[{}]", rows.join(",")));

    let out = pfl(&dir)
        .arg("repair")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "tight", "--proposal"])
        .arg(&proposal)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v = stdout_json(&out);
    assert_eq!(v["status"], "fallback");
    assert_eq!(v["failure"]["failed"], true);
    assert_eq!(v["failure"]["reason"], "infeasible_sector_capacity");
    let holdings = v["portfolio"]["holdings"].as_array().unwrap();
    assert_eq!(holdings.len(), 10);
    assert!(holdings.iter().all(|h| h["weight_pct"] == 10.0));
}

#[test]
fn repair_unknown_lane_fails() {
    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let proposal = write(dir.path(), "proposal.json", "[]");

    pfl(&dir)
        .arg("repair")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "growth", "--proposal"])
        .arg(&proposal)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNKNOWN_LANE"))
        .stderr(predicate::str::contains("tight"));
}

// ---------------------------------------------------------------------------
// 5 + 6: nav
// ---------------------------------------------------------------------------

const HISTORY: &str = r#"[
    {"date": "2024-01-03", "portfolio": {"holdings": [
        {"ticker": "AAPL", "weight_pct": 100, "sector": "Technology"}
    ]}}
]"#;

#[test]
fn nav_before_inception_is_no_data() {
    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let history = write(dir.path(), "history.json", HISTORY);

    let out = pfl(&dir)
        // Nothing listens here; any request would fail the assertions below.
        .env("PFL_CHART_BASE_URL", "http://127.0.0.1:9")
        .arg("nav")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "core", "--asof", "2024-01-01", "--history"])
        .arg(&history)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let v = stdout_json(&out);
    assert_eq!(v["status"], "no_data");
    assert_eq!(v["reason"], "no_snapshots");
    assert_eq!(v["asof"], "2024-01-01");
}

fn chart_body(closes: &str) -> String {
    // 2024-01-02, 2024-01-03, 2024-01-04 session opens (New York).
    format!(
        r#"{{"chart":{{"result":[{{"meta":{{"gmtoffset":-18000}},
            "timestamp":[1704205800,1704292200,1704378600],
            "indicators":{{"quote":[{{"close":{closes}}}]}}}}],"error":null}}}}"#
    )
}

#[test]
fn nav_reports_fund_and_benchmark_against_mock_server() {
    let server = MockServer::start();
    let aapl = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/AAPL");
        then.status(200)
            .header("content-type", "application/json")
            .body(chart_body("[100.0,105.0,110.0]"));
    });
    let spy = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/SPY");
        then.status(200)
            .header("content-type", "application/json")
            .body(chart_body("[400.0,404.0,408.0]"));
    });

    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let history = write(dir.path(), "history.json", HISTORY);

    let out = pfl(&dir)
        .env("PFL_CHART_BASE_URL", server.base_url())
        .arg("nav")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "core", "--asof", "2024-01-04", "--history"])
        .arg(&history)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    aapl.assert();
    spy.assert();

    let v = stdout_json(&out);
    assert_eq!(v["inception_date"], "2024-01-03");
    assert_eq!(v["asof_price_date"], "2024-01-04");
    assert_eq!(v["fund_return_pct"], 10.0);
    assert_eq!(v["benchmark_ticker"], "SPY");
    assert_eq!(v["benchmark_return_pct"], 2.0);
    assert_eq!(v["excess_return_pct"], 8.0);
    assert_eq!(v["covered_weight_pct"], 100.0);
}

#[test]
fn nav_no_benchmark_flag_skips_benchmark() {
    let server = MockServer::start();
    let aapl = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/AAPL");
        then.status(200).body(chart_body("[100.0,105.0,110.0]"));
    });
    let spy = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/SPY");
        then.status(200).body(chart_body("[400.0,404.0,408.0]"));
    });

    let dir = TempDir::new().unwrap();
    let cfg = write(dir.path(), "base.yaml", CONFIG);
    let history = write(dir.path(), "history.json", HISTORY);

    let out = pfl(&dir)
        .env("PFL_CHART_BASE_URL", server.base_url())
        .arg("nav")
        .arg("--config")
        .arg(&cfg)
        .args(["--lane", "core", "--asof", "2024-01-04", "--no-benchmark", "--history"])
        .arg(&history)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    aapl.assert();
    spy.assert_hits(0);
    let v = stdout_json(&out);
    assert_eq!(v["benchmark_return_pct"], Value::Null);
    assert_eq!(v["fund_return_pct"], 10.0);
}
