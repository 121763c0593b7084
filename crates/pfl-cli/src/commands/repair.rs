//! `pfl repair`: validate, auto-correct or replace a proposed portfolio.
//!
//! Every outcome is a structured decision on stdout with exit code 0; only IO
//! and config problems fail the command.

use anyhow::{bail, Result};
use pfl_config::CommandMode;
use pfl_portfolio::{check_portfolio, repair_or_fallback, ProposedHolding, RepairStatus};
use serde_json::Value;
use tracing::{info, warn};

use super::{load_config, print_json, read_json_file};

pub struct RepairArgs {
    pub config_paths: Vec<String>,
    pub lane: String,
    pub proposal_path: String,
    pub strict_config: bool,
}

/// Accept either a bare list of rows or `{holdings: [...]}`.
///
/// A row that is not even shaped like a holding becomes a blank row, so the
/// repair engine reports it as dropped at its original index.
pub fn parse_proposal(v: Value) -> Result<Vec<ProposedHolding>> {
    let rows = match v {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("holdings") {
            Some(Value::Array(rows)) => rows,
            _ => bail!("proposal object must carry a `holdings` array"),
        },
        _ => bail!("proposal must be a JSON array or an object with `holdings`"),
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).unwrap_or_else(|_| ProposedHolding {
                ticker: String::new(),
                weight_pct: f64::NAN,
                sector: None,
            })
        })
        .collect())
}

pub fn run_repair(args: RepairArgs) -> Result<()> {
    let (_loaded, cfg) = load_config(&args.config_paths, CommandMode::Repair, args.strict_config)?;
    let lane = cfg.lane(&args.lane)?;

    let proposal = parse_proposal(read_json_file(&args.proposal_path, "proposal")?)?;
    let decision = repair_or_fallback(&proposal, &lane.constraints, &lane.fallback_universe);

    match decision.status {
        RepairStatus::Accepted => info!(lane = %args.lane, "proposal accepted"),
        RepairStatus::AutoCorrected => info!(
            lane = %args.lane,
            adjustments = decision.adjustments.len(),
            "proposal auto-corrected"
        ),
        RepairStatus::Fallback => warn!(
            lane = %args.lane,
            reason = decision.failure.as_ref().map(|f| f.reason.as_str()).unwrap_or("-"),
            detail = decision.failure.as_ref().map(|f| f.detail.as_str()).unwrap_or("-"),
            "proposal replaced by equal-weight fallback"
        ),
    }

    if decision.status == RepairStatus::Fallback {
        let violations = check_portfolio(&decision.portfolio, &lane.constraints);
        if !violations.is_empty() {
            warn!(
                lane = %args.lane,
                ?violations,
                "equal-weight fallback breaches lane caps"
            );
        }
    }

    print_json(&decision)
}
