//! Command handler modules for pfl-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod nav;
pub mod repair;

use anyhow::{Context, Result};
use pfl_config::{
    load_layered_yaml, report_unused_keys, CommandMode, LoadedConfig, PflConfig, UnusedKeyPolicy,
};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load, guard and type the layered config for `mode`.
pub fn load_config(
    paths: &[String],
    mode: CommandMode,
    strict: bool,
) -> Result<(LoadedConfig, PflConfig)> {
    let loaded = load_layered_yaml(paths)?;
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(mode, &loaded.config_json, policy)?;
    if !report.is_clean() {
        warn!(
            mode = report.mode.as_str(),
            unused = ?report.unused_leaf_pointers,
            "config contains keys this command does not read"
        );
    }
    let cfg = PflConfig::from_loaded(&loaded)?;
    info!(config_hash = %loaded.config_hash, mode = mode.as_str(), "config loaded");
    Ok((loaded, cfg))
}

/// Read a JSON file, tolerating a UTF-8 BOM.
pub fn read_json_file(path: &str, what: &str) -> Result<Value> {
    let bytes = fs::read(path).with_context(|| format!("read {what} failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let raw = std::str::from_utf8(bytes).with_context(|| format!("{what} must be UTF-8 text"))?;
    serde_json::from_str(raw.trim()).with_context(|| format!("{what} must contain valid JSON"))
}

/// Pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize output json failed")?;
    println!("{s}");
    Ok(())
}
