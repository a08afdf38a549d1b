use clap::{ArgAction, Args};
use std::env;
use tracing_subscriber::EnvFilter;

const CRATE_TARGET: &str = "object_placer";

#[derive(Debug, Clone, Default, Args)]
pub struct LogArgs {
    /// Log everything, including per-row decisions
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,
    /// Log scrolls, skips and placements
    #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,
    /// Log level for this tool (error|warn|info|debug|trace)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Raw tracing filter directive, overrides the other log flags
    #[arg(long)]
    pub log_filter: Option<String>,
}

fn level_spec_for(level: &str) -> String {
    format!("{CRATE_TARGET}={}", level.to_ascii_lowercase())
}

/// Precedence: `--log-filter`, `--trace`, `--debug`, `--log-level`, then
/// `RUST_LOG`, falling back to `info` for this crate.
pub fn compute_spec(args: &LogArgs, rust_log: Option<&str>) -> String {
    if let Some(spec) = args.log_filter.as_deref() {
        return spec.to_string();
    }
    if args.trace {
        return level_spec_for("trace");
    }
    if args.debug {
        return level_spec_for("debug");
    }
    if let Some(level) = args.log_level.as_deref() {
        return level_spec_for(level);
    }
    match rust_log {
        Some(spec) if !spec.trim().is_empty() => spec.to_string(),
        _ => level_spec_for("info"),
    }
}

/// Install the global subscriber. Logs go to stderr; stdout carries the
/// dry-run trace and the JSON report.
pub fn init(args: &LogArgs) {
    let rust_log = env::var("RUST_LOG").ok();
    let spec = compute_spec(args, rust_log.as_deref());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(spec))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
