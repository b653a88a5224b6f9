//! Stderr logging bootstrap.
//!
//! stdout carries the audit report; diagnostics go to stderr through the
//! `log` facade. Our own crates log at the requested level, third-party
//! crates (reqwest, hyper) stay at `warn`.

use flexi_logger::{Logger, LoggerHandle};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

const OWN_MODULES: [&str; 3] = ["oppsweep", "oppsweep_reconcile", "oppsweep_store"];

/// Start the stderr logger. The returned handle must stay alive for the
/// life of the process.
pub fn init_logging(level: &str) -> Result<LoggerHandle, String> {
    let level = normalize_level(level)?;
    let spec = log_spec(level);

    Logger::try_with_str(&spec)
        .map_err(|err| format!("invalid log specification `{spec}`: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))
}

fn log_spec(level: &str) -> String {
    let own: Vec<String> = OWN_MODULES
        .iter()
        .map(|module| format!("{module}={level}"))
        .collect();
    format!("warn, {}", own.join(", "))
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        "off" => Ok("off"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error|off"
        )),
    }
}
