//! CLI Exit Code Registry
//!
//! Single source of truth for `oppsweep` exit codes. Cron jobs and
//! wrapper scripts key off these values.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                                  |
//! |---------|-------------|----------------------------------------------|
//! | 0       | Universal   | Success (including "nothing to delete")      |
//! | 1       | Universal   | General error (unspecified)                  |
//! | 2       | Universal   | CLI usage error (bad args)                   |
//! | 10-19   | config      | Missing or invalid credentials/config file   |
//! | 20-29   | store       | Store unreachable or operation rejected      |

use oppsweep_reconcile::ReconcileError;
use oppsweep_store::ConfigError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - run completed, whether or not anything was deleted.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments (e.g. malformed `--as-of`).
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (10-19)
// =============================================================================

/// Store URL or access key missing from flags, environment and config file.
pub const EXIT_CONFIG_MISSING: u8 = 10;

/// Store URL is not an absolute http(s) URL.
pub const EXIT_CONFIG_INVALID: u8 = 11;

/// Config file named but unreadable or not valid TOML.
pub const EXIT_CONFIG_FILE: u8 = 12;

// =============================================================================
// Store (20-29)
// =============================================================================

/// Store unreachable (DNS, refused, TLS) or credentials rejected.
pub const EXIT_STORE_CONNECT: u8 = 20;

/// Store reachable but rejected the operation, or answered unexpectedly.
pub const EXIT_STORE_QUERY: u8 = 21;

/// Map a ConfigError to its exit code.
pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Missing(_) => EXIT_CONFIG_MISSING,
        ConfigError::InvalidUrl { .. } => EXIT_CONFIG_INVALID,
        ConfigError::File { .. } => EXIT_CONFIG_FILE,
    }
}

/// Map a ReconcileError to its exit code.
pub fn store_exit_code(err: &ReconcileError) -> u8 {
    match err {
        ReconcileError::Connection { .. } => EXIT_STORE_CONNECT,
        ReconcileError::Query { .. } => EXIT_STORE_QUERY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_codes_are_distinct_from_store_codes() {
        let missing = config_exit_code(&ConfigError::Missing(vec![]));
        let connect = store_exit_code(&ReconcileError::Connection {
            operation: "list opportunities",
            message: "refused".into(),
        });
        let query = store_exit_code(&ReconcileError::Query {
            operation: "list opportunities",
            status: Some(400),
            detail: "bad filter".into(),
        });
        assert_eq!(missing, EXIT_CONFIG_MISSING);
        assert_eq!(connect, EXIT_STORE_CONNECT);
        assert_eq!(query, EXIT_STORE_QUERY);
        assert_ne!(missing, connect);
    }
}
