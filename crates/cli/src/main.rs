// oppsweep - funding-opportunity table maintenance
// Deletes opportunities whose deadline has passed or that were marked inactive.

mod exit_codes;
mod logging;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;

use oppsweep_reconcile::{run, OpportunityStore, ReconcileError, Report, RunOptions};
use oppsweep_store::{ConfigError, ConfigOverrides, StoreClient, StoreConfig};

use exit_codes::{config_exit_code, store_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "oppsweep")]
#[command(about = "Delete closed or expired funding opportunities from the store")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Store endpoint URL (default: SUPABASE_URL env)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Store access key (default: SUPABASE_KEY env)
    #[arg(long, global = true)]
    key: Option<String>,

    /// Table holding the opportunities (default: OPPSWEEP_TABLE env, then funding_opportunities)
    #[arg(long, global = true)]
    table: Option<String>,

    /// TOML config file (default: ~/.config/oppsweep/config.toml if present)
    #[arg(long, global = true, env = "OPPSWEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Diagnostics level on stderr (trace|debug|info|warn|error|off)
    #[arg(long, global = true, env = "OPPSWEEP_LOG", default_value = logging::DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete opportunities whose deadline has passed or that are marked inactive
    #[command(after_help = "\
Examples:
  oppsweep prune
  oppsweep prune --dry-run
  oppsweep prune --as-of 2026-01-01 --json
  SUPABASE_URL=https://abcd.supabase.co SUPABASE_KEY=... oppsweep prune")]
    Prune {
        /// Classify and report, but delete nothing
        #[arg(long)]
        dry_run: bool,

        /// Reference date for deadline comparison (default: today, local time)
        #[arg(long, value_name = "YYYY-MM-DD")]
        as_of: Option<String>,

        /// Print the run outcome as JSON instead of the text audit
        #[arg(long)]
        json: bool,
    },

    /// Print the current number of opportunities
    Count {
        /// Print {"count": N} instead of the bare number
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match logging::init_logging(&cli.log_level) {
        Ok(handle) => handle,
        Err(message) => return exit_with(CliError::args(message)),
    };

    let overrides = ConfigOverrides {
        url: cli.url,
        key: cli.key,
        table: cli.table,
        config_path: cli.config,
    };

    let result = match cli.command {
        Commands::Prune { dry_run, as_of, json } => cmd_prune(&overrides, dry_run, as_of, json),
        Commands::Count { json } => cmd_count(&overrides, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => exit_with(err),
    }
}

fn exit_with(err: CliError) -> ExitCode {
    let CliError { code, message, hint } = err;
    if !message.is_empty() {
        eprintln!("error: {}", message);
    }
    if let Some(hint) = hint {
        eprintln!("hint:  {}", hint);
    }
    ExitCode::from(code)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Create error from a config error with proper exit code.
    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Missing(_) => Some(
                "pass --url/--key, set SUPABASE_URL and SUPABASE_KEY, or add url/key to ~/.config/oppsweep/config.toml"
                    .to_string(),
            ),
            ConfigError::InvalidUrl { .. } => {
                Some("expected the project URL, e.g. https://abcd.supabase.co".to_string())
            }
            ConfigError::File { .. } => None,
        };
        Self { code: config_exit_code(&err), message: err.to_string(), hint }
    }

    /// Create error from a store error with proper exit code.
    pub fn store(err: ReconcileError) -> Self {
        let hint = match &err {
            ReconcileError::Connection { .. } => {
                Some("check the store URL, network access and access key; nothing was changed".to_string())
            }
            ReconcileError::Query { status: Some(404), .. } => {
                Some("does the table exist? use --table to select another".to_string())
            }
            ReconcileError::Query { status: Some(401 | 403), .. } => {
                Some("the key lacks permission; deletes usually need the service-role key".to_string())
            }
            ReconcileError::Query { .. } => None,
        };
        Self { code: store_exit_code(&err), message: err.to_string(), hint }
    }
}

// ============================================================================
// prune
// ============================================================================

fn cmd_prune(
    overrides: &ConfigOverrides,
    dry_run: bool,
    as_of: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    // 1. Reference date, fixed for the whole run
    let today = match as_of {
        Some(s) => parse_as_of(&s)?,
        None => Local::now().date_naive(),
    };

    // 2. Credentials, before any network call
    let client = connect(overrides)?;

    // 3. Run
    let options = RunOptions { dry_run };
    info!("event=run_start reference_date={} dry_run={}", today, dry_run);

    if json {
        let outcome = run(&client, today, options, &mut ()).map_err(CliError::store)?;
        let rendered = serde_json::to_string_pretty(&outcome)
            .map_err(|e| CliError::general(format!("cannot render JSON outcome: {}", e)))?;
        println!("{}", rendered);
    } else {
        let stdout = io::stdout();
        let mut report = Report::new(stdout.lock());
        run(&client, today, options, &mut report).map_err(CliError::store)?;
    }

    Ok(())
}

fn parse_as_of(value: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::args(format!("invalid --as-of date {:?}: {}", value, e)))
}

// ============================================================================
// count
// ============================================================================

fn cmd_count(overrides: &ConfigOverrides, json: bool) -> Result<(), CliError> {
    let client = connect(overrides)?;
    let count = client.count_opportunities().map_err(CliError::store)?;

    if json {
        println!("{}", serde_json::json!({ "count": count }));
    } else {
        println!("{}", count);
    }
    Ok(())
}

fn connect(overrides: &ConfigOverrides) -> Result<StoreClient, CliError> {
    let config = StoreConfig::load(overrides).map_err(CliError::config)?;
    info!("event=config_loaded url={} table={}", config.url, config.table);
    StoreClient::new(&config).map_err(CliError::store)
}
