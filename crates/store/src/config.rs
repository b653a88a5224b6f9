//! Store credentials and table selection.
//!
//! Resolved once at startup, flag > environment > config file. The config
//! file is TOML at `--config <path>`, or `~/.config/oppsweep/config.toml`
//! when present:
//!
//! ```toml
//! url = "https://abcd.supabase.co"
//! key = "service-role-key"
//! table = "funding_opportunities"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

pub const DEFAULT_TABLE: &str = "funding_opportunities";
pub const TABLE_ENV_VAR: &str = "OPPSWEEP_TABLE";

/// A value the store cannot be reached without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredKey {
    Url,
    Key,
}

impl RequiredKey {
    pub const ALL: [RequiredKey; 2] = [RequiredKey::Url, RequiredKey::Key];

    /// Environment variables consulted, in priority order.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Url => &["SUPABASE_URL", "VITE_SUPABASE_URL"],
            Self::Key => &[
                "SUPABASE_KEY",
                "SUPABASE_SERVICE_ROLE_KEY",
                "VITE_SUPABASE_ANON_KEY",
            ],
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Self::Url => "--url",
            Self::Key => "--key",
        }
    }
}

impl fmt::Display for RequiredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url => f.write_str("store URL"),
            Self::Key => f.write_str("access key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required values missing from every source.
    Missing(Vec<RequiredKey>),
    /// URL present but not an absolute http(s) URL.
    InvalidUrl { value: String, reason: String },
    /// Config file unreadable or not valid TOML.
    File { path: PathBuf, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(keys) => {
                let parts: Vec<String> = keys
                    .iter()
                    .map(|k| format!("{} (use {} or set {})", k, k.flag(), k.env_vars()[0]))
                    .collect();
                write!(f, "missing {}", parts.join(", "))
            }
            Self::InvalidUrl { value, reason } => {
                write!(f, "invalid store URL {:?}: {}", value, reason)
            }
            Self::File { path, message } => {
                write!(f, "cannot load config file {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Contents of the TOML config file. Every key is optional here; required
/// keys are checked after all sources are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub key: Option<String>,
    pub table: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Validated store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: Url,
    pub key: String,
    pub table: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url.as_str())
            .field("key", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(url: &str, key: &str, table: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_store_url(url)?,
            key: key.to_string(),
            table: table.to_string(),
        })
    }

    /// Load from flags, the process environment and the config file.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config_path {
            Some(path) => Some(load_config_file(path)?),
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Some(load_config_file(&path)?),
                None => None,
            },
        };
        Self::resolve(overrides, |name| std::env::var(name).ok(), file.as_ref())
    }

    /// Merge sources and validate. `env` looks up one variable by name.
    pub fn resolve(
        overrides: &ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
        file: Option<&ConfigFile>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: RequiredKey, flag: &Option<String>, from_file: Option<&String>| {
            non_empty(flag.as_deref())
                .or_else(|| {
                    key.env_vars()
                        .iter()
                        .find_map(|name| non_empty(env(name).as_deref()))
                })
                .or_else(|| non_empty(from_file.map(String::as_str)))
        };

        let url = lookup(RequiredKey::Url, &overrides.url, file.and_then(|f| f.url.as_ref()));
        let key = lookup(RequiredKey::Key, &overrides.key, file.and_then(|f| f.key.as_ref()));

        let missing: Vec<RequiredKey> = RequiredKey::ALL
            .into_iter()
            .zip([url.is_none(), key.is_none()])
            .filter_map(|(k, absent)| absent.then_some(k))
            .collect();

        let (Some(url), Some(key)) = (url, key) else {
            return Err(ConfigError::Missing(missing));
        };

        let table = non_empty(overrides.table.as_deref())
            .or_else(|| non_empty(env(TABLE_ENV_VAR).as_deref()))
            .or_else(|| non_empty(file.and_then(|f| f.table.as_deref())))
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());

        Self::new(&url, &key, &table)
    }
}

/// `~/.config/oppsweep/config.toml` (platform config dir).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("oppsweep/config.toml"))
}

pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::File {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_store_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            value: value.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}
