//! Store adapter: PostgREST/Supabase access for the opportunity table.
//!
//! Implements `OpportunityStore` from `oppsweep-reconcile` over REST:
//! projected read, bulk delete by id set, exact count.
//!
//! No retries. No global client: construct a [`StoreClient`] and pass it in.

mod client;
mod config;

pub use client::{in_filter, parse_content_range_total, StoreClient};
pub use config::{
    default_config_path, load_config_file, ConfigError, ConfigFile, ConfigOverrides,
    RequiredKey, StoreConfig, DEFAULT_TABLE, TABLE_ENV_VAR,
};
