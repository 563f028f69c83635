//! Layered configuration
//!
//! Defaults, then `skirmish.toml` in the working directory (if present),
//! then `SKIRMISH_`-prefixed environment variables.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::DEFAULT_RECENT_LOG_ENTRIES;

/// Config file read from the working directory
pub const CONFIG_FILE: &str = "skirmish.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SKIRMISH_";

/// Engine and binary configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path; None means in-memory
    pub db_path: Option<String>,
    /// Fallback tracing filter when RUST_LOG is unset
    pub log_filter: String,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
    /// Rounds after which a simulated encounter is abandoned
    pub max_rounds: u32,
    /// Log entries included in a combat status view
    pub recent_log_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            log_filter: "skirmish=info".to_string(),
            log_json: false,
            max_rounds: 100,
            recent_log_entries: DEFAULT_RECENT_LOG_ENTRIES,
        }
    }
}

impl Config {
    /// Provider chain used by [`Config::load`]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load configuration from defaults, file and environment
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}
