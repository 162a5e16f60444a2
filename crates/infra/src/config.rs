//! Configuration loading and representation.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. optional TOML file (`labstock.toml`, or the path given on the command
//!    line / in `LABSTOCK_CONFIG`)
//! 3. `LABSTOCK__*` environment variables (`LABSTOCK__LOCKS__TIMEOUT_MS=250`)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use labstock_auth::{CredentialEntry, CredentialTable};

pub const DEFAULT_CONFIG_FILE: &str = "labstock.toml";
pub const ENV_PREFIX: &str = "LABSTOCK";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Store locations. Unset paths are derived from `data_dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub data_dir: PathBuf,
    pub ledger_dir: Option<PathBuf>,
    pub requests: Option<PathBuf>,
    pub arrivals: Option<PathBuf>,
    pub dispatches: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub journal: Option<PathBuf>,
    pub lab_data: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            ledger_dir: None,
            requests: None,
            arrivals: None,
            dispatches: None,
            history: None,
            journal: None,
            lab_data: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub timeout_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
        }
    }
}

impl LockSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Materials always shown in the balance overview.
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub stores: StoreSettings,
    pub locks: LockSettings,
    pub inventory: InventorySettings,
    pub users: HashMap<String, CredentialEntry>,
}

impl Settings {
    /// Load settings. With `path = None` the default file is optional; an
    /// explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn store_paths(&self) -> StorePaths {
        StorePaths::from_settings(&self.stores)
    }

    pub fn credential_table(&self) -> CredentialTable {
        CredentialTable::new(self.users.clone())
    }
}

/// Resolved location of every logical store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub ledger_dir: PathBuf,
    pub requests: PathBuf,
    pub arrivals: PathBuf,
    pub dispatches: PathBuf,
    pub history: PathBuf,
    pub journal: PathBuf,
    pub lab_data: PathBuf,
}

impl StorePaths {
    /// All stores under one directory, with the default file names.
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        Self::from_settings(&StoreSettings {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..StoreSettings::default()
        })
    }

    pub fn from_settings(stores: &StoreSettings) -> Self {
        let dir = &stores.data_dir;
        let pick = |explicit: &Option<PathBuf>, default: &str| {
            explicit.clone().unwrap_or_else(|| dir.join(default))
        };
        Self {
            ledger_dir: pick(&stores.ledger_dir, "ledger"),
            requests: pick(&stores.requests, "inventory_requests.csv"),
            arrivals: pick(&stores.arrivals, "tanker_arrivals.csv"),
            dispatches: pick(&stores.dispatches, "tanker_dispatches.csv"),
            history: pick(&stores.history, "tanker_history.csv"),
            journal: pick(&stores.journal, "journal.csv"),
            lab_data: pick(&stores.lab_data, "lab_data.csv"),
        }
    }

    /// Directories that must exist before the stores can be used.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.ledger_dir.clone()];
        for file in [
            &self.requests,
            &self.arrivals,
            &self.dispatches,
            &self.history,
            &self.journal,
            &self.lab_data,
        ] {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() && !dirs.iter().any(|d| d == parent) {
                    dirs.push(parent.to_path_buf());
                }
            }
        }
        dirs
    }
}
