//! Store configuration
//!
//! A `StoreConfig` is built (or loaded from TOML) once at startup and
//! consumed by `PersistenceManager::open`. Nothing about the store can be
//! reconfigured after it is attached.
//!
//! ```toml
//! app_name = "gistpad"
//! store_path = "/var/lib/gistpad/store.sqlite"
//!
//! [options]
//! auto_migrate = true
//!
//! [options.pragmas]
//! journal_mode = "WAL"
//! synchronous = "NORMAL"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, Result};

/// Environment variable overriding the default data directory
pub const HOME_ENV: &str = "RECORDSYNC_HOME";

const DEFAULT_APP_NAME: &str = "recordsync";
const DEFAULT_DATA_DIR: &str = ".recordsync";

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "{}", path.display()),
            StoreLocation::InMemory => write!(f, ":memory:"),
        }
    }
}

/// Options applied when the store is attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Apply pending schema migrations and accept a changed object model
    pub auto_migrate: bool,
    /// Open without write access; `save` with pending changes fails
    pub read_only: bool,
    /// Create the store file (and its directory) if missing
    pub create_if_missing: bool,
    /// Forwarded verbatim as `PRAGMA name = value`
    pub pragmas: BTreeMap<String, String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        let mut pragmas = BTreeMap::new();
        pragmas.insert("journal_mode".to_string(), "WAL".to_string());
        pragmas.insert("foreign_keys".to_string(), "ON".to_string());
        pragmas.insert("busy_timeout".to_string(), "5000".to_string());

        Self {
            auto_migrate: true,
            read_only: false,
            create_if_missing: true,
            pragmas,
        }
    }
}

impl StoreOptions {
    pub fn with_pragma(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pragmas.insert(name.into(), value.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn auto_migrate(mut self, auto_migrate: bool) -> Self {
        self.auto_migrate = auto_migrate;
        self
    }
}

/// Startup configuration for a persistence manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Names the default store file
    pub app_name: String,
    /// Explicit store file; `None` means `<data dir>/<app_name>.sqlite`
    pub store_path: Option<PathBuf>,
    /// Keep the store in memory (tests, scratch imports)
    pub in_memory: bool,
    pub options: StoreOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            store_path: None,
            in_memory: false,
            options: StoreOptions::default(),
        }
    }
}

impl StoreConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Configuration for a private in-memory store
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self.in_memory = false;
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(text).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolve where the store lives
    pub fn location(&self) -> StoreLocation {
        if self.in_memory {
            return StoreLocation::InMemory;
        }
        match &self.store_path {
            Some(path) => StoreLocation::File(path.clone()),
            None => StoreLocation::File(default_store_path(&self.app_name)),
        }
    }
}

/// `$RECORDSYNC_HOME`, or `./.recordsync`
pub fn default_data_dir() -> PathBuf {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_DATA_DIR),
    }
}

/// Default per-app store file
pub fn default_store_path(app_name: &str) -> PathBuf {
    default_data_dir().join(format!("{}.sqlite", app_name))
}
