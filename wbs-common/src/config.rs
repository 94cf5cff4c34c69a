//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`WBS_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is not fatal: the service logs a warning
//! and starts on defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::lock::LockSettings;
use crate::{Error, Result};

/// Record store backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process map; state is lost on restart
    Memory,
    /// SQLite database file
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[ocr]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Extraction service endpoint; OCR is skipped when unset
    pub url: Option<String>,
    /// Per-call timeout, seconds
    pub timeout_seconds: u64,
    /// Age after which a pending entry is swept to failed, seconds
    pub pending_deadline_seconds: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: 30,
            pending_deadline_seconds: 40,
        }
    }
}

/// `[webhook]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Completion notification target
    pub url: Option<String>,
    /// Delivery timeout, seconds; kept below the lock TTL
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: 8,
        }
    }
}

/// Service TOML file contents
///
/// Every field is optional in the file; absent sections take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub public_base_url: Option<String>,
    pub image_host_url: Option<String>,
    /// Upload timeout, seconds
    pub image_host_timeout_seconds: Option<u64>,
    pub ledger_url: Option<String>,
    /// Ledger call timeout, seconds; kept below the lock TTL
    pub ledger_timeout_seconds: Option<u64>,
    pub store: StoreConfig,
    pub lock: LockSettings,
    pub ocr: OcrConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

/// Default TOML path for `module_name`
///
/// `~/.config/wbs/<module>.toml`, falling back on Linux to
/// `/etc/wbs/<module>.toml` when the user file is absent.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("wbs").join(&file_name));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/wbs").join(&file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a TOML config file, degrading to defaults when it is missing or bad
pub fn load_toml_config(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        tracing::warn!("No config file location available, using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        tracing::info!("Config file {} not found, using defaults", path.display());
        return TomlConfig::default();
    }

    match read_toml_config(path) {
        Ok(config) => {
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("{}; using defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write `config` to `path`, via a temporary file renamed into place
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve one setting: CLI → environment → TOML → default
///
/// Unparseable environment values are logged and skipped.
pub fn resolve_setting<T>(cli: Option<T>, env_var: &str, toml: Option<T>, default: T) -> T
where
    T: FromStr,
{
    if let Some(value) = cli {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var) {
        match raw.parse::<T>() {
            Ok(value) => return value,
            Err(_) => tracing::warn!("Ignoring unparseable {}={:?}", env_var, raw),
        }
    }

    toml.unwrap_or(default)
}
