//! wbs-ss configuration
//!
//! Command-line arguments are parsed with clap; every setting then resolves
//! CLI → `WBS_*` environment → TOML file → default via
//! [`wbs_common::config::resolve_setting`].

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use wbs_common::config::{resolve_setting, StoreConfig, TomlConfig};
use wbs_common::{Error, LockSettings, Result};

use crate::engine::EngineSettings;

/// Default listen address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5790";

/// Command-line arguments for wbs-ss
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "wbs-ss")]
#[command(about = "Warehouse box scanning session service")]
#[command(version)]
pub struct Args {
    /// TOML config file (default: ~/.config/wbs/wbs-ss.toml)
    #[arg(short, long, env = "WBS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Public base URL used to build scan page links
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Keep sessions in this SQLite file instead of memory
    #[arg(long)]
    pub sqlite_path: Option<PathBuf>,

    /// OCR extraction endpoint
    #[arg(long)]
    pub ocr_url: Option<String>,

    /// Completion webhook target
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Image host upload endpoint
    #[arg(long)]
    pub image_host_url: Option<String>,

    /// Inventory ledger endpoint for ISSUE sessions
    #[arg(long)]
    pub ledger_url: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub public_base_url: String,
    pub store: StoreConfig,
    pub lock: LockSettings,
    pub ocr_url: Option<String>,
    pub ocr_timeout: Duration,
    pub pending_deadline: Duration,
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
    pub image_host_url: Option<String>,
    pub image_host_timeout: Duration,
    pub ledger_url: Option<String>,
    pub ledger_timeout: Duration,
    pub log_level: String,
}

impl ServiceConfig {
    /// Resolve every setting from `args`, the environment and `toml`
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Self {
        let bind_address = resolve_setting(
            args.bind.clone(),
            "WBS_BIND_ADDRESS",
            toml.bind_address.clone(),
            DEFAULT_BIND_ADDRESS.to_string(),
        );
        let public_base_url = resolve_setting(
            args.public_base_url.clone(),
            "WBS_PUBLIC_BASE_URL",
            toml.public_base_url.clone(),
            format!("http://{}", bind_address),
        );

        let sqlite_path = resolve_optional(
            args.sqlite_path.as_ref().map(|p| p.display().to_string()),
            "WBS_SQLITE_PATH",
            None,
        );
        let store = match sqlite_path {
            Some(path) => StoreConfig::Sqlite {
                path: PathBuf::from(path),
            },
            None => toml.store.clone(),
        };

        let ocr_timeout_seconds = resolve_setting(
            None,
            "WBS_OCR_TIMEOUT_SECONDS",
            Some(toml.ocr.timeout_seconds),
            30,
        );
        let pending_deadline_seconds = resolve_setting(
            None,
            "WBS_PENDING_DEADLINE_SECONDS",
            Some(toml.ocr.pending_deadline_seconds),
            40,
        );
        let webhook_timeout_seconds = resolve_setting(
            None,
            "WBS_WEBHOOK_TIMEOUT_SECONDS",
            Some(toml.webhook.timeout_seconds),
            8,
        );
        let image_host_timeout_seconds = resolve_setting(
            None,
            "WBS_IMAGE_HOST_TIMEOUT_SECONDS",
            toml.image_host_timeout_seconds,
            15,
        );
        let ledger_timeout_seconds = resolve_setting(
            None,
            "WBS_LEDGER_TIMEOUT_SECONDS",
            toml.ledger_timeout_seconds,
            8,
        );

        Self {
            public_base_url,
            bind_address,
            store,
            lock: toml.lock,
            ocr_url: resolve_optional(args.ocr_url.clone(), "WBS_OCR_URL", toml.ocr.url.clone()),
            ocr_timeout: Duration::from_secs(ocr_timeout_seconds),
            pending_deadline: Duration::from_secs(pending_deadline_seconds),
            webhook_url: resolve_optional(
                args.webhook_url.clone(),
                "WBS_WEBHOOK_URL",
                toml.webhook.url.clone(),
            ),
            webhook_timeout: Duration::from_secs(webhook_timeout_seconds),
            image_host_url: resolve_optional(
                args.image_host_url.clone(),
                "WBS_IMAGE_HOST_URL",
                toml.image_host_url.clone(),
            ),
            image_host_timeout: Duration::from_secs(image_host_timeout_seconds),
            ledger_url: resolve_optional(
                args.ledger_url.clone(),
                "WBS_LEDGER_URL",
                toml.ledger_url.clone(),
            ),
            ledger_timeout: Duration::from_secs(ledger_timeout_seconds),
            log_level: resolve_setting(
                args.log_level.clone(),
                "WBS_LOG_LEVEL",
                Some(toml.logging.level.clone()),
                "info".to_string(),
            ),
        }
    }

    /// Reject combinations the engine cannot run safely
    ///
    /// Finalize and issue hold the session lock across the webhook and
    /// ledger calls, so both must give up before the lock expires.
    pub fn validate(&self) -> Result<()> {
        for (name, timeout) in [
            ("webhook", self.webhook_timeout),
            ("ledger", self.ledger_timeout),
        ] {
            if timeout >= self.lock.ttl() {
                return Err(Error::Config(format!(
                    "{} timeout ({:?}) must be shorter than the lock TTL ({:?})",
                    name,
                    timeout,
                    self.lock.ttl()
                )));
            }
        }
        if self.lock.max_retries == 0 {
            return Err(Error::Config("lock.max_retries must be at least 1".to_string()));
        }
        if self.pending_deadline.is_zero() {
            return Err(Error::Config(
                "ocr.pending_deadline_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            lock: self.lock,
            pending_deadline: self.pending_deadline,
            public_base_url: self.public_base_url.clone(),
        }
    }
}

/// Optional string setting; blank values count as unset
fn resolve_optional(cli: Option<String>, env_var: &str, toml: Option<String>) -> Option<String> {
    Some(resolve_setting(cli, env_var, toml, String::new()))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
