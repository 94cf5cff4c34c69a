//! Service settings resolution across CLI, environment and TOML
//!
//! Every test here reads `WBS_*` variables, so all are `#[serial]`.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use wbs_common::config::{StoreConfig, TomlConfig};
use wbs_ss::config::{Args, ServiceConfig, DEFAULT_BIND_ADDRESS};

const VARS: &[&str] = &[
    "WBS_BIND_ADDRESS",
    "WBS_PUBLIC_BASE_URL",
    "WBS_SQLITE_PATH",
    "WBS_OCR_TIMEOUT_SECONDS",
    "WBS_PENDING_DEADLINE_SECONDS",
    "WBS_WEBHOOK_TIMEOUT_SECONDS",
    "WBS_OCR_URL",
    "WBS_WEBHOOK_URL",
    "WBS_IMAGE_HOST_URL",
    "WBS_LEDGER_URL",
    "WBS_IMAGE_HOST_TIMEOUT_SECONDS",
    "WBS_LEDGER_TIMEOUT_SECONDS",
    "WBS_LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();
    let config = ServiceConfig::resolve(&Args::default(), &TomlConfig::default());

    assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    assert_eq!(config.public_base_url, format!("http://{}", DEFAULT_BIND_ADDRESS));
    assert_eq!(config.store, StoreConfig::Memory);
    assert_eq!(config.ocr_url, None);
    assert_eq!(config.webhook_url, None);
    assert_eq!(config.pending_deadline, Duration::from_secs(40));
    assert_eq!(config.webhook_timeout, Duration::from_secs(8));
    assert_eq!(config.ledger_timeout, Duration::from_secs(8));
    assert_eq!(config.image_host_timeout, Duration::from_secs(15));
    assert_eq!(config.log_level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_toml() {
    clear_env();
    let toml: TomlConfig = toml::from_str(
        r#"
        bind_address = "0.0.0.0:6000"
        ledger_url = "http://ledger.internal"

        [webhook]
        url = "http://bot.internal/hook"
        timeout_seconds = 5

        [ocr]
        pending_deadline_seconds = 60
        "#,
    )
    .unwrap();

    env::set_var("WBS_BIND_ADDRESS", "127.0.0.1:7000");
    env::set_var("WBS_PENDING_DEADLINE_SECONDS", "45");
    env::set_var("WBS_SQLITE_PATH", "/tmp/wbs-records.db");

    let config = ServiceConfig::resolve(&Args::default(), &toml);
    clear_env();

    assert_eq!(config.bind_address, "127.0.0.1:7000");
    assert_eq!(config.pending_deadline, Duration::from_secs(45));
    assert_eq!(config.webhook_timeout, Duration::from_secs(5));
    assert_eq!(config.webhook_url.as_deref(), Some("http://bot.internal/hook"));
    assert_eq!(config.ledger_url.as_deref(), Some("http://ledger.internal"));
    assert_eq!(
        config.store,
        StoreConfig::Sqlite {
            path: PathBuf::from("/tmp/wbs-records.db")
        }
    );
}

#[test]
#[serial]
fn test_cli_overrides_environment() {
    clear_env();
    env::set_var("WBS_WEBHOOK_URL", "http://from-env/hook");
    env::set_var("WBS_LOG_LEVEL", "warn");

    let args = Args {
        webhook_url: Some("http://from-cli/hook".to_string()),
        public_base_url: Some("https://scan.example".to_string()),
        ..Args::default()
    };
    let config = ServiceConfig::resolve(&args, &TomlConfig::default());
    clear_env();

    assert_eq!(config.webhook_url.as_deref(), Some("http://from-cli/hook"));
    assert_eq!(config.public_base_url, "https://scan.example");
    assert_eq!(config.log_level, "warn");
}

#[test]
#[serial]
fn test_blank_url_counts_as_unset() {
    clear_env();
    env::set_var("WBS_OCR_URL", "   ");
    let config = ServiceConfig::resolve(&Args::default(), &TomlConfig::default());
    clear_env();

    assert_eq!(config.ocr_url, None);
}

#[test]
#[serial]
fn test_collaborator_timeouts_resolve_independently() {
    clear_env();
    let toml: TomlConfig = toml::from_str(
        r#"
        ledger_timeout_seconds = 4
        image_host_timeout_seconds = 45

        [ocr]
        timeout_seconds = 20

        [webhook]
        timeout_seconds = 6
        "#,
    )
    .unwrap();

    env::set_var("WBS_IMAGE_HOST_TIMEOUT_SECONDS", "50");
    let config = ServiceConfig::resolve(&Args::default(), &toml);
    clear_env();

    assert_eq!(config.ocr_timeout, Duration::from_secs(20));
    assert_eq!(config.webhook_timeout, Duration::from_secs(6));
    assert_eq!(config.ledger_timeout, Duration::from_secs(4));
    assert_eq!(config.image_host_timeout, Duration::from_secs(50));
    assert!(config.validate().is_ok());
}
