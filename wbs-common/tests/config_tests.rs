//! Configuration file loading and precedence
//!
//! Tests that touch `WBS_*` environment variables are marked `#[serial]` so
//! they never run concurrently with each other.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

use wbs_common::config::{
    load_toml_config, read_toml_config, resolve_setting, write_toml_config, OcrConfig,
    StoreConfig, TomlConfig,
};
use wbs_common::{Error, LockSettings};

fn sample_config() -> TomlConfig {
    TomlConfig {
        bind_address: Some("0.0.0.0:5790".to_string()),
        public_base_url: Some("https://scan.example".to_string()),
        store: StoreConfig::Sqlite {
            path: PathBuf::from("/var/lib/wbs/records.db"),
        },
        lock: LockSettings {
            max_retries: 30,
            retry_delay_ms: 100,
            ttl_seconds: 12,
        },
        ocr: OcrConfig {
            url: Some("http://ocr.internal/extract".to_string()),
            ..OcrConfig::default()
        },
        ..TomlConfig::default()
    }
}

#[test]
fn test_write_then_read_preserves_settings() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("nested").join("wbs-ss.toml");

    write_toml_config(&sample_config(), &target).unwrap();

    assert!(target.exists());
    assert!(!target.with_extension("toml.tmp").exists());
    assert_eq!(read_toml_config(&target).unwrap(), sample_config());
}

#[test]
fn test_missing_file_degrades_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    assert_eq!(load_toml_config(Some(&missing)), TomlConfig::default());
    assert_eq!(load_toml_config(None), TomlConfig::default());
}

#[test]
fn test_malformed_file_degrades_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("broken.toml");
    std::fs::write(&target, "bind_address = [unterminated").unwrap();

    assert!(matches!(read_toml_config(&target), Err(Error::Config(_))));
    assert_eq!(load_toml_config(Some(&target)), TomlConfig::default());
}

#[test]
#[serial]
fn test_cli_beats_environment_beats_toml() {
    env::set_var("WBS_TEST_RETRIES", "7");

    assert_eq!(resolve_setting(Some(3u32), "WBS_TEST_RETRIES", Some(5), 1), 3);
    assert_eq!(resolve_setting(None, "WBS_TEST_RETRIES", Some(5u32), 1), 7);

    env::remove_var("WBS_TEST_RETRIES");
    assert_eq!(resolve_setting(None, "WBS_TEST_RETRIES", Some(5u32), 1), 5);
    assert_eq!(resolve_setting(None::<u32>, "WBS_TEST_RETRIES", None, 1), 1);
}

#[test]
#[serial]
fn test_unparseable_environment_value_is_skipped() {
    env::set_var("WBS_TEST_TIMEOUT", "soon");
    assert_eq!(resolve_setting(None, "WBS_TEST_TIMEOUT", Some(30u64), 8), 30);
    env::remove_var("WBS_TEST_TIMEOUT");
}
