//! Tests for Config
//!
//! These tests verify:
//! - Defaults
//! - Sync policy resolution in the builder
//! - Validation

use std::path::PathBuf;
use std::time::Duration;

use cairnkv::{CairnError, Config, SyncPolicy};

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.snapshot_path, PathBuf::from("cairnkv.db"));
    assert_eq!(config.journal_path, PathBuf::from("cairnkv.wal"));
    assert_eq!(config.sync_policy, SyncPolicy::Manual);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder_paths() {
    let config = Config::builder()
        .snapshot_path("/tmp/a.db")
        .journal_path("/tmp/a.wal")
        .build();

    assert_eq!(config.snapshot_path, PathBuf::from("/tmp/a.db"));
    assert_eq!(config.journal_path, PathBuf::from("/tmp/a.wal"));
}

#[test]
fn test_sync_interval() {
    let config = Config::builder()
        .sync_interval(Duration::from_millis(250))
        .build();

    assert_eq!(config.sync_policy, SyncPolicy::Interval(Duration::from_millis(250)));
}

#[test]
fn test_zero_sync_interval_disables_background_flush() {
    let config = Config::builder().sync_interval(Duration::ZERO).build();

    assert_eq!(config.sync_policy, SyncPolicy::Manual);
}

#[test]
fn test_sync_every_write_overrides_interval() {
    let config = Config::builder()
        .sync_interval(Duration::from_secs(1))
        .sync_every_write()
        .build();

    assert_eq!(config.sync_policy, SyncPolicy::EveryWrite);
}

#[test]
fn test_validate_rejects_shared_path() {
    let config = Config::builder()
        .snapshot_path("same")
        .journal_path("same")
        .build();

    assert!(matches!(config.validate(), Err(CairnError::Config(_))));
}

#[test]
fn test_validate_rejects_zero_interval_set_directly() {
    let mut config = Config::default();
    config.sync_policy = SyncPolicy::Interval(Duration::ZERO);

    assert!(matches!(config.validate(), Err(CairnError::Config(_))));
}
