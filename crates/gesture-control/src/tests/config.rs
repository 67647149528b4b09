use crate::{
    AppError,
    config::{Config, ConfigStore, DEFAULT_HOST, DEFAULT_PORT},
};

use gesture_control_core::{AttributeStore, CoreError, SELECTED_CAMERA_KEY};

use std::{fs, time::Duration};

use tempfile::TempDir;

/// WHAT: A missing config file is created with defaults
/// WHY: First launch must work without any setup
#[test]
#[allow(clippy::unwrap_used)]
fn given_no_config_when_loading_then_defaults_written() {
    // Given
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    // When
    let config = Config::load_from(&path).unwrap();

    // Then
    assert!(path.exists());
    assert_eq!(config.server.host, DEFAULT_HOST);
    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.camera.selected, None);
    assert_eq!(config.detection.stop_timeout(), Duration::from_secs(2));
    assert_eq!(config.detection.operation_timeout(), Duration::from_secs(5));
    assert_eq!(config.listen_address(), "127.0.0.1:8765");
    assert!(!dir.path().join("config.toml.tmp").exists());
}

/// WHAT: Sections and fields missing from the file fall back to defaults
/// WHY: Hand-edited configs are usually partial
#[test]
#[allow(clippy::unwrap_used)]
fn given_partial_config_when_loading_then_missing_fields_defaulted() {
    // Given
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nport = 9000\n").unwrap();

    // When
    let config = Config::load_from(&path).unwrap();

    // Then
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, DEFAULT_HOST);
    assert_eq!(config.detection.stop_timeout_ms, 2000);
}

/// WHAT: An unparseable config is an error, not a silent reset
/// WHY: Overwriting a broken file would lose the user's settings
#[test]
#[allow(clippy::unwrap_used)]
fn given_corrupt_config_when_loading_then_config_error() {
    // Given
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server\nport = ").unwrap();

    // When
    let result = Config::load_from(&path);

    // Then
    assert!(matches!(result, Err(AppError::ConfigError { .. })));
}

/// WHAT: The selected camera is readable, updatable and persisted
/// WHY: setCamera must survive a restart
#[test]
#[allow(clippy::unwrap_used)]
fn given_config_store_when_updating_camera_then_persisted() {
    // Given
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let store = ConfigStore::open(&path).unwrap();
    assert_eq!(store.read_attribute(SELECTED_CAMERA_KEY).unwrap(), None);

    // When
    store
        .update_attribute(SELECTED_CAMERA_KEY, "USB Camera")
        .unwrap();

    // Then: Visible now and after reopening
    assert_eq!(
        store.read_attribute(SELECTED_CAMERA_KEY).unwrap(),
        Some("USB Camera".to_string())
    );
    let reopened = ConfigStore::open(&path).unwrap();
    assert_eq!(
        reopened.snapshot().camera.selected,
        Some("USB Camera".to_string())
    );
}

/// WHAT: Unknown attribute keys are rejected on read and update
/// WHY: Typos must not silently create or read nothing
#[test]
#[allow(clippy::unwrap_used)]
fn given_unknown_key_when_accessing_then_unknown_attribute() {
    // Given
    let dir = TempDir::new().unwrap();
    let store = ConfigStore::open(dir.path().join("config.toml")).unwrap();

    // When/Then
    assert!(matches!(
        store.read_attribute("volume"),
        Err(CoreError::UnknownAttribute { .. })
    ));
    assert!(matches!(
        store.update_attribute("volume", "11"),
        Err(CoreError::UnknownAttribute { .. })
    ));
}

/// WHAT: A failed write leaves the in-memory value unchanged
/// WHY: Success is only reported for durable updates
#[test]
#[allow(clippy::unwrap_used)]
fn given_unwritable_config_when_updating_then_storage_error_and_unchanged() {
    // Given: The config path turned into a directory after opening
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let store = ConfigStore::open(&path).unwrap();
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    // When
    let result = store.update_attribute(SELECTED_CAMERA_KEY, "USB Camera");

    // Then
    assert!(matches!(result, Err(CoreError::Storage { .. })));
    assert_eq!(store.read_attribute(SELECTED_CAMERA_KEY).unwrap(), None);
}
