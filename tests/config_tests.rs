// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use barcode_scanner::Config;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("barcode-scanner-test-{}", std::process::id()))
        .join(name)
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.last_device_id, None);
    assert!(!config.enable_torch, "Torch should be off by default");
    assert!(config.sampler.try_harder);
    assert_eq!(config.sampler.tick_interval_ms, 16);
    assert_eq!(config.selector.probe_settle_ms, 300);
}

#[test]
fn test_missing_file_gives_defaults() {
    let config = Config::load_from(&temp_path("does-not-exist.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let path = temp_path("nested/dir/config.json");
    let mut config = Config::default();
    config.last_device_id = Some("/dev/video2".to_string());
    config.zoom_fraction = Some(0.25);
    config.sampler.format_hint = "QRCode|EAN-13".to_string();

    config.save_to(&path).unwrap();
    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_partial_file_fills_defaults() {
    let path = temp_path("partial.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{ "enable_torch": true, "sampler": { "crop": { "band_fraction": 0.5 } } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert!(config.enable_torch);
    assert_eq!(config.sampler.crop.band_fraction, 0.5);
    assert_eq!(config.sampler.crop.width_fraction, 0.7);
    assert_eq!(config.sampler.history_limit, 50);
    assert_eq!(config.selector, Default::default());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_invalid_file_is_an_error() {
    let path = temp_path("invalid.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    assert!(Config::load_from(&path).is_err());

    let _ = std::fs::remove_file(&path);
}
