// SPDX-License-Identifier: MPL-2.0

//! Integration tests for rear camera enumeration and selection

mod common;

use barcode_scanner::ScanError;
use barcode_scanner::backends::camera::types::{BackendError, StreamConstraints};
use barcode_scanner::backends::virtual_camera::{VirtualDevice, VirtualPlatform};
use barcode_scanner::scanner::{
    SelectorConfig, enumerate_rear_cameras, enumerate_video_inputs, select_best_rear_camera,
};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn test_enumeration_keeps_rear_video_inputs() {
    let platform = Arc::new(common::phone());
    let rear = enumerate_rear_cameras(&platform).await.unwrap();

    let ids: Vec<_> = rear.iter().map(|c| c.device_id.as_str()).collect();
    assert_eq!(ids, vec!["wide", "tele", "macro"]);

    // The access request is released before enumeration returns
    assert_eq!(platform.live_streams(), 0);

    let all = enumerate_video_inputs(&*platform).unwrap();
    assert_eq!(all.len(), 4, "Microphone should be filtered out");
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_survives_denied_access_request() {
    let platform = Arc::new(common::phone());
    platform.set_deny_unpinned(true);

    let rear = enumerate_rear_cameras(&platform).await.unwrap();
    assert_eq!(rear.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_error_propagates() {
    let platform = Arc::new(common::phone());
    platform.set_enumerate_error(Some(BackendError::PermissionDenied));

    let err = enumerate_rear_cameras(&platform).await.unwrap_err();
    assert!(matches!(err, ScanError::Camera(BackendError::PermissionDenied)));
}

#[tokio::test(start_paused = true)]
async fn test_selects_highest_score() {
    let platform = Arc::new(common::phone());
    let candidates = enumerate_rear_cameras(&platform).await.unwrap();

    let selection = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();

    assert_eq!(selection.device_id, "wide");
    assert_eq!(
        selection.suggested_constraints,
        StreamConstraints::exact_device("wide")
    );

    let order: Vec<_> = selection
        .diagnostics
        .iter()
        .map(|d| d.device_id.as_str())
        .collect();
    assert_eq!(order, vec!["wide", "tele", "macro"]);
    assert!((selection.diagnostics[0].score - 17.0).abs() < 1e-9);
    assert!((selection.diagnostics[1].score - 5.8).abs() < 1e-9);
    assert!((selection.diagnostics[2].score - 0.92).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_probes_one_camera_at_a_time() {
    let platform = Arc::new(common::phone());
    let candidates = enumerate_rear_cameras(&platform).await.unwrap();
    let before = platform.acquisitions().len();

    select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();

    assert_eq!(platform.peak_live_streams(), 1);
    assert_eq!(platform.live_streams(), 0, "Probe streams must be stopped");

    let probes: Vec<_> = platform.acquisitions()[before..].to_vec();
    let expected: Vec<_> = ["wide", "tele", "macro"]
        .into_iter()
        .map(StreamConstraints::probe)
        .collect();
    assert_eq!(probes, expected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probes_are_skipped() {
    let platform = Arc::new(VirtualPlatform::new(vec![
        VirtualDevice::camera("busy", "Back Camera")
            .with_resolution(4000, 3000)
            .failing(BackendError::DeviceBusy("busy".into())),
        VirtualDevice::camera("ok", "Back Camera 2").with_resolution(640, 480),
    ]));
    let candidates = enumerate_video_inputs(&*platform).unwrap();

    let selection = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();
    assert_eq!(selection.device_id, "ok");
    assert_eq!(selection.diagnostics.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_usable_camera() {
    let platform = Arc::new(VirtualPlatform::new(vec![
        VirtualDevice::camera("a", "Back A").failing(BackendError::PermissionDenied),
        VirtualDevice::camera("b", "Back B").failing(BackendError::DeviceBusy("b".into())),
    ]));
    let candidates = enumerate_video_inputs(&*platform).unwrap();

    let err = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::NoUsableCamera));
    assert_eq!(platform.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_candidates() {
    let platform = Arc::new(VirtualPlatform::new(vec![]));
    let err = select_best_rear_camera(&platform, &[], &SelectorConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::NoCandidates));
    assert!(platform.acquisitions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ties_keep_enumeration_order() {
    let platform = Arc::new(VirtualPlatform::new(vec![
        VirtualDevice::camera("first", "Back Camera").with_resolution(1920, 1080),
        VirtualDevice::camera("second", "Back Camera").with_resolution(1920, 1080),
    ]));
    let candidates = enumerate_video_inputs(&*platform).unwrap();

    let selection = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();
    assert_eq!(selection.device_id, "first");
}

#[tokio::test(start_paused = true)]
async fn test_settings_fallback_when_no_ranges() {
    let platform = Arc::new(VirtualPlatform::new(vec![
        VirtualDevice::camera("small", "Back Camera").with_settings_size(640, 480),
        VirtualDevice::camera("large", "Back Camera").with_settings_size(1920, 1080),
    ]));
    let candidates = enumerate_video_inputs(&*platform).unwrap();

    let selection = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();
    assert_eq!(selection.device_id, "large");
}

#[tokio::test(start_paused = true)]
async fn test_feature_rich_camera_beats_higher_resolution() {
    let platform = Arc::new(VirtualPlatform::new(vec![
        VirtualDevice::camera("a", "Back Wide Camera").with_resolution(2000, 1000),
        VirtualDevice::camera("b", "Back Telephoto Camera")
            .with_resolution(1000, 1000)
            .with_zoom(4.0)
            .with_continuous_focus()
            .with_torch(),
    ]));
    let candidates = enumerate_video_inputs(&*platform).unwrap();

    let selection = select_best_rear_camera(&platform, &candidates, &SelectorConfig::default())
        .await
        .unwrap();

    assert_eq!(selection.device_id, "b");
    let score = |id: &str| {
        selection
            .diagnostics
            .iter()
            .find(|d| d.device_id == id)
            .map(|d| d.score)
            .unwrap()
    };
    // 1 + 4 * 0.5 + 2 + 0.5 + 0.3 (tele)
    assert!((score("b") - 5.8).abs() < 1e-9);
    // 2 + 0.5 (wide)
    assert!((score("a") - 2.5).abs() < 1e-9);
}
