// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for barcode scanning
//!
//! This module provides command-line functionality for:
//! - Listing rear cameras
//! - Running rear-camera auto-selection
//! - Scanning barcodes to stdout

use barcode_scanner::backends::camera::CameraPlatform;
use barcode_scanner::scanner::{
    enumerate_rear_cameras, enumerate_video_inputs, select_best_rear_camera,
};
use barcode_scanner::{Config, ScanEvent, ScanSession, load_default_decoder};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// List rear-facing cameras, or every video input when none is labelled
pub fn list_cameras(platform: Arc<dyn CameraPlatform>) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let mut cameras = runtime.block_on(enumerate_rear_cameras(&platform))?;

    let fallback = cameras.is_empty();
    if fallback {
        cameras = enumerate_video_inputs(&*platform)?;
    }

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    if fallback {
        println!("No rear-facing cameras found, all video inputs:");
    } else {
        println!("Rear-facing cameras:");
    }
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.display_name());
        println!("      id: {}", camera.device_id);
    }

    Ok(())
}

/// Probe every rear camera and print the selection as JSON
pub fn select_camera(
    platform: Arc<dyn CameraPlatform>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let selection = runtime.block_on(async {
        let candidates = enumerate_rear_cameras(&platform).await?;
        select_best_rear_camera(&platform, &candidates, &config.selector).await
    })?;

    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}

/// Scan barcodes and print each new one
///
/// Runs until Ctrl+C, or until the first barcode with `once`. A camera
/// picked with `device` is remembered in the config for the next run, and
/// dropped again once it stops being usable.
pub fn scan(
    platform: Arc<dyn CameraPlatform>,
    config: Config,
    config_path: Option<&Path>,
    device: Option<String>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    // Set up Ctrl+C handler
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let remembered = config.last_device_id.clone();
    let final_config = runtime.block_on(async {
        let mut session = ScanSession::new(platform, load_default_decoder(), config);
        let mut events = session.subscribe();

        let started = match (device, remembered.clone()) {
            (Some(device_id), _) => {
                println!("Using camera: {}", device_id);
                session.start_on(&device_id).await
            }
            (None, Some(device_id)) => {
                let started = session.start_preferring(&device_id).await;
                started.map(|selection| {
                    let active = selection.map_or(device_id, |s| s.device_id);
                    println!("Using camera: {}", active);
                })
            }
            (None, None) => session.start().await.map(|selection| {
                println!("Using camera: {}", selection.device_id);
            }),
        };
        if let Err(e) = started {
            session.stop().await;
            return Err(e);
        }

        println!("Scanning... (press Ctrl+C to stop)");
        println!();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    println!();
                    println!("Stopping...");
                    break;
                }
                event = events.recv() => match event {
                    Ok(ScanEvent::Decoded(record)) => {
                        println!("{}", record);
                        if once {
                            break;
                        }
                    }
                    Ok(ScanEvent::ActiveDeviceChanged(_)) => {}
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped scan events"),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        session.stop().await;
        Ok(session.config().clone())
    })?;

    if final_config.last_device_id != remembered
        && let Some(path) = config_path
        && let Err(e) = final_config.save_to(path)
    {
        warn!(error = %e, "Failed to save config");
    }

    Ok(())
}
