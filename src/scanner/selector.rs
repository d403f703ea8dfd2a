// SPDX-License-Identifier: GPL-3.0-only

//! Rear-camera selection
//!
//! Every candidate is activated briefly, its capabilities and settings are
//! read, and a heuristic score ranks it. The best-scoring camera wins.
//!
//! ```text
//! score = megapixels * resolution
//!       + zoom.max * zoom
//!       + continuous focus bonus
//!       + torch bonus
//!       + wide label bonus
//!       + tele label bonus
//!       - macro/depth label penalty
//! ```

use crate::backends::camera::types::{
    BackendResult, CameraInfo, StreamConstraints, TrackCapabilities, TrackSettings,
};
use crate::backends::camera::{CameraPlatform, acquire_stream, stop_stream};
use crate::constants::selection as consts;
use crate::errors::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Score coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Points per megapixel
    pub resolution: f64,
    /// Points per unit of maximum zoom
    pub zoom: f64,
    pub continuous_focus: f64,
    pub torch: f64,
    pub wide_label: f64,
    pub tele_label: f64,
    pub macro_depth_penalty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            resolution: consts::RESOLUTION_WEIGHT,
            zoom: consts::ZOOM_WEIGHT,
            continuous_focus: consts::CONTINUOUS_FOCUS_BONUS,
            torch: consts::TORCH_BONUS,
            wide_label: consts::WIDE_LABEL_BONUS,
            tele_label: consts::TELE_LABEL_BONUS,
            macro_depth_penalty: consts::MACRO_DEPTH_PENALTY,
        }
    }
}

/// Selector settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Wait after activating a candidate before reading its settings
    pub probe_settle_ms: u64,
    pub weights: ScoreWeights,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            probe_settle_ms: consts::PROBE_SETTLE.as_millis() as u64,
            weights: ScoreWeights::default(),
        }
    }
}

impl SelectorConfig {
    pub fn probe_settle(&self) -> Duration {
        Duration::from_millis(self.probe_settle_ms)
    }
}

/// Probe result for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraScore {
    pub device_id: String,
    pub label: Option<String>,
    pub score: f64,
    pub capabilities: TrackCapabilities,
    pub settings: TrackSettings,
}

/// Outcome of rear-camera selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSelection {
    pub device_id: String,
    /// Constraints that reopen the winning camera
    pub suggested_constraints: StreamConstraints,
    /// Every probed candidate, best first
    pub diagnostics: Vec<CameraScore>,
}

/// Case-insensitive substring match against any keyword
pub fn label_matches(label: &str, keywords: &[&str]) -> bool {
    let label = label.to_lowercase();
    keywords.iter().any(|k| label.contains(k))
}

/// Score a camera from its label, capabilities and current settings
///
/// Resolution falls back to the current settings when the capability range
/// is missing, and to zero when both are.
pub fn score_camera(
    label: Option<&str>,
    capabilities: &TrackCapabilities,
    settings: &TrackSettings,
    weights: &ScoreWeights,
) -> f64 {
    let max_width = capabilities
        .width
        .map(|r| r.max)
        .or(settings.width.map(f64::from))
        .unwrap_or(0.0);
    let max_height = capabilities
        .height
        .map(|r| r.max)
        .or(settings.height.map(f64::from))
        .unwrap_or(0.0);
    let zoom_max = capabilities.zoom.map(|r| r.max).unwrap_or(0.0);

    let mut score =
        (max_width * max_height) / 1_000_000.0 * weights.resolution + zoom_max * weights.zoom;

    if capabilities.supports_continuous_focus() {
        score += weights.continuous_focus;
    }
    if capabilities.torch {
        score += weights.torch;
    }

    let label = label.unwrap_or_default();
    if label_matches(label, &consts::WIDE_KEYWORDS) {
        score += weights.wide_label;
    }
    if label_matches(label, &consts::TELE_KEYWORDS) {
        score += weights.tele_label;
    }
    if label_matches(label, &consts::MACRO_DEPTH_KEYWORDS) {
        score -= weights.macro_depth_penalty;
    }

    score
}

/// Activate a camera, wait for it to settle, and read its track data
///
/// The probe stream is stopped before returning.
pub async fn probe_camera<P>(
    platform: &Arc<P>,
    camera: &CameraInfo,
    settle: Duration,
) -> BackendResult<(TrackCapabilities, TrackSettings)>
where
    P: CameraPlatform + ?Sized + 'static,
{
    let constraints = StreamConstraints::probe(camera.device_id.clone());
    let stream = acquire_stream(platform, constraints).await?;

    tokio::time::sleep(settle).await;

    let capabilities = stream.capabilities();
    let settings = stream.settings();
    stop_stream(stream).await;

    Ok((capabilities, settings))
}

/// Probe every candidate in order and pick the best-scoring one
///
/// Candidates that cannot be probed are skipped. Ties keep enumeration
/// order.
pub async fn select_best_rear_camera<P>(
    platform: &Arc<P>,
    candidates: &[CameraInfo],
    config: &SelectorConfig,
) -> ScanResult<CameraSelection>
where
    P: CameraPlatform + ?Sized + 'static,
{
    if candidates.is_empty() {
        return Err(ScanError::NoCandidates);
    }

    let mut diagnostics = Vec::with_capacity(candidates.len());

    for camera in candidates {
        match probe_camera(platform, camera, config.probe_settle()).await {
            Ok((capabilities, settings)) => {
                let score = score_camera(
                    camera.label.as_deref(),
                    &capabilities,
                    &settings,
                    &config.weights,
                );
                debug!(
                    device_id = %camera.device_id,
                    label = ?camera.label,
                    score,
                    "Probed camera"
                );
                diagnostics.push(CameraScore {
                    device_id: camera.device_id.clone(),
                    label: camera.label.clone(),
                    score,
                    capabilities,
                    settings,
                });
            }
            Err(e) => {
                debug!(
                    device_id = %camera.device_id,
                    error = %e,
                    "Skipping camera that failed to probe"
                );
            }
        }
    }

    // Stable, so equal scores keep enumeration order
    diagnostics.sort_by(|a, b| b.score.total_cmp(&a.score));

    let best = diagnostics.first().ok_or(ScanError::NoUsableCamera)?;
    let device_id = best.device_id.clone();

    info!(
        device_id = %device_id,
        score = best.score,
        probed = diagnostics.len(),
        candidates = candidates.len(),
        "Selected rear camera"
    );

    Ok(CameraSelection {
        suggested_constraints: StreamConstraints::exact_device(device_id.clone()),
        device_id,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{FocusMode, NumericRange};

    fn caps(width: f64, height: f64) -> TrackCapabilities {
        TrackCapabilities {
            width: Some(NumericRange::new(1.0, width)),
            height: Some(NumericRange::new(1.0, height)),
            ..Default::default()
        }
    }

    fn score(label: &str, capabilities: &TrackCapabilities) -> f64 {
        score_camera(
            Some(label),
            capabilities,
            &TrackSettings::default(),
            &ScoreWeights::default(),
        )
    }

    #[test]
    fn test_resolution_in_megapixels() {
        let s = score("camera", &caps(4000.0, 3000.0));
        assert!((s - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_bonuses_add_up() {
        let mut c = caps(1000.0, 1000.0);
        c.zoom = Some(NumericRange::new(1.0, 8.0));
        c.focus_modes = vec![FocusMode::Manual, FocusMode::Continuous];
        c.torch = true;

        // 1 MP + 8 * 0.5 + 2 + 0.5 + 0.5 (wide)
        let s = score("Back Wide Camera", &c);
        assert!((s - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_keywords() {
        let c = caps(1000.0, 1000.0);
        assert!((score("camera2 tele", &c) - 1.3).abs() < 1e-9);
        assert!((score("Ultra Wide", &c) - 1.5).abs() < 1e-9);
        // Facing words alone earn nothing
        assert!((score("rear telephoto", &c) - 1.3).abs() < 1e-9);
        assert!((score("Back Main Camera", &c) - 1.0).abs() < 1e-9);
        // One penalty even when both macro and depth match
        assert!((score("Macro Depth", &c) - 0.0).abs() < 1e-9);
        assert!((score("WIDE MACRO", &c) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_settings_fallback() {
        let settings = TrackSettings {
            width: Some(2000),
            height: Some(1000),
            ..Default::default()
        };
        let s = score_camera(
            None,
            &TrackCapabilities::default(),
            &settings,
            &ScoreWeights::default(),
        );
        assert!((s - 2.0).abs() < 1e-9);

        let nothing = score_camera(
            None,
            &TrackCapabilities::default(),
            &TrackSettings::default(),
            &ScoreWeights::default(),
        );
        assert_eq!(nothing, 0.0);
    }

    #[test]
    fn test_weights_vary_independently() {
        let mut c = caps(1000.0, 1000.0);
        c.torch = true;
        let weights = ScoreWeights {
            torch: 10.0,
            ..Default::default()
        };
        let s = score_camera(Some("x"), &c, &TrackSettings::default(), &weights);
        assert!((s - 11.0).abs() < 1e-9);
    }

    /// Capability sets that each vary one input at a time
    fn base_sets() -> Vec<(&'static str, TrackCapabilities)> {
        let mut zoomed = caps(1920.0, 1080.0);
        zoomed.zoom = Some(NumericRange::new(1.0, 3.0));
        let mut loaded = caps(4000.0, 3000.0);
        loaded.zoom = Some(NumericRange::new(1.0, 10.0));
        loaded.focus_modes = vec![FocusMode::Manual];
        let mut lit = caps(320.0, 240.0);
        lit.torch = true;

        vec![
            ("Back Camera", caps(640.0, 480.0)),
            ("Back Wide Camera", zoomed),
            ("Back Telephoto Camera", loaded),
            ("camera", lit),
            ("", TrackCapabilities::default()),
        ]
    }

    #[test]
    fn test_score_monotonic_in_each_input() {
        for (label, base) in base_sets() {
            let before = score(label, &base);

            let mut larger = base.clone();
            let width = base.width.map_or(0.0, |r| r.max);
            let height = base.height.map_or(0.0, |r| r.max);
            larger.width = Some(NumericRange::new(1.0, width + 640.0));
            larger.height = Some(NumericRange::new(1.0, height + 480.0));
            assert!(score(label, &larger) >= before, "resolution, {label}");

            let mut zoomier = base.clone();
            let zoom = base.zoom.map_or(0.0, |r| r.max);
            zoomier.zoom = Some(NumericRange::new(1.0, zoom + 2.0));
            assert!(score(label, &zoomier) >= before, "zoom, {label}");

            let mut focusing = base.clone();
            focusing.focus_modes.push(FocusMode::Continuous);
            assert!(score(label, &focusing) >= before, "focus, {label}");

            let mut lit = base.clone();
            lit.torch = true;
            assert!(score(label, &lit) >= before, "torch, {label}");
        }
    }

    #[test]
    fn test_macro_label_costs_at_least_one_point() {
        for (label, base) in base_sets() {
            let plain = score(label, &base);
            for macro_label in [format!("{label} macro"), format!("Macro {label}")] {
                let penalised = score(&macro_label, &base);
                assert!(
                    plain - penalised >= 1.0 - 1e-9,
                    "{macro_label:?} scored {penalised}, {label:?} scored {plain}"
                );
            }
        }
    }

    #[test]
    fn test_selection_serializes() {
        let selection = CameraSelection {
            device_id: "cam0".into(),
            suggested_constraints: StreamConstraints::exact_device("cam0"),
            diagnostics: vec![],
        };
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["suggested_constraints"]["device_id"], "cam0");
    }
}
