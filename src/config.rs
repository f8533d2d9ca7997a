//! Compositor configuration.
//!
//! `CompositorConfig` holds the GPU selection and presentation settings used
//! when a compositor initializes. The frontend can push a full config as JSON;
//! the process-wide copy lives behind `parking_lot::RwLock` so a batch update
//! is atomic and readers never see a half-applied config.

use std::path::Path;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CompositorError, CompositorResult, ResultExt};

lazy_static! {
    /// Global compositor configuration, used by `FrameCompositor::new`.
    pub static ref COMPOSITOR_CONFIG: RwLock<CompositorConfig> =
        RwLock::new(CompositorConfig::default());
}

/// Adapter power preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum PowerPreference {
    HighPerformance,
    LowPower,
    None,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(pref: PowerPreference) -> Self {
        match pref {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::None => wgpu::PowerPreference::None,
        }
    }
}

/// Which graphics backends the instance may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum BackendSelection {
    All,
    Primary,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl From<BackendSelection> for wgpu::Backends {
    fn from(selection: BackendSelection) -> Self {
        match selection {
            BackendSelection::All => wgpu::Backends::all(),
            BackendSelection::Primary => wgpu::Backends::PRIMARY,
            BackendSelection::Vulkan => wgpu::Backends::VULKAN,
            BackendSelection::Metal => wgpu::Backends::METAL,
            BackendSelection::Dx12 => wgpu::Backends::DX12,
            BackendSelection::Gl => wgpu::Backends::GL,
        }
    }
}

/// Presentation mode for window/canvas surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum PresentMode {
    Fifo,
    Mailbox,
    Immediate,
    AutoVsync,
    AutoNoVsync,
}

impl From<PresentMode> for wgpu::PresentMode {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Fifo => wgpu::PresentMode::Fifo,
            PresentMode::Mailbox => wgpu::PresentMode::Mailbox,
            PresentMode::Immediate => wgpu::PresentMode::Immediate,
            PresentMode::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentMode::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

/// Pixel format of offscreen targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum OffscreenFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
}

impl From<OffscreenFormat> for wgpu::TextureFormat {
    fn from(format: OffscreenFormat) -> Self {
        match format {
            OffscreenFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            OffscreenFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            OffscreenFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            OffscreenFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        }
    }
}

/// GPU selection and presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CompositorConfig {
    /// When false, initialization fails as if the host had no GPU support.
    pub gpu_acceleration: bool,
    pub power_preference: PowerPreference,
    pub backends: BackendSelection,
    /// Only accept a software (fallback) adapter.
    pub force_fallback_adapter: bool,
    pub present_mode: PresentMode,
    pub offscreen_format: OffscreenFormat,
    /// Frames the surface may queue ahead of presentation.
    pub desired_maximum_frame_latency: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            gpu_acceleration: true,
            power_preference: PowerPreference::HighPerformance,
            backends: BackendSelection::All,
            force_fallback_adapter: false,
            present_mode: PresentMode::Fifo,
            offscreen_format: OffscreenFormat::Rgba8Unorm,
            desired_maximum_frame_latency: 2,
        }
    }
}

impl CompositorConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> CompositorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> CompositorResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read compositor config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CompositorResult<()> {
        if self.desired_maximum_frame_latency == 0 {
            return Err(CompositorError::Config(
                "desiredMaximumFrameLatency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Getters
// ============================================================================

/// Snapshot of the global config.
pub fn current() -> CompositorConfig {
    COMPOSITOR_CONFIG.read().clone()
}

/// Replace the global config. Invalid configs are rejected and leave the
/// previous one in place.
pub fn set(config: CompositorConfig) -> CompositorResult<()> {
    config.validate()?;
    log::debug!("[COMPOSITOR_CONFIG] set({:?})", config);
    *COMPOSITOR_CONFIG.write() = config;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompositorConfig::default();
        assert!(config.gpu_acceleration);
        assert_eq!(config.backends, BackendSelection::All);
        assert_eq!(config.offscreen_format, OffscreenFormat::Rgba8Unorm);
        assert_eq!(config.desired_maximum_frame_latency, 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            CompositorConfig::from_json_str(r#"{"powerPreference":"lowPower","backends":"gl"}"#)
                .unwrap();
        assert_eq!(config.power_preference, PowerPreference::LowPower);
        assert_eq!(config.backends, BackendSelection::Gl);
        assert_eq!(config.present_mode, PresentMode::Fifo);
        assert!(config.gpu_acceleration);
    }

    #[test]
    fn test_zero_frame_latency_rejected() {
        let err = CompositorConfig::from_json_str(r#"{"desiredMaximumFrameLatency":0}"#)
            .unwrap_err();
        assert!(matches!(err, CompositorError::Config(_)));
    }

    #[test]
    fn test_unknown_variant_is_json_error() {
        let err = CompositorConfig::from_json_str(r#"{"backends":"glide"}"#).unwrap_err();
        assert!(matches!(err, CompositorError::Json(_)));
    }

    #[test]
    fn test_wgpu_conversions() {
        assert_eq!(wgpu::Backends::from(BackendSelection::Vulkan), wgpu::Backends::VULKAN);
        assert_eq!(
            wgpu::TextureFormat::from(OffscreenFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
        assert_eq!(
            wgpu::PresentMode::from(PresentMode::Mailbox),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = CompositorConfig::load("/nonexistent/compositor.json").unwrap_err();
        assert!(err.to_string().contains("failed to read compositor config"));
    }

    #[test]
    fn test_global_set_rejects_invalid() {
        let before = current();
        let invalid = CompositorConfig {
            desired_maximum_frame_latency: 0,
            ..CompositorConfig::default()
        };
        assert!(set(invalid).is_err());
        assert_eq!(current(), before);
    }
}
