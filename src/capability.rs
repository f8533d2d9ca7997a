//! GPU capability detection.
//!
//! Lets the frontend decide whether to enable the GPU preview before it
//! creates a compositor, and lists adapters for the diagnostics panel.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::CompositorConfig;
use crate::renderer::Renderer;

/// Summary of the adapter a compositor would get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdapterSummary {
    pub name: String,
    /// e.g. Vulkan, Metal, Dx12, Gl
    pub backend: String,
    pub device_type: String,
    pub driver: String,
}

impl From<&wgpu::AdapterInfo> for AdapterSummary {
    fn from(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: format!("{:?}", info.backend),
            device_type: device_type_name(info.device_type).to_string(),
            driver: driver_label(&info.driver, &info.driver_info),
        }
    }
}

fn driver_label(driver: &str, driver_info: &str) -> String {
    if driver_info.is_empty() {
        driver.to_string()
    } else {
        format!("{} ({})", driver, driver_info)
    }
}

/// Result of probing for GPU support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "status", rename_all = "camelCase")]
#[ts(export)]
pub enum GpuCapability {
    Available { adapter: AdapterSummary },
    Unavailable { reason: String },
}

impl GpuCapability {
    pub fn is_available(&self) -> bool {
        matches!(self, GpuCapability::Available { .. })
    }
}

/// Check whether an adapter matching `config` exists. Never fails; problems
/// are reported as `Unavailable`.
pub async fn probe(config: &CompositorConfig) -> GpuCapability {
    let instance = match Renderer::create_instance(config) {
        Ok(instance) => instance,
        Err(e) => {
            return GpuCapability::Unavailable {
                reason: e.to_string(),
            }
        },
    };

    let result = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference.into(),
            force_fallback_adapter: config.force_fallback_adapter,
            compatible_surface: None,
        })
        .await;

    match result {
        Ok(adapter) => {
            let summary = AdapterSummary::from(&adapter.get_info());
            log::debug!("[CAPABILITY] GPU available: {}", summary.name);
            GpuCapability::Available { adapter: summary }
        },
        Err(e) => {
            log::info!("[CAPABILITY] GPU unavailable: {}", e);
            GpuCapability::Unavailable {
                reason: e.to_string(),
            }
        },
    }
}

/// One entry of the adapter list shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GpuInfo {
    pub name: String,
    /// e.g. Vulkan, Metal, Dx12
    pub backend: String,
    /// DiscreteGpu, IntegratedGpu, VirtualGpu, Cpu or Other
    pub device_type: String,
}

impl GpuInfo {
    pub fn new(
        name: impl Into<String>,
        backend: wgpu::Backend,
        device_type: wgpu::DeviceType,
    ) -> Self {
        Self {
            name: name.into(),
            backend: format!("{:?}", backend),
            device_type: device_type_name(device_type).to_string(),
        }
    }
}

impl From<&wgpu::AdapterInfo> for GpuInfo {
    fn from(info: &wgpu::AdapterInfo) -> Self {
        Self::new(info.name.clone(), info.backend, info.device_type)
    }
}

/// List every adapter on the enabled backends.
#[cfg(not(target_arch = "wasm32"))]
pub fn enumerate_gpus(
    backends: crate::config::BackendSelection,
) -> crate::error::CompositorResult<Vec<GpuInfo>> {
    let backends = wgpu::Backends::from(backends);
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    let gpus: Vec<GpuInfo> = instance
        .enumerate_adapters(backends)
        .iter()
        .map(|adapter| GpuInfo::from(&adapter.get_info()))
        .collect();

    if gpus.is_empty() {
        return Err(crate::error::CompositorError::NoAdapter(
            "no graphics adapter detected".to_string(),
        ));
    }

    log::debug!("[CAPABILITY] Found {} adapter(s)", gpus.len());
    Ok(gpus)
}

pub fn device_type_name(device_type: wgpu::DeviceType) -> &'static str {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => "DiscreteGpu",
        wgpu::DeviceType::IntegratedGpu => "IntegratedGpu",
        wgpu::DeviceType::VirtualGpu => "VirtualGpu",
        wgpu::DeviceType::Cpu => "Cpu",
        wgpu::DeviceType::Other => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> GpuInfo {
        GpuInfo::new(
            "Test GPU",
            wgpu::Backend::Vulkan,
            wgpu::DeviceType::DiscreteGpu,
        )
    }

    #[test]
    fn test_gpu_info_fields() {
        let info = sample_info();
        assert_eq!(info.name, "Test GPU");
        assert_eq!(info.backend, "Vulkan");
        assert_eq!(info.device_type, "DiscreteGpu");
    }

    #[test]
    fn test_gpu_info_serializes_camel_case() {
        let json = serde_json::to_string(&sample_info()).unwrap();
        assert!(json.contains("\"deviceType\":\"DiscreteGpu\""));
    }

    #[test]
    fn test_driver_label() {
        assert_eq!(driver_label("test-driver", "1.2.3"), "test-driver (1.2.3)");
        assert_eq!(driver_label("test-driver", ""), "test-driver");
    }

    #[test]
    fn test_device_type_names() {
        assert_eq!(device_type_name(wgpu::DeviceType::Cpu), "Cpu");
        assert_eq!(device_type_name(wgpu::DeviceType::VirtualGpu), "VirtualGpu");
        assert_eq!(device_type_name(wgpu::DeviceType::Other), "Other");
    }

    #[test]
    fn test_probe_disabled_is_unavailable() {
        let config = CompositorConfig {
            gpu_acceleration: false,
            ..CompositorConfig::default()
        };
        let capability = pollster::block_on(probe(&config));
        assert!(!capability.is_available());
        assert!(matches!(
            capability,
            GpuCapability::Unavailable { reason } if reason.contains("disabled")
        ));
    }

    #[test]
    fn test_capability_json_is_tagged() {
        let capability = GpuCapability::Unavailable {
            reason: "no adapter".to_string(),
        };
        let json = serde_json::to_string(&capability).unwrap();
        assert_eq!(json, r#"{"status":"unavailable","reason":"no adapter"}"#);
    }
}
