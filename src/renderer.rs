//! wgpu device setup and management.
//!
//! Handles instance/adapter/device/queue acquisition, shader compilation and
//! texture read-back.

use std::sync::Arc;

use wgpu::{Adapter, AdapterInfo, Device, Instance, Queue};

use crate::config::CompositorConfig;
use crate::error::{CompositorError, CompositorResult};

/// GPU device and queue, plus the adapter they came from.
pub struct Renderer {
    instance: Instance,
    adapter: Adapter,
    /// wgpu device.
    device: Arc<Device>,
    /// wgpu queue.
    queue: Arc<Queue>,
}

impl Renderer {
    /// Create a wgpu instance for the configured backends.
    pub fn create_instance(config: &CompositorConfig) -> CompositorResult<Instance> {
        if !config.gpu_acceleration {
            return Err(CompositorError::GpuUnavailable(
                "GPU acceleration is disabled".to_string(),
            ));
        }

        let backends = wgpu::Backends::from(config.backends);
        #[cfg(target_arch = "wasm32")]
        let backends = backends | wgpu::Backends::BROWSER_WEBGPU;

        Ok(Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        }))
    }

    /// Request an adapter and device from `instance`.
    ///
    /// When `compatible_surface` is given the adapter must be able to present
    /// to it.
    pub async fn request(
        instance: Instance,
        config: &CompositorConfig,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> CompositorResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.into(),
                force_fallback_adapter: config.force_fallback_adapter,
                compatible_surface,
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "[RENDERER] Using GPU adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Frame Compositor Device"),
                required_features: wgpu::Features::empty(),
                // Downlevel limits so WebGL2 and older drivers still work.
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("[RENDERER] Uncaptured GPU error: {}", error);
        }));

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn adapter_info(&self) -> AdapterInfo {
        self.adapter.get_info()
    }

    /// Largest texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Compile a WGSL shader module.
    pub fn create_shader(&self, source: &str, label: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }
}

/// Read a 4-byte-per-pixel texture back to CPU memory, row padding removed.
///
/// The texture needs `COPY_SRC` usage.
pub async fn read_texture(
    device: &Device,
    queue: &Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> CompositorResult<Vec<u8>> {
    let bytes_per_row = 4 * width;
    let padded_bytes_per_row = padded_bytes_per_row(width);
    let buffer_size = (padded_bytes_per_row * height) as u64;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Read Buffer"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Read Encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(Some(encoder.finish()));

    let buffer_slice = buffer.slice(..);
    let (tx, rx) = tokio::sync::oneshot::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    if let Err(e) = device.poll(wgpu::PollType::Wait) {
        log::warn!("[RENDERER] Device poll failed during read-back: {}", e);
    }

    rx.await
        .map_err(|_| CompositorError::Other("read-back callback dropped".to_string()))?
        .map_err(|e| CompositorError::Other(format!("failed to map read-back buffer: {}", e)))?;

    let data = buffer_slice.get_mapped_range();
    let pixels = if padded_bytes_per_row != bytes_per_row {
        let mut result = Vec::with_capacity((bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            let end = start + bytes_per_row as usize;
            result.extend_from_slice(&data[start..end]);
        }
        result
    } else {
        data.to_vec()
    };
    drop(data);
    buffer.unmap();

    Ok(pixels)
}

/// Row pitch rounded up to `COPY_BYTES_PER_ROW_ALIGNMENT` (256).
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (4 * width).div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_row_pitch() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(800), 3328);
    }

    #[test]
    fn test_disabled_acceleration_is_unavailable() {
        let config = CompositorConfig {
            gpu_acceleration: false,
            ..CompositorConfig::default()
        };
        let err = Renderer::create_instance(&config).err().unwrap();
        assert!(matches!(err, CompositorError::GpuUnavailable(_)));
    }

    #[test]
    fn test_request_device() {
        let config = CompositorConfig::default();
        let instance = Renderer::create_instance(&config).unwrap();
        let renderer = match pollster::block_on(Renderer::request(instance, &config, None)) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[SKIP] GPU not available: {}", e);
                return;
            },
        };

        assert!(renderer.max_texture_dimension() >= 2048);
        assert!(renderer.device().limits().max_bind_groups > 0);
    }
}
