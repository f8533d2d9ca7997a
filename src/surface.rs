//! Draw targets.
//!
//! A [`DrawTarget`] is what the host hands the compositor at construction: a
//! native window, a browser canvas, or an offscreen texture. Initialization
//! turns it into a [`BoundTarget`] tied to the device.

use std::fmt;
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::{Device, Surface, SurfaceConfiguration, TextureFormat};

use crate::config::CompositorConfig;
use crate::error::{CompositorError, CompositorResult};
use crate::renderer::Renderer;

/// Presentable target supplied by the host UI layer.
pub enum DrawTarget {
    /// Any native window exposing raw window/display handles.
    Window {
        handle: Arc<dyn wgpu::WindowHandle>,
        width: u32,
        height: u32,
    },
    /// A canvas element in the webview.
    #[cfg(target_arch = "wasm32")]
    Canvas(web_sys::HtmlCanvasElement),
    /// GPU texture only, read back with `FrameCompositor::read_pixels`.
    Offscreen { width: u32, height: u32 },
}

impl DrawTarget {
    /// Target a native window with a drawable area of `width` x `height` pixels.
    pub fn window<W>(window: Arc<W>, width: u32, height: u32) -> Self
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        DrawTarget::Window {
            handle: window,
            width,
            height,
        }
    }

    pub fn offscreen(width: u32, height: u32) -> Self {
        DrawTarget::Offscreen { width, height }
    }

    /// Current drawable size in pixels.
    pub fn size(&self) -> (u32, u32) {
        match self {
            DrawTarget::Window { width, height, .. } => (*width, *height),
            #[cfg(target_arch = "wasm32")]
            DrawTarget::Canvas(canvas) => (canvas.width(), canvas.height()),
            DrawTarget::Offscreen { width, height } => (*width, *height),
        }
    }

    pub(crate) fn set_size(&mut self, new_width: u32, new_height: u32) {
        match self {
            DrawTarget::Window { width, height, .. } | DrawTarget::Offscreen { width, height } => {
                *width = new_width;
                *height = new_height;
            },
            #[cfg(target_arch = "wasm32")]
            DrawTarget::Canvas(canvas) => {
                canvas.set_width(new_width);
                canvas.set_height(new_height);
            },
        }
    }

    /// Create the presentable surface, if this target has one.
    pub(crate) fn create_surface(
        &self,
        instance: &wgpu::Instance,
    ) -> CompositorResult<Option<Surface<'static>>> {
        match self {
            DrawTarget::Window { handle, .. } => {
                Ok(Some(instance.create_surface(Arc::clone(handle))?))
            },
            #[cfg(target_arch = "wasm32")]
            DrawTarget::Canvas(canvas) => Ok(Some(
                instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?,
            )),
            DrawTarget::Offscreen { .. } => Ok(None),
        }
    }
}

impl fmt::Debug for DrawTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = self.size();
        let kind = match self {
            DrawTarget::Window { .. } => "Window",
            #[cfg(target_arch = "wasm32")]
            DrawTarget::Canvas(_) => "Canvas",
            DrawTarget::Offscreen { .. } => "Offscreen",
        };
        write!(f, "DrawTarget::{}({}x{})", kind, width, height)
    }
}

/// Why a surface frame could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// The surface was outdated or lost and has been reconfigured.
    Reconfigured,
    /// Timed out or out of memory; try again next frame.
    Unavailable,
}

/// A draw target bound to a device.
pub(crate) enum BoundTarget {
    Surface {
        surface: Surface<'static>,
        config: SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        format: TextureFormat,
    },
}

impl BoundTarget {
    /// Bind `target` to the renderer's device, configuring `surface` with the
    /// preferred format it reports.
    pub fn bind(
        target: &DrawTarget,
        surface: Option<Surface<'static>>,
        renderer: &Renderer,
        config: &CompositorConfig,
    ) -> CompositorResult<Self> {
        let (width, height) = target.size();

        let Some(surface) = surface else {
            let format = TextureFormat::from(config.offscreen_format);
            let texture = create_offscreen_texture(renderer.device(), format, width, height);
            log::debug!(
                "[SURFACE] Offscreen target {}x{} ({:?})",
                width,
                height,
                format
            );
            return Ok(BoundTarget::Offscreen { texture, format });
        };

        let caps = surface.get_capabilities(renderer.adapter());
        let format = caps.formats.first().copied().ok_or_else(|| {
            CompositorError::Surface("surface is not compatible with the adapter".to_string())
        })?;

        let alpha_mode = if caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let requested = wgpu::PresentMode::from(config.present_mode);
        let present_mode = if caps.present_modes.contains(&requested) {
            requested
        } else {
            log::warn!(
                "[SURFACE] Present mode {:?} unsupported, falling back to Fifo",
                requested
            );
            wgpu::PresentMode::Fifo
        };

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: config.desired_maximum_frame_latency,
        };
        surface.configure(renderer.device(), &surface_config);

        log::info!(
            "[SURFACE] Surface configured: {}x{} {:?} {:?}",
            surface_config.width,
            surface_config.height,
            format,
            alpha_mode
        );

        Ok(BoundTarget::Surface {
            surface,
            config: surface_config,
        })
    }

    pub fn format(&self) -> TextureFormat {
        match self {
            BoundTarget::Surface { config, .. } => config.format,
            BoundTarget::Offscreen { format, .. } => *format,
        }
    }

    /// Physical size of the bound surface or texture.
    pub fn size(&self) -> (u32, u32) {
        match self {
            BoundTarget::Surface { config, .. } => (config.width, config.height),
            BoundTarget::Offscreen { texture, .. } => (texture.width(), texture.height()),
        }
    }

    /// Reconfigure (surface) or reallocate (offscreen) to a new size.
    /// Zero sizes are ignored.
    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        if width == 0 || height == 0 || self.size() == (width, height) {
            return;
        }

        match self {
            BoundTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(device, config);
            },
            BoundTarget::Offscreen { texture, format } => {
                *texture = create_offscreen_texture(device, *format, width, height);
            },
        }
        log::debug!("[SURFACE] Resized to {}x{}", width, height);
    }

    /// Get the texture to render the next frame into.
    pub fn acquire(&self, device: &Device) -> Result<TargetFrame, AcquireError> {
        match self {
            BoundTarget::Surface { surface, config } => match surface.get_current_texture() {
                Ok(frame) => {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    Ok(TargetFrame {
                        view,
                        surface_texture: Some(frame),
                    })
                },
                Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                    log::debug!("[SURFACE] Surface outdated or lost, reconfiguring");
                    surface.configure(device, config);
                    Err(AcquireError::Reconfigured)
                },
                Err(e) => {
                    log::warn!("[SURFACE] Failed to get surface texture: {}", e);
                    Err(AcquireError::Unavailable)
                },
            },
            BoundTarget::Offscreen { texture, .. } => Ok(TargetFrame {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: None,
            }),
        }
    }

    /// The offscreen texture, if this target is offscreen.
    pub fn offscreen_texture(&self) -> Option<&wgpu::Texture> {
        match self {
            BoundTarget::Offscreen { texture, .. } => Some(texture),
            BoundTarget::Surface { .. } => None,
        }
    }
}

/// One frame's render attachment.
pub(crate) struct TargetFrame {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl TargetFrame {
    /// Present to the window/canvas. Offscreen frames need nothing.
    pub fn present(self) {
        drop(self.view);
        if let Some(frame) = self.surface_texture {
            frame.present();
        }
    }
}

fn create_offscreen_texture(
    device: &Device,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offscreen_size_and_resize() {
        let mut target = DrawTarget::offscreen(640, 480);
        assert_eq!(target.size(), (640, 480));
        target.set_size(320, 200);
        assert_eq!(target.size(), (320, 200));
    }

    #[test]
    fn test_offscreen_has_no_surface() {
        let config = CompositorConfig::default();
        let instance = Renderer::create_instance(&config).unwrap();
        let target = DrawTarget::offscreen(16, 16);
        assert!(target.create_surface(&instance).unwrap().is_none());
    }

    #[test]
    fn test_debug_format() {
        let target = DrawTarget::offscreen(8, 4);
        assert_eq!(format!("{:?}", target), "DrawTarget::Offscreen(8x4)");
    }
}
