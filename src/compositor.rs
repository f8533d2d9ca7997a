//! Frame compositor using wgpu shaders.
//!
//! Draws one texture per call as a quad at an arbitrary pixel rectangle of the
//! target. Every draw opens its own render pass that clears the target to
//! transparent black, so only the most recent draw is visible.

use std::sync::Arc;

use wgpu::{Device, Queue, TextureFormat};

use crate::capability::AdapterSummary;
use crate::config::{self, CompositorConfig};
use crate::error::CompositorResult;
use crate::renderer::{self, Renderer};
use crate::surface::{AcquireError, BoundTarget, DrawTarget};
use crate::transform::{ClipTransform, PixelSpace, Rect, Size, TransformUniform};
use crate::types::TextureSource;

/// Expands a unit quad (two triangles, six vertices, no vertex buffer) with
/// the transform uniform and samples the bound texture with the quad UVs.
const COMPOSITOR_SHADER: &str = r#"
struct Uniforms {
    mvp: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var frame_sampler: sampler;
@group(0) @binding(2) var frame_texture: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0)
    );

    let pos = positions[vertex_index];
    var output: VertexOutput;
    output.position = uniforms.mvp * vec4<f32>(pos, 0.0, 1.0);
    output.uv = pos;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, input.uv);
}
"#;

/// Vertices per quad: two triangles.
const QUAD_VERTEX_COUNT: u32 = 6;

/// Format of textures created from frame sources.
pub const SOURCE_TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Outcome of a [`FrameCompositor::draw`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawStatus {
    /// Commands were submitted (and presented, for window/canvas targets).
    Submitted,
    /// Nothing was rendered.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `initialize` has not completed, or the compositor was torn down.
    NotReady,
    /// The target has a zero dimension.
    EmptyTarget,
    /// No surface frame could be acquired this time.
    SurfaceUnavailable,
}

/// Everything a draw needs. Exists only as a whole.
struct GpuResources {
    target: BoundTarget,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    renderer: Renderer,
}

impl GpuResources {
    fn new(renderer: Renderer, target: BoundTarget) -> Self {
        let device = renderer.device();
        let shader = renderer.create_shader(COMPOSITOR_SHADER, "Compositor Shader");

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Compositor Bind Group Layout"),
            entries: &[
                // Transform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(TransformUniform::SIZE),
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Compositor Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Compositor Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Compositor Uniforms"),
            size: TransformUniform::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            target,
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            renderer,
        }
    }

    fn device(&self) -> &Arc<Device> {
        self.renderer.device()
    }

    fn queue(&self) -> &Arc<Queue> {
        self.renderer.queue()
    }
}

enum CompositorState {
    Uninitialized,
    Ready(Box<GpuResources>),
}

/// Compositor for GPU-accelerated frame rendering.
///
/// Calls must be serialized by the caller; `initialize` must complete before
/// draws have any effect. Every operation other than `initialize` is a no-op
/// on a compositor that is not ready.
pub struct FrameCompositor {
    target: DrawTarget,
    config: CompositorConfig,
    state: CompositorState,
}

impl FrameCompositor {
    /// Create a compositor for `target` using the global config.
    pub fn new(target: DrawTarget) -> Self {
        Self::with_config(target, config::current())
    }

    pub fn with_config(target: DrawTarget, config: CompositorConfig) -> Self {
        Self {
            target,
            config,
            state: CompositorState::Uninitialized,
        }
    }

    /// Acquire the adapter and device, configure the target and build the
    /// pipeline.
    ///
    /// Calling this on a ready compositor does nothing. On failure the
    /// compositor stays uninitialized and the call may be retried.
    pub async fn initialize(&mut self) -> CompositorResult<()> {
        if self.is_ready() {
            log::debug!("[COMPOSITOR] Already initialized");
            return Ok(());
        }

        log::info!("[COMPOSITOR] Initializing for {:?}", self.target);

        let instance = Renderer::create_instance(&self.config)?;
        let surface = self.target.create_surface(&instance)?;
        let renderer = Renderer::request(instance, &self.config, surface.as_ref()).await?;
        let target = BoundTarget::bind(&self.target, surface, &renderer, &self.config)?;
        let resources = GpuResources::new(renderer, target);

        log::info!(
            "[COMPOSITOR] Ready: {:?} target, {:?}",
            resources.target.size(),
            resources.target.format()
        );
        self.state = CompositorState::Ready(Box::new(resources));
        Ok(())
    }

    /// Blocking [`initialize`](Self::initialize) for hosts without an executor.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn initialize_blocking(&mut self) -> CompositorResult<()> {
        pollster::block_on(self.initialize())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, CompositorState::Ready(_))
    }

    /// Upload `source` into a new texture the caller owns.
    ///
    /// Returns `None` when not ready, or when the source is empty, larger than
    /// the device allows, or malformed. Nothing is cached; calling twice
    /// allocates twice.
    pub fn create_texture_from_source<S>(&self, source: &S) -> Option<wgpu::Texture>
    where
        S: TextureSource + ?Sized,
    {
        let CompositorState::Ready(gpu) = &self.state else {
            log::debug!("[COMPOSITOR] Texture requested before initialization");
            return None;
        };

        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            log::warn!("[COMPOSITOR] Ignoring empty source ({}x{})", width, height);
            return None;
        }

        let max = gpu.renderer.max_texture_dimension();
        if width > max || height > max {
            log::warn!(
                "[COMPOSITOR] Source {}x{} exceeds max texture size {}",
                width,
                height,
                max
            );
            return None;
        }

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SOURCE_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        if let Err(e) = source.upload(gpu.queue(), &texture) {
            log::warn!("[COMPOSITOR] Failed to upload frame: {}", e);
            texture.destroy();
            return None;
        }

        Some(texture)
    }

    /// Draw `texture` stretched over the pixel rectangle `(x, y, width, height)`.
    pub fn draw(
        &mut self,
        texture: &wgpu::Texture,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> DrawStatus {
        let rect = Rect::from_coords(x as f64, y as f64, width as f64, height as f64);
        self.draw_rect(texture, rect)
    }

    /// Draw `texture` over `rect`, clearing the target first.
    pub fn draw_rect(&mut self, texture: &wgpu::Texture, rect: Rect<PixelSpace>) -> DrawStatus {
        let (target_w, target_h) = self.target.size();

        let CompositorState::Ready(gpu) = &mut self.state else {
            return DrawStatus::Skipped(SkipReason::NotReady);
        };

        let Some(transform) = ClipTransform::for_rect(rect, Size::from_u32(target_w, target_h))
        else {
            log::debug!("[COMPOSITOR] Skipping draw on empty target");
            return DrawStatus::Skipped(SkipReason::EmptyTarget);
        };

        let device = Arc::clone(gpu.device());
        let queue = Arc::clone(gpu.queue());

        // Canvas targets can be resized by the page between draws.
        gpu.target.resize(&device, target_w, target_h);

        let frame = match gpu.target.acquire(&device) {
            Ok(frame) => frame,
            Err(AcquireError::Reconfigured) | Err(AcquireError::Unavailable) => {
                return DrawStatus::Skipped(SkipReason::SurfaceUnavailable);
            },
        };

        queue.write_buffer(
            &gpu.uniform_buffer,
            0,
            bytemuck::bytes_of(&transform.to_uniform()),
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Compositor Bind Group"),
            layout: &gpu.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: gpu.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&gpu.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Compositor Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Compositor Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&gpu.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        queue.submit(Some(encoder.finish()));
        frame.present();

        DrawStatus::Submitted
    }

    /// Change the drawable size. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.target.set_size(width, height);
        if let CompositorState::Ready(gpu) = &mut self.state {
            let device = Arc::clone(gpu.device());
            gpu.target.resize(&device, width, height);
        }
    }

    /// Read back the last rendered frame as tightly packed 8-bit pixels in the
    /// target's channel order. Offscreen targets only.
    pub async fn read_pixels(&self) -> Option<Vec<u8>> {
        let CompositorState::Ready(gpu) = &self.state else {
            return None;
        };
        let texture = gpu.target.offscreen_texture()?;

        match renderer::read_texture(
            gpu.device(),
            gpu.queue(),
            texture,
            texture.width(),
            texture.height(),
        )
        .await
        {
            Ok(pixels) => Some(pixels),
            Err(e) => {
                log::warn!("[COMPOSITOR] Read-back failed: {}", e);
                None
            },
        }
    }

    /// Read back the last rendered frame as an RGBA image. Offscreen targets only.
    pub async fn read_image(&self) -> Option<image::RgbaImage> {
        let format = self.surface_format()?;
        let mut pixels = self.read_pixels().await?;
        let (width, height) = match &self.state {
            CompositorState::Ready(gpu) => gpu.target.size(),
            CompositorState::Uninitialized => return None,
        };

        if matches!(
            format,
            TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb
        ) {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }

        image::RgbaImage::from_raw(width, height, pixels)
    }

    /// Release all GPU resources. The compositor can be initialized again.
    pub fn teardown(&mut self) {
        if let CompositorState::Ready(_) =
            std::mem::replace(&mut self.state, CompositorState::Uninitialized)
        {
            log::info!("[COMPOSITOR] Torn down");
        }
    }

    /// Logical drawable size in pixels.
    pub fn target_size(&self) -> (u32, u32) {
        self.target.size()
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Device handle, shared with the caller for interop.
    pub fn device(&self) -> Option<&Arc<Device>> {
        match &self.state {
            CompositorState::Ready(gpu) => Some(gpu.device()),
            CompositorState::Uninitialized => None,
        }
    }

    pub fn queue(&self) -> Option<&Arc<Queue>> {
        match &self.state {
            CompositorState::Ready(gpu) => Some(gpu.queue()),
            CompositorState::Uninitialized => None,
        }
    }

    /// Format the target was configured with.
    pub fn surface_format(&self) -> Option<TextureFormat> {
        match &self.state {
            CompositorState::Ready(gpu) => Some(gpu.target.format()),
            CompositorState::Uninitialized => None,
        }
    }

    pub fn adapter(&self) -> Option<AdapterSummary> {
        match &self.state {
            CompositorState::Ready(gpu) => Some(AdapterSummary::from(&gpu.renderer.adapter_info())),
            CompositorState::Uninitialized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::types::DecodedFrame;

    fn disabled_config() -> CompositorConfig {
        CompositorConfig {
            gpu_acceleration: false,
            ..CompositorConfig::default()
        }
    }

    /// Ready offscreen compositor, or `None` when the host has no GPU.
    fn ready_compositor(width: u32, height: u32) -> Option<FrameCompositor> {
        let mut compositor = FrameCompositor::with_config(
            DrawTarget::offscreen(width, height),
            CompositorConfig::default(),
        );
        match compositor.initialize_blocking() {
            Ok(()) => Some(compositor),
            Err(e) => {
                eprintln!("[SKIP] GPU not available: {}", e);
                None
            },
        }
    }

    #[test]
    fn test_new_compositor_is_not_ready() {
        let compositor = FrameCompositor::with_config(
            DrawTarget::offscreen(800, 600),
            CompositorConfig::default(),
        );
        assert!(!compositor.is_ready());
        assert!(compositor.device().is_none());
        assert!(compositor.surface_format().is_none());
        assert_eq!(compositor.target_size(), (800, 600));
    }

    #[test]
    fn test_texture_before_init_is_none() {
        let compositor = FrameCompositor::with_config(
            DrawTarget::offscreen(64, 64),
            CompositorConfig::default(),
        );
        let frame = DecodedFrame::solid(4, 4, [255, 0, 0, 255]);
        assert!(compositor.create_texture_from_source(&frame).is_none());
    }

    #[test]
    fn test_unsupported_gpu_is_reported_and_stays_safe() {
        let mut compositor =
            FrameCompositor::with_config(DrawTarget::offscreen(64, 64), disabled_config());

        let err = compositor.initialize_blocking().unwrap_err();
        assert!(matches!(err, CompositorError::GpuUnavailable(_)));
        assert!(err.is_capability_error());
        assert!(!compositor.is_ready());

        let frame = DecodedFrame::solid(4, 4, [255, 0, 0, 255]);
        assert!(compositor.create_texture_from_source(&frame).is_none());
        assert!(pollster::block_on(compositor.read_pixels()).is_none());
        compositor.resize(32, 32);
        compositor.teardown();
        assert_eq!(compositor.target_size(), (32, 32));
    }

    #[test]
    fn test_draw_before_init_is_skipped() {
        let Some(source) = ready_compositor(16, 16) else {
            return;
        };
        let frame = DecodedFrame::solid(2, 2, [0, 255, 0, 255]);
        let texture = source.create_texture_from_source(&frame).unwrap();

        let mut pending =
            FrameCompositor::with_config(DrawTarget::offscreen(16, 16), CompositorConfig::default());
        assert_eq!(
            pending.draw(&texture, 0.0, 0.0, 16.0, 16.0),
            DrawStatus::Skipped(SkipReason::NotReady)
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let Some(mut compositor) = ready_compositor(32, 32) else {
            return;
        };
        let device = Arc::clone(compositor.device().unwrap());

        compositor.initialize_blocking().unwrap();
        assert!(Arc::ptr_eq(&device, compositor.device().unwrap()));
    }

    #[test]
    fn test_rejects_malformed_sources() {
        let Some(compositor) = ready_compositor(32, 32) else {
            return;
        };

        let empty = DecodedFrame::new(0, 0, Vec::new(), 0, 0);
        assert!(compositor.create_texture_from_source(&empty).is_none());

        let short = DecodedFrame::new(0, 0, vec![0; 10], 4, 4);
        assert!(compositor.create_texture_from_source(&short).is_none());

        let too_wide = DecodedFrame::new(0, 0, Vec::new(), u32::MAX, 1);
        assert!(compositor.create_texture_from_source(&too_wide).is_none());
    }

    #[test]
    fn test_texture_matches_source_size() {
        let Some(compositor) = ready_compositor(32, 32) else {
            return;
        };
        let frame = DecodedFrame::solid(12, 7, [1, 2, 3, 4]);
        let texture = compositor.create_texture_from_source(&frame).unwrap();
        assert_eq!((texture.width(), texture.height()), (12, 7));
        assert_eq!(texture.format(), SOURCE_TEXTURE_FORMAT);
        assert!(texture
            .usage()
            .contains(wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST));
    }

    #[test]
    fn test_draw_after_teardown_is_skipped() {
        let Some(mut compositor) = ready_compositor(16, 16) else {
            return;
        };
        let frame = DecodedFrame::solid(2, 2, [0, 0, 255, 255]);
        let texture = compositor.create_texture_from_source(&frame).unwrap();

        assert_eq!(
            compositor.draw(&texture, 0.0, 0.0, 16.0, 16.0),
            DrawStatus::Submitted
        );

        compositor.teardown();
        assert!(!compositor.is_ready());
        assert_eq!(
            compositor.draw(&texture, 0.0, 0.0, 16.0, 16.0),
            DrawStatus::Skipped(SkipReason::NotReady)
        );
        assert!(compositor.create_texture_from_source(&frame).is_none());
    }
}
