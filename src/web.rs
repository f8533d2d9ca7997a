//! Browser bindings.
//!
//! Exposes the compositor to the webview preview over a canvas element.
//! Textures stay on the Rust side; JavaScript holds numeric handles and
//! releases them when the frame is no longer needed.

use std::collections::HashMap;

use wasm_bindgen::prelude::*;

use crate::compositor::{DrawStatus, FrameCompositor};
use crate::error::{CompositorError, CompositorResult, OptionExt};
use crate::surface::DrawTarget;
use crate::types::{write_rgba, TextureSource};

impl From<CompositorError> for JsValue {
    fn from(err: CompositorError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

#[wasm_bindgen(start)]
pub fn init() {
    crate::logging::init_logging();
    log::info!("[WEB] Frame compositor module loaded");
}

/// An `ImageBitmap` produced by the page (video element, decoder output).
struct BitmapSource<'a>(&'a web_sys::ImageBitmap);

impl TextureSource for BitmapSource<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.0.width(), self.0.height())
    }

    fn upload(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> CompositorResult<()> {
        let (width, height) = self.dimensions();
        queue.copy_external_image_to_texture(
            &wgpu::CopyExternalImageSourceInfo {
                source: wgpu::ExternalImageSource::ImageBitmap(self.0.clone()),
                origin: wgpu::Origin2d::ZERO,
                flip_y: false,
            },
            wgpu::CopyExternalImageDestInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
                color_space: wgpu::PredefinedColorSpace::Srgb,
                premultiplied_alpha: false,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }
}

/// Raw RGBA bytes passed from JavaScript.
struct RgbaBytes<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl TextureSource for RgbaBytes<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn upload(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> CompositorResult<()> {
        write_rgba(queue, texture, self.data, self.width, self.height)
    }
}

fn find_canvas(canvas_id: &str) -> CompositorResult<web_sys::HtmlCanvasElement> {
    let document = web_sys::window()
        .context("No window")?
        .document()
        .context("No document")?;
    document
        .get_element_by_id(canvas_id)
        .context("Canvas not found")?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| CompositorError::Surface(format!("#{} is not a canvas", canvas_id)))
}

/// Compositor bound to a canvas element.
#[wasm_bindgen]
pub struct WasmFrameCompositor {
    compositor: FrameCompositor,
    textures: HashMap<u32, wgpu::Texture>,
    next_handle: u32,
}

#[wasm_bindgen]
impl WasmFrameCompositor {
    /// Create and initialize a compositor drawing into `#canvas_id`.
    ///
    /// Rejects when WebGPU/WebGL is unavailable; the page should fall back to
    /// its 2D canvas path.
    #[wasm_bindgen]
    pub async fn create(canvas_id: &str) -> Result<WasmFrameCompositor, JsValue> {
        log::info!("[WEB] Creating compositor for canvas: {}", canvas_id);

        let canvas = find_canvas(canvas_id)?;
        let mut compositor = FrameCompositor::new(DrawTarget::Canvas(canvas));
        compositor.initialize().await?;

        Ok(Self {
            compositor,
            textures: HashMap::new(),
            next_handle: 1,
        })
    }

    fn insert(&mut self, texture: Option<wgpu::Texture>) -> Option<u32> {
        let texture = texture?;
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.textures.insert(handle, texture);
        Some(handle)
    }

    /// Upload an `ImageBitmap`. Returns a texture handle, or `undefined`.
    #[wasm_bindgen(js_name = createTextureFromBitmap)]
    pub fn create_texture_from_bitmap(&mut self, bitmap: &web_sys::ImageBitmap) -> Option<u32> {
        let texture = self
            .compositor
            .create_texture_from_source(&BitmapSource(bitmap));
        self.insert(texture)
    }

    /// Upload tightly packed RGBA bytes. Returns a texture handle, or `undefined`.
    #[wasm_bindgen(js_name = createTextureFromRgba)]
    pub fn create_texture_from_rgba(&mut self, data: &[u8], width: u32, height: u32) -> Option<u32> {
        let texture = self.compositor.create_texture_from_source(&RgbaBytes {
            data,
            width,
            height,
        });
        self.insert(texture)
    }

    /// Destroy the texture behind `handle`.
    #[wasm_bindgen(js_name = releaseTexture)]
    pub fn release_texture(&mut self, handle: u32) {
        if let Some(texture) = self.textures.remove(&handle) {
            texture.destroy();
        }
    }

    /// Draw a texture at a pixel rectangle. Returns whether anything was submitted.
    pub fn draw(&mut self, handle: u32, x: f32, y: f32, width: f32, height: f32) -> bool {
        let Some(texture) = self.textures.get(&handle) else {
            log::warn!("[WEB] Unknown texture handle {}", handle);
            return false;
        };
        matches!(
            self.compositor.draw(texture, x, y, width, height),
            DrawStatus::Submitted
        )
    }

    /// Resize the canvas drawing buffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.compositor.resize(width, height);
    }

    /// Release every texture and the GPU device.
    pub fn destroy(&mut self) {
        for (_, texture) in self.textures.drain() {
            texture.destroy();
        }
        self.compositor.teardown();
    }
}
