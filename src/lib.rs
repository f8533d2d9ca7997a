//! GPU frame compositor for the video converter preview.
//!
//! Takes decoded frames, uploads them as textures and draws each one as a
//! quad at a pixel rectangle of a window, canvas or offscreen target.

pub mod capability;
pub mod compositor;
pub mod config;
pub mod error;
pub mod logging;
pub mod renderer;
pub mod surface;
pub mod transform;
pub mod types;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use capability::{probe, AdapterSummary, GpuCapability, GpuInfo};
#[cfg(not(target_arch = "wasm32"))]
pub use capability::enumerate_gpus;
pub use compositor::{DrawStatus, FrameCompositor, SkipReason};
pub use config::CompositorConfig;
pub use error::{CompositorError, CompositorResult};
pub use surface::DrawTarget;
pub use transform::{ClipTransform, PixelSpace, Rect};
pub use types::{DecodedFrame, TextureSource};
