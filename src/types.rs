//! Frame data handed to the compositor.
//!
//! The compositor never decodes media. Frames arrive already decoded from the
//! conversion backend as RGBA bytes, or as `image` buffers for stills.

use image::{DynamicImage, RgbaImage};

use crate::error::{CompositorError, CompositorResult};

/// Something that can be uploaded into a freshly allocated RGBA texture.
pub trait TextureSource {
    /// Width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the pixels into `texture`, which has exactly `dimensions()`.
    fn upload(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> CompositorResult<()>;
}

/// A decoded video frame ready for GPU upload.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Frame number (0-indexed).
    pub frame_number: u32,
    /// Timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl DecodedFrame {
    pub fn new(
        frame_number: u32,
        timestamp_ms: u64,
        data: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            frame_number,
            timestamp_ms,
            data,
            width,
            height,
        }
    }

    /// A frame filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgba);
        }
        Self::new(0, 0, data, width, height)
    }

    /// Convert a decoded still image.
    pub fn from_image(image: DynamicImage) -> Self {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(0, 0, rgba.into_raw(), width, height)
    }

    /// Bytes a frame of this size must carry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl TextureSource for DecodedFrame {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn upload(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> CompositorResult<()> {
        write_rgba(queue, texture, &self.data, self.width, self.height)
    }
}

impl TextureSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    fn upload(&self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> CompositorResult<()> {
        let (width, height) = RgbaImage::dimensions(self);
        write_rgba(queue, texture, self.as_raw(), width, height)
    }
}

/// Queue a tightly packed RGBA8 upload covering the whole texture.
pub(crate) fn write_rgba(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    data: &[u8],
    width: u32,
    height: u32,
) -> CompositorResult<()> {
    let expected = width as usize * height as usize * 4;
    if data.len() != expected {
        return Err(CompositorError::Image(format!(
            "frame is {} bytes, expected {} for {}x{} RGBA",
            data.len(),
            expected,
            width,
            height
        )));
    }

    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame() {
        let frame = DecodedFrame::solid(3, 2, [10, 20, 30, 255]);
        assert_eq!(frame.data.len(), frame.expected_len());
        assert_eq!(&frame.data[4..8], &[10, 20, 30, 255]);
        assert_eq!(TextureSource::dimensions(&frame), (3, 2));
    }

    #[test]
    fn test_from_image_converts_to_rgba() {
        let rgb = image::RgbImage::from_pixel(4, 5, image::Rgb([1, 2, 3]));
        let frame = DecodedFrame::from_image(DynamicImage::ImageRgb8(rgb));
        assert_eq!((frame.width, frame.height), (4, 5));
        assert_eq!(frame.data.len(), 4 * 5 * 4);
        assert_eq!(&frame.data[0..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_rgba_image_dimensions() {
        let img = RgbaImage::new(7, 9);
        assert_eq!(TextureSource::dimensions(&img), (7, 9));
    }
}
