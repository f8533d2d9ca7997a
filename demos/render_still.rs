//! Render a still frame through the compositor and save the result.
//!
//! Usage: cargo run --example render_still [input image] [output.png]
//!
//! Without an input a test gradient is generated. The frame is letterboxed
//! into a 1280x720 target.

use frame_compositor::error::{CompositorResult, ResultExt};
use frame_compositor::transform::Rect;
use frame_compositor::{
    logging, CompositorConfig, DecodedFrame, DrawStatus, DrawTarget, FrameCompositor,
};

const TARGET_WIDTH: u32 = 1280;
const TARGET_HEIGHT: u32 = 720;

fn gradient(width: u32, height: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        image::Rgba([r, g, 128, 255])
    })
}

/// Largest rect with the frame's aspect ratio centered in the target.
fn letterbox(frame_w: u32, frame_h: u32) -> Rect<frame_compositor::PixelSpace> {
    let scale = (TARGET_WIDTH as f64 / frame_w as f64).min(TARGET_HEIGHT as f64 / frame_h as f64);
    let w = frame_w as f64 * scale;
    let h = frame_h as f64 * scale;
    Rect::from_coords(
        (TARGET_WIDTH as f64 - w) / 2.0,
        (TARGET_HEIGHT as f64 - h) / 2.0,
        w,
        h,
    )
}

fn main() -> CompositorResult<()> {
    logging::init_logging();

    let mut args = std::env::args().skip(1);
    let input = args.next();
    let output = args.next().unwrap_or_else(|| "render_still.png".to_string());

    let frame = match &input {
        Some(path) => DecodedFrame::from_image(
            image::open(path).with_context(|| format!("Failed to open {}", path))?,
        ),
        None => DecodedFrame::from_image(image::DynamicImage::ImageRgba8(gradient(640, 360))),
    };

    let mut compositor = FrameCompositor::with_config(
        DrawTarget::offscreen(TARGET_WIDTH, TARGET_HEIGHT),
        CompositorConfig::default(),
    );
    compositor.initialize_blocking()?;

    let texture = compositor
        .create_texture_from_source(&frame)
        .ok_or("Frame could not be uploaded")?;

    let status = compositor.draw_rect(&texture, letterbox(frame.width, frame.height));
    if status != DrawStatus::Submitted {
        log::warn!("Draw skipped: {:?}", status);
    }

    let image = pollster::block_on(compositor.read_image()).ok_or("Read-back failed")?;
    image.save(&output)?;
    println!("Wrote {}x{} frame to {}", image.width(), image.height(), output);

    compositor.teardown();
    Ok(())
}
