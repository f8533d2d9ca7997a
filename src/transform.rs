//! Type-safe coordinate spaces for the quad transform.
//!
//! ```text
//! QuadSpace ──(ClipTransform)──▶ ClipSpace
//!                  ▲
//!     PixelSpace rect + target size
//! ```
//!
//! Each space is a phantom type so a pixel position can never be passed where
//! a clip-space position is expected without going through a conversion.

use std::marker::PhantomData;
use std::ops::{Add, Mul, Sub};

/// Target pixel coordinates. `(0, 0)` is the top-left corner, Y grows down.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct PixelSpace;

/// Local space of the unit quad the vertex stage expands.
/// Corners are `(0, 0)` and `(1, 1)`; also used as texture UVs.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct QuadSpace;

/// Normalized device coordinates, each axis in `[-1, 1]`, Y grows up.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct ClipSpace;

/// A 2D coordinate tagged with its space.
#[derive(Debug, Default, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Clone for Coord<TSpace> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for Coord<TSpace> {}

impl<TSpace> Coord<TSpace> {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn as_f32(&self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }

    /// Distance to another coordinate in the same space.
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl<T> Add for Coord<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T> Sub for Coord<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T> Mul<f64> for Coord<T> {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// Size in a specific coordinate space.
#[derive(Debug, Default, PartialEq)]
pub struct Size<TSpace> {
    pub width: f64,
    pub height: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Clone for Size<TSpace> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for Size<TSpace> {}

impl<TSpace> Size<TSpace> {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            _space: PhantomData,
        }
    }

    pub fn from_u32(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// True when either dimension is zero, negative, or not finite.
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

/// A rectangle in a specific coordinate space.
#[derive(Debug, Default, PartialEq)]
pub struct Rect<TSpace> {
    pub origin: Coord<TSpace>,
    pub size: Size<TSpace>,
}

impl<TSpace> Clone for Rect<TSpace> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TSpace> Copy for Rect<TSpace> {}

impl<TSpace> Rect<TSpace> {
    pub fn new(origin: Coord<TSpace>, size: Size<TSpace>) -> Self {
        Self { origin, size }
    }

    pub fn from_coords(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Coord::new(x, y), Size::new(width, height))
    }

    pub fn top_left(&self) -> Coord<TSpace> {
        self.origin
    }

    pub fn bottom_right(&self) -> Coord<TSpace> {
        Coord::new(
            self.origin.x + self.size.width,
            self.origin.y + self.size.height,
        )
    }

    pub fn contains(&self, point: Coord<TSpace>) -> bool {
        point.x >= self.origin.x
            && point.x <= self.origin.x + self.size.width
            && point.y >= self.origin.y
            && point.y <= self.origin.y + self.size.height
    }
}

// ============================================================================
// Pixel rect -> clip space
// ============================================================================

/// Scale and translation that maps the unit quad onto a pixel rectangle of
/// the target, expressed in clip space.
///
/// ```text
/// sx =  2 * width  / target_w
/// sy = -2 * height / target_h
/// tx =  2 * x / target_w - 1
/// ty =  1 - 2 * y / target_h
/// ```
///
/// The negative `sy` flips Y: pixel rows grow downward, clip space grows up.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipTransform {
    pub sx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl ClipTransform {
    /// Transform placing the quad at `rect` on a target of size `target`.
    ///
    /// Returns `None` for an empty target, where the mapping is undefined.
    pub fn for_rect(rect: Rect<PixelSpace>, target: Size<PixelSpace>) -> Option<Self> {
        if target.is_empty() {
            return None;
        }

        let (w, h) = (target.width, target.height);
        Some(Self {
            sx: 2.0 * rect.size.width / w,
            sy: -2.0 * rect.size.height / h,
            tx: 2.0 * rect.origin.x / w - 1.0,
            ty: 1.0 - 2.0 * rect.origin.y / h,
        })
    }

    /// Transform covering the whole target.
    pub fn full_target() -> Self {
        Self {
            sx: 2.0,
            sy: -2.0,
            tx: -1.0,
            ty: 1.0,
        }
    }

    /// Map a quad-local point to clip space: `p * diag(sx, sy) + (tx, ty)`.
    pub fn apply(&self, point: Coord<QuadSpace>) -> Coord<ClipSpace> {
        Coord::new(point.x * self.sx + self.tx, point.y * self.sy + self.ty)
    }

    /// Column-major 4x4 matrix, as the vertex stage reads it.
    pub fn to_cols_array(&self) -> [f32; 16] {
        let (sx, sy, tx, ty) = (
            self.sx as f32,
            self.sy as f32,
            self.tx as f32,
            self.ty as f32,
        );
        #[rustfmt::skip]
        let cols = [
            sx,  0.0, 0.0, 0.0,
            0.0, sy,  0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            tx,  ty,  0.0, 1.0,
        ];
        cols
    }

    pub fn to_uniform(&self) -> TransformUniform {
        TransformUniform {
            mvp: self.to_cols_array(),
        }
    }
}

/// Uniform block bound at `@group(0) @binding(0)`: one `mat4x4<f32>`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformUniform {
    pub mvp: [f32; 16],
}

impl TransformUniform {
    /// Byte size of the uniform buffer.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn transform(x: f64, y: f64, w: f64, h: f64, tw: f64, th: f64) -> ClipTransform {
        ClipTransform::for_rect(Rect::from_coords(x, y, w, h), Size::new(tw, th)).unwrap()
    }

    #[test]
    fn test_800x600_scenario() {
        let t = transform(100.0, 50.0, 200.0, 150.0, 800.0, 600.0);
        assert_close(t.sx, 0.5);
        assert_close(t.sy, -0.5);
        assert_close(t.tx, -0.75);
        assert_close(t.ty, 5.0 / 6.0);
    }

    #[test]
    fn test_full_frame_fills_clip_space() {
        let t = transform(0.0, 0.0, 1920.0, 1080.0, 1920.0, 1080.0);
        assert_eq!(t, ClipTransform::full_target());

        let top_left = t.apply(Coord::new(0.0, 0.0));
        let bottom_right = t.apply(Coord::new(1.0, 1.0));
        assert_eq!(top_left.as_tuple(), (-1.0, 1.0));
        assert_eq!(bottom_right.as_tuple(), (1.0, -1.0));
    }

    #[test]
    fn test_corners_map_to_rect_edges() {
        let cases = [
            (0.0, 0.0, 10.0, 10.0, 100.0, 100.0),
            (37.0, 12.5, 64.0, 48.0, 640.0, 480.0),
            (-20.0, 700.0, 300.0, 90.0, 1280.0, 720.0),
            (3.0, 5.0, 1.0, 1.0, 7.0, 11.0),
        ];

        for (x, y, w, h, tw, th) in cases {
            let t = transform(x, y, w, h, tw, th);

            let c0 = t.apply(Coord::new(0.0, 0.0));
            assert_close(c0.x, 2.0 * x / tw - 1.0);
            assert_close(c0.y, 1.0 - 2.0 * y / th);

            let c1 = t.apply(Coord::new(1.0, 1.0));
            assert_close(c1.x, 2.0 * (x + w) / tw - 1.0);
            assert_close(c1.y, 1.0 - 2.0 * (y + h) / th);
        }
    }

    #[test]
    fn test_matrix_is_column_major() {
        let m = transform(100.0, 50.0, 200.0, 150.0, 800.0, 600.0).to_cols_array();
        assert_eq!(m[0], 0.5);
        assert_eq!(m[5], -0.5);
        assert_eq!(m[10], 1.0);
        assert_eq!(m[12], -0.75);
        assert!((m[13] - 0.833_333_3).abs() < 1e-6);
        assert_eq!(m[14], 0.0);
        assert_eq!(m[15], 1.0);
        for i in [1, 2, 3, 4, 6, 7, 8, 9, 11] {
            assert_eq!(m[i], 0.0, "off-diagonal element {i}");
        }
    }

    #[test]
    fn test_matrix_times_corner_matches_apply() {
        let t = transform(40.0, 30.0, 120.0, 90.0, 320.0, 240.0);
        let m = t.to_cols_array();
        // column-major: out = col0 * x + col1 * y + col2 * z + col3 * w
        let (x, y) = (1.0f32, 1.0f32);
        let out_x = m[0] * x + m[4] * y + m[12];
        let out_y = m[1] * x + m[5] * y + m[13];
        let expected = t.apply(Coord::new(1.0, 1.0));
        assert!((out_x as f64 - expected.x).abs() < 1e-6);
        assert!((out_y as f64 - expected.y).abs() < 1e-6);
    }

    #[test]
    fn test_empty_target_has_no_transform() {
        let rect = Rect::from_coords(0.0, 0.0, 10.0, 10.0);
        assert!(ClipTransform::for_rect(rect, Size::new(0.0, 600.0)).is_none());
        assert!(ClipTransform::for_rect(rect, Size::new(800.0, 0.0)).is_none());
        assert!(ClipTransform::for_rect(rect, Size::new(f64::NAN, 600.0)).is_none());
    }

    #[test]
    fn test_uniform_is_64_bytes() {
        assert_eq!(TransformUniform::SIZE, 64);
        let uniform = ClipTransform::full_target().to_uniform();
        assert_eq!(bytemuck::bytes_of(&uniform).len(), 64);
    }

    #[test]
    fn test_rect_helpers() {
        let rect = Rect::<PixelSpace>::from_coords(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.bottom_right().as_tuple(), (40.0, 60.0));
        assert!(rect.contains(Coord::new(25.0, 30.0)));
        assert!(!rect.contains(Coord::new(5.0, 30.0)));
    }
}
