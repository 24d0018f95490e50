//! The drawing surface the frame renderer targets.
//!
//! A [`Canvas`] is an immediate-mode drawing context with a save/restore
//! transform stack; a [`Surface`] owns one and can be read back for captures.

use kurbo::{BezPath, Rect};

use glint_io::{DecodedImage, RgbaSnapshot};

use crate::error::RenderError;
use crate::paint::Paint;

pub trait Canvas {
    fn save(&mut self);
    /// Pops the last saved state; unbalanced calls are ignored.
    fn restore(&mut self);
    fn translate(&mut self, dx: f64, dy: f64);
    /// Rotation about the current origin, in degrees.
    fn rotate(&mut self, degrees: f64);
    fn scale(&mut self, sx: f64, sy: f64);
    /// Shear with factors `x' = x + kx * y`, `y' = ky * x + y`.
    fn skew(&mut self, kx: f64, ky: f64);
    /// Replace every pixel with `color` (straight RGBA in `0.0 ..= 1.0`),
    /// ignoring the transform.
    fn clear(&mut self, color: [f32; 4]);
    fn draw_path(&mut self, path: &BezPath, paint: &Paint);
    fn draw_image(&mut self, image: &DecodedImage, dst: Rect, opacity: f32);
}

pub trait Surface {
    fn canvas(&mut self) -> &mut dyn Canvas;
    /// Size in device pixels.
    fn size(&self) -> (u32, u32);
    /// A deleted surface stops the frame loop.
    fn is_deleted(&self) -> bool;
    fn snapshot(&mut self) -> Result<RgbaSnapshot, RenderError>;
}
