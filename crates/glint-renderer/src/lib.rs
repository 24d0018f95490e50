//! # Glint Renderer
//!
//! Turns a [`glint_core::Document`] into draw calls once per animation frame.
//! Styles are resolved into backend-neutral paints, each shape kind is drawn
//! by a registered renderer, and the frame is issued against a [`Canvas`]:
//! either the tiny-skia raster backend or a recording display list.

pub mod backend;
pub mod camera;
pub mod error;
pub mod paint;
pub mod recording;
pub mod renderer;
pub mod shapes;
pub mod skia;

pub use backend::{Canvas, Surface};
pub use camera::Camera;
pub use error::RenderError;
pub use paint::{Paint, PaintSet, Shader, StyleResolver};
pub use recording::{DrawCommand, RecordingCanvas, RecordingSurface};
pub use renderer::{
    Animation, CaptureReceiver, DamageRect, DataUrlOptions, FrameOutcome, FrameRenderer,
    Particles, RendererOptions, RendererState,
};
pub use shapes::{RenderContext, ShapeRenderer, ShapeRendererRegistry};
pub use skia::{PixmapCanvas, PixmapSurface};
