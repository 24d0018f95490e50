//! Per-kind drawing of display objects onto a canvas.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use kurbo::{BezPath, Rect};

use glint_core::{DisplayObject, Geometry, GeometryRegistry, ShapeKind};
use glint_io::{ImageReady, ImageSource};

use crate::backend::Canvas;
use crate::paint::{Paint, PaintSet};

/// What a shape renderer gets to draw one object with.
pub struct RenderContext<'a> {
    pub fill_paint: Option<&'a Paint>,
    pub stroke_paint: Option<&'a Paint>,
    pub shadow_fill_paint: Option<&'a Paint>,
    pub shadow_stroke_paint: Option<&'a Paint>,
    pub canvas: &'a mut dyn Canvas,
}

impl<'a> RenderContext<'a> {
    pub fn new(paints: &'a PaintSet, canvas: &'a mut dyn Canvas) -> Self {
        Self {
            fill_paint: paints.fill.as_ref(),
            stroke_paint: paints.stroke.as_ref(),
            shadow_fill_paint: paints.shadow_fill.as_ref(),
            shadow_stroke_paint: paints.shadow_stroke.as_ref(),
            canvas,
        }
    }
}

pub trait ShapeRenderer {
    fn render(&self, object: &DisplayObject, context: &mut RenderContext<'_>);
}

/// Draws the geometry outline: shadowed fill first, then the shadowed stroke.
pub struct DefaultRenderer {
    geometries: GeometryRegistry,
}

impl DefaultRenderer {
    pub fn new(geometries: GeometryRegistry) -> Self {
        Self { geometries }
    }
}

impl ShapeRenderer for DefaultRenderer {
    fn render(&self, object: &DisplayObject, context: &mut RenderContext<'_>) {
        let mut path = BezPath::new();
        if !self.geometries.build_path(object, &mut path) || path.elements().is_empty() {
            return;
        }
        let style = object.style();
        let offset = (style.shadow_offset_x, style.shadow_offset_y);

        if let Some(shadow) = context.shadow_fill_paint {
            draw_offset(context.canvas, &path, shadow, offset);
        }
        if let Some(fill) = context.fill_paint {
            context.canvas.draw_path(&path, fill);
        }
        if let Some(shadow) = context.shadow_stroke_paint {
            draw_offset(context.canvas, &path, shadow, offset);
        }
        if let Some(stroke) = context.stroke_paint {
            context.canvas.draw_path(&path, stroke);
        }
    }
}

fn draw_offset(canvas: &mut dyn Canvas, path: &BezPath, paint: &Paint, (dx, dy): (f64, f64)) {
    canvas.save();
    canvas.translate(dx, dy);
    canvas.draw_path(path, paint);
    canvas.restore();
}

/// Draws the bitmap of an image object over its geometry box.
pub struct ImageRenderer {
    images: Rc<dyn ImageSource>,
    redraw: Rc<Cell<bool>>,
}

impl ImageRenderer {
    pub fn new(images: Rc<dyn ImageSource>, redraw: Rc<Cell<bool>>) -> Self {
        Self { images, redraw }
    }
}

impl ShapeRenderer for ImageRenderer {
    fn render(&self, object: &DisplayObject, context: &mut RenderContext<'_>) {
        let Geometry::Image { src, width, height } = object.geometry() else {
            return;
        };
        let dirty = object.paint_dirty_flag();
        let redraw = Rc::clone(&self.redraw);
        let ready: ImageReady = Box::new(move |_| {
            dirty.set(true);
            redraw.set(true);
        });
        if let Some(image) = self.images.get_image_sync(src, object.id, ready) {
            let dst = Rect::new(0.0, 0.0, *width, *height);
            context.canvas.draw_image(&image, dst, object.style().opacity);
        }
    }
}

/// Shape-kind keyed table of renderers. Kinds without one are not drawn.
#[derive(Clone, Default)]
pub struct ShapeRendererRegistry {
    entries: HashMap<ShapeKind, Rc<dyn ShapeRenderer>>,
}

impl ShapeRendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outline renderers for every built-in vector shape plus images.
    pub fn with_builtin_renderers(
        geometries: GeometryRegistry,
        images: Rc<dyn ImageSource>,
        redraw: Rc<Cell<bool>>,
    ) -> Self {
        let outline: Rc<dyn ShapeRenderer> = Rc::new(DefaultRenderer::new(geometries));
        let mut registry = Self::new();
        for kind in [
            ShapeKind::Circle,
            ShapeKind::Ellipse,
            ShapeKind::Rect,
            ShapeKind::Line,
            ShapeKind::Polyline,
            ShapeKind::Polygon,
            ShapeKind::Path,
        ] {
            registry.entries.insert(kind, Rc::clone(&outline));
        }
        registry.register(ShapeKind::Image, ImageRenderer::new(images, redraw));
        registry
    }

    pub fn register(&mut self, kind: ShapeKind, renderer: impl ShapeRenderer + 'static) {
        self.entries.insert(kind, Rc::new(renderer));
    }

    pub fn get(&self, kind: &ShapeKind) -> Option<&dyn ShapeRenderer> {
        self.entries.get(kind).map(|r| r.as_ref())
    }
}

impl fmt::Debug for ShapeRendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::StyleResolver;
    use crate::recording::{DrawCommand, RecordingCanvas};
    use glint_core::{ParsedStyle, Rgba};
    use glint_io::{DecodedImage, ImagePool};

    fn builtin(pool: Rc<ImagePool>) -> ShapeRendererRegistry {
        ShapeRendererRegistry::with_builtin_renderers(
            GeometryRegistry::with_builtin_shapes(),
            pool,
            Rc::new(Cell::new(false)),
        )
    }

    #[test]
    fn test_default_renderer_order() {
        let pool = Rc::new(ImagePool::new());
        let mut style = ParsedStyle::default()
            .with_fill(Rgba::WHITE)
            .with_stroke(Rgba::BLACK, 2.0);
        style.shadow_color = Some(Rgba::BLACK);
        style.shadow_blur = 4.0;
        style.shadow_offset_x = 3.0;
        let rect = DisplayObject::new("r", Geometry::rect(10.0, 10.0)).with_style(style);
        let paints = StyleResolver::default().resolve(&rect, pool.as_ref());

        let mut canvas = RecordingCanvas::new();
        let registry = builtin(pool);
        let renderer = registry.get(&ShapeKind::Rect).unwrap();
        renderer.render(&rect, &mut RenderContext::new(&paints, &mut canvas));

        let paths: Vec<&Paint> = canvas
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawPath { paint, .. } => Some(paint),
                _ => None,
            })
            .collect();
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], paints.shadow_fill.as_ref().unwrap());
        assert_eq!(paths[1], paints.fill.as_ref().unwrap());
        assert_eq!(paths[2], paints.shadow_stroke.as_ref().unwrap());
        assert_eq!(paths[3], paints.stroke.as_ref().unwrap());
        assert_eq!(canvas.commands()[1], DrawCommand::Translate { dx: 3.0, dy: 0.0 });
    }

    #[test]
    fn test_text_has_no_renderer() {
        let registry = builtin(Rc::new(ImagePool::new()));
        assert!(registry.get(&ShapeKind::Text).is_none());
        assert!(registry.get(&ShapeKind::Group).is_none());
    }

    #[test]
    fn test_image_renderer_draws_cached_image() {
        let pool = Rc::new(ImagePool::new());
        pool.insert("tile.png", DecodedImage::from_rgba(1, 1, vec![255; 4]).unwrap());
        let image = DisplayObject::new(
            "img",
            Geometry::Image {
                src: "tile.png".to_string(),
                width: 20.0,
                height: 10.0,
            },
        );
        let registry = builtin(Rc::clone(&pool));
        let mut canvas = RecordingCanvas::new();
        let paints = PaintSet::default();
        registry
            .get(&ShapeKind::Image)
            .unwrap()
            .render(&image, &mut RenderContext::new(&paints, &mut canvas));
        assert!(matches!(
            canvas.commands(),
            [DrawCommand::DrawImage { dst, .. }] if *dst == Rect::new(0.0, 0.0, 20.0, 10.0)
        ));
    }
}
