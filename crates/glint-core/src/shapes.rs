//! Per-shape geometry: outline paths and precise point-in-shape tests.
//!
//! Tests take points in geometry space, i.e. after the caller has undone the
//! world transform and the anchor offset.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use kurbo::{BezPath, PathEl, Shape};

use crate::display_object::DisplayObject;
use crate::geometry::Point;
use crate::shape::{Geometry, PathCommand, ShapeKind};

/// Flattening tolerance used when converting curves to path elements.
pub const PATH_TOLERANCE: f64 = 0.1;

/// Generic point-in-path test, used by shapes without a closed-form test.
pub type PointInPathFallback<'a> = &'a dyn Fn(&DisplayObject, Point) -> bool;

pub trait ShapeGeometry {
    /// Append the outline of `object` to `path`.
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath);

    /// Whether `point` lies inside the painted area of `object`.
    fn contains(&self, object: &DisplayObject, point: Point, fallback: PointInPathFallback<'_>)
        -> bool;
}

/// Shape-kind keyed table of geometry implementations.
///
/// Kinds without an entry are neither picked nor drawn.
#[derive(Clone, Default)]
pub struct GeometryRegistry {
    entries: HashMap<ShapeKind, Rc<dyn ShapeGeometry>>,
}

impl GeometryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in shape.
    pub fn with_builtin_shapes() -> Self {
        let mut registry = Self::new();
        registry.register(ShapeKind::Circle, CircleGeometry);
        registry.register(ShapeKind::Ellipse, EllipseGeometry);
        registry.register(ShapeKind::Rect, RectGeometry);
        registry.register(ShapeKind::Line, LineGeometry);
        registry.register(ShapeKind::Polyline, PolylineGeometry);
        registry.register(ShapeKind::Polygon, PolygonGeometry);
        registry.register(ShapeKind::Path, PathGeometry);
        registry.register(ShapeKind::Image, BoxGeometry);
        registry.register(ShapeKind::Text, BoxGeometry);
        registry
    }

    pub fn register(&mut self, kind: ShapeKind, geometry: impl ShapeGeometry + 'static) {
        self.entries.insert(kind, Rc::new(geometry));
    }

    pub fn get(&self, kind: &ShapeKind) -> Option<&dyn ShapeGeometry> {
        self.entries.get(kind).map(|g| g.as_ref())
    }

    /// Build the outline of `object` into `path`. Returns `false` when the
    /// kind has no registered geometry.
    pub fn build_path(&self, object: &DisplayObject, path: &mut BezPath) -> bool {
        match self.get(&object.kind()) {
            Some(geometry) => {
                geometry.build_path(object, path);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for GeometryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Append path commands to a kurbo path.
pub fn append_commands(commands: &[PathCommand], path: &mut BezPath) {
    for command in commands {
        match *command {
            PathCommand::MoveTo(p) => path.move_to(p),
            PathCommand::LineTo(p) => path.line_to(p),
            PathCommand::QuadTo(c, p) => path.quad_to(c, p),
            PathCommand::CubicTo(c1, c2, p) => path.curve_to(c1, c2, p),
            PathCommand::Close => path.close_path(),
        }
    }
}

fn stroke_half_width(object: &DisplayObject) -> f64 {
    let style = object.style();
    if style.has_stroke() {
        style.line_width.max(0.0) / 2.0
    } else {
        0.0
    }
}

fn near_polyline(point: &Point, points: &[Point], closed: bool, tolerance: f64) -> bool {
    if tolerance <= 0.0 {
        return false;
    }
    let hit_segment = points
        .windows(2)
        .any(|w| point.distance_to_segment(&w[0], &w[1]) <= tolerance);
    let hit_closing = closed
        && points.len() > 2
        && point.distance_to_segment(&points[points.len() - 1], &points[0]) <= tolerance;
    hit_segment || hit_closing
}

/// Whether `point` is within `tolerance` of the flattened outline, closing
/// segments included.
fn near_outline(outline: impl IntoIterator<Item = PathEl>, point: &Point, tolerance: f64) -> bool {
    if tolerance <= 0.0 {
        return false;
    }
    let mut hit = false;
    let mut start = Point::default();
    let mut last = Point::default();
    kurbo::flatten(outline, PATH_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            start = Point::new(p.x, p.y);
            last = start;
        }
        PathEl::LineTo(p) => {
            let p = Point::new(p.x, p.y);
            hit |= point.distance_to_segment(&last, &p) <= tolerance;
            last = p;
        }
        PathEl::ClosePath => {
            hit |= point.distance_to_segment(&last, &start) <= tolerance;
            last = start;
        }
        _ => {}
    });
    hit
}

pub struct CircleGeometry;

impl ShapeGeometry for CircleGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Circle { r } = *object.geometry() {
            path.extend(kurbo::Circle::new((r, r), r).path_elements(PATH_TOLERANCE));
        }
    }

    fn contains(&self, object: &DisplayObject, point: Point, _: PointInPathFallback<'_>) -> bool {
        let Geometry::Circle { r } = *object.geometry() else {
            return false;
        };
        point.distance_to(&Point::new(r, r)) <= r + stroke_half_width(object)
    }
}

pub struct EllipseGeometry;

impl ShapeGeometry for EllipseGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Ellipse { rx, ry } = *object.geometry() {
            let ellipse = kurbo::Ellipse::new((rx, ry), (rx, ry), 0.0);
            path.extend(ellipse.path_elements(PATH_TOLERANCE));
        }
    }

    fn contains(&self, object: &DisplayObject, point: Point, _: PointInPathFallback<'_>) -> bool {
        let Geometry::Ellipse { rx, ry } = *object.geometry() else {
            return false;
        };
        let hw = stroke_half_width(object);
        let (ex, ey) = (rx + hw, ry + hw);
        if ex <= 0.0 || ey <= 0.0 {
            return false;
        }
        let dx = (point.x - rx) / ex;
        let dy = (point.y - ry) / ey;
        dx * dx + dy * dy <= 1.0
    }
}

pub struct RectGeometry;

impl ShapeGeometry for RectGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Rect {
            width,
            height,
            radius,
        } = *object.geometry()
        {
            if radius > 0.0 {
                let rounded = kurbo::RoundedRect::new(0.0, 0.0, width, height, radius);
                path.extend(rounded.path_elements(PATH_TOLERANCE));
            } else {
                path.extend(kurbo::Rect::new(0.0, 0.0, width, height).path_elements(PATH_TOLERANCE));
            }
        }
    }

    fn contains(
        &self,
        object: &DisplayObject,
        point: Point,
        fallback: PointInPathFallback<'_>,
    ) -> bool {
        let Geometry::Rect {
            width,
            height,
            radius,
        } = *object.geometry()
        else {
            return false;
        };
        let hw = stroke_half_width(object);
        if radius > 0.0 {
            let outline = kurbo::RoundedRect::new(0.0, 0.0, width, height, radius);
            return (object.style().has_fill() && fallback(object, point))
                || near_outline(outline.path_elements(PATH_TOLERANCE), &point, hw);
        }
        point.x >= -hw && point.x <= width + hw && point.y >= -hw && point.y <= height + hw
    }
}

pub struct LineGeometry;

impl ShapeGeometry for LineGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Line { from, to } = *object.geometry() {
            path.move_to(from);
            path.line_to(to);
        }
    }

    fn contains(&self, object: &DisplayObject, point: Point, _: PointInPathFallback<'_>) -> bool {
        let Geometry::Line { from, to } = *object.geometry() else {
            return false;
        };
        near_polyline(&point, &[from, to], false, stroke_half_width(object))
    }
}

pub struct PolylineGeometry;

impl ShapeGeometry for PolylineGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Polyline { points } = object.geometry() {
            append_points(points, false, path);
        }
    }

    fn contains(&self, object: &DisplayObject, point: Point, _: PointInPathFallback<'_>) -> bool {
        let Geometry::Polyline { points } = object.geometry() else {
            return false;
        };
        near_polyline(&point, points, false, stroke_half_width(object))
    }
}

pub struct PolygonGeometry;

impl ShapeGeometry for PolygonGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Polygon { points } = object.geometry() {
            append_points(points, true, path);
        }
    }

    fn contains(
        &self,
        object: &DisplayObject,
        point: Point,
        fallback: PointInPathFallback<'_>,
    ) -> bool {
        let Geometry::Polygon { points } = object.geometry() else {
            return false;
        };
        (object.style().has_fill() && fallback(object, point))
            || near_polyline(&point, points, true, stroke_half_width(object))
    }
}

fn append_points(points: &[Point], closed: bool, path: &mut BezPath) {
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
        if closed {
            path.close_path();
        }
    }
}

pub struct PathGeometry;

impl ShapeGeometry for PathGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Geometry::Path { commands } = object.geometry() {
            append_commands(commands, path);
        }
    }

    fn contains(
        &self,
        object: &DisplayObject,
        point: Point,
        fallback: PointInPathFallback<'_>,
    ) -> bool {
        let Geometry::Path { commands } = object.geometry() else {
            return false;
        };
        if object.style().has_fill() && fallback(object, point) {
            return true;
        }
        let mut outline = BezPath::new();
        append_commands(commands, &mut outline);
        near_outline(outline, &point, stroke_half_width(object))
    }
}

/// Axis-aligned box covering the geometry bounds; used for images and text.
pub struct BoxGeometry;

impl ShapeGeometry for BoxGeometry {
    fn build_path(&self, object: &DisplayObject, path: &mut BezPath) {
        if let Some(bounds) = object.geometry_bounds() {
            path.extend(kurbo::Rect::from(bounds).path_elements(PATH_TOLERANCE));
        }
    }

    fn contains(&self, object: &DisplayObject, point: Point, _: PointInPathFallback<'_>) -> bool {
        object
            .geometry_bounds()
            .is_some_and(|b| b.contains_point(&point))
    }
}
