use std::cell::Cell;
use std::rc::Rc;

use glam::DMat4;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BBox, Point};
use crate::shape::{Geometry, ShapeKind};
use crate::style::ParsedStyle;
use crate::transform::LocalTransform;

/// Unique display object identifier.
pub type NodeId = Uuid;

/// A node of the scene tree.
///
/// Objects are owned by a [`Document`](crate::Document); parent and child
/// links are ids into it. Mutations that affect transforms or bounds go
/// through the document so caches are invalidated.
#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayObject {
    pub id: NodeId,
    pub name: String,
    pub(crate) geometry: Geometry,
    pub(crate) transform: LocalTransform,
    pub(crate) style: ParsedStyle,
    pub(crate) z_index: i32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) culled: bool,
    /// Cached world transform; `None` when an ancestor changed.
    #[serde(skip)]
    pub(crate) world: Cell<Option<DMat4>>,
    /// Set when a deferred resource (e.g. a pattern image) becomes ready.
    #[serde(skip)]
    paint_dirty: Rc<Cell<bool>>,
}

impl DisplayObject {
    pub fn new(name: &str, geometry: Geometry) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            geometry,
            transform: LocalTransform::default(),
            style: ParsedStyle::default(),
            z_index: 0,
            parent: None,
            children: Vec::new(),
            culled: false,
            world: Cell::new(None),
            paint_dirty: Rc::new(Cell::new(false)),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, Geometry::Group)
    }

    pub fn with_style(mut self, style: ParsedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_transform(mut self, transform: LocalTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.transform.position = Point::new(x, y);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn style(&self) -> &ParsedStyle {
        &self.style
    }

    pub fn local_transform(&self) -> &LocalTransform {
        &self.transform
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_visible(&self) -> bool {
        self.style.visible
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    pub fn is_interactive(&self) -> bool {
        self.style.interactive
    }

    /// Geometry-space bounds without stroke.
    pub fn geometry_bounds(&self) -> Option<BBox> {
        self.geometry.bounds()
    }

    /// Full geometry width and height.
    pub fn size(&self) -> (f64, f64) {
        self.geometry.size()
    }

    /// The style anchor, or the default for this kind.
    pub fn anchor(&self) -> [f64; 2] {
        self.style
            .anchor
            .unwrap_or_else(|| self.kind().default_anchor())
    }

    /// Distance the geometry is shifted so that the anchor sits on the origin.
    pub fn anchor_offset(&self) -> (f64, f64) {
        let (width, height) = self.size();
        let [ax, ay] = self.anchor();
        (ax * width, ay * height)
    }

    /// Local-space bounds of everything the object paints: geometry shifted
    /// by the anchor and grown by half the stroke width.
    pub fn render_bounds(&self) -> Option<BBox> {
        let bounds = self.geometry_bounds()?;
        let (ax, ay) = self.anchor_offset();
        let mut bounds = bounds.translate(-ax, -ay);
        if self.style.has_stroke() && self.style.line_width > 0.0 {
            bounds = bounds.inflate(self.style.line_width / 2.0);
        }
        Some(bounds)
    }

    /// Shared handle to the paint-dirty flag, for callbacks that outlive a borrow.
    pub fn paint_dirty_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.paint_dirty)
    }

    pub fn is_paint_dirty(&self) -> bool {
        self.paint_dirty.get()
    }

    pub fn clear_paint_dirty(&self) {
        self.paint_dirty.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Rgba;

    #[test]
    fn test_circle_anchor_defaults_to_center() {
        let circle = DisplayObject::new("c", Geometry::Circle { r: 10.0 });
        assert_eq!(circle.anchor(), [0.5, 0.5]);
        assert_eq!(circle.anchor_offset(), (10.0, 10.0));
        let rect = DisplayObject::new("r", Geometry::rect(10.0, 5.0));
        assert_eq!(rect.anchor_offset(), (0.0, 0.0));
    }

    #[test]
    fn test_circle_anchor_survives_style_replacement() {
        let circle = DisplayObject::new("c", Geometry::Circle { r: 10.0 })
            .with_style(ParsedStyle::default().with_fill(Rgba::BLACK));
        assert_eq!(circle.anchor_offset(), (10.0, 10.0));

        let ellipse = DisplayObject::new("e", Geometry::Ellipse { rx: 4.0, ry: 2.0 })
            .with_style(ParsedStyle::default().with_anchor(0.0, 0.0));
        assert_eq!(ellipse.anchor_offset(), (0.0, 0.0));
    }

    #[test]
    fn test_render_bounds_include_stroke() {
        let rect = DisplayObject::new("r", Geometry::rect(100.0, 50.0))
            .with_style(ParsedStyle::default().with_stroke(Rgba::BLACK, 4.0));
        let b = rect.render_bounds().unwrap();
        assert_eq!(b.min, Point::new(-2.0, -2.0));
        assert_eq!(b.max, Point::new(102.0, 52.0));
    }

    #[test]
    fn test_paint_dirty_flag_is_shared() {
        let obj = DisplayObject::new("r", Geometry::rect(1.0, 1.0));
        let flag = obj.paint_dirty_flag();
        assert!(!obj.is_paint_dirty());
        flag.set(true);
        assert!(obj.is_paint_dirty());
        obj.clear_paint_dirty();
        assert!(!flag.get());
    }
}
