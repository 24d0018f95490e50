use std::cell::RefCell;

use glam::DMat4;
use kurbo::{BezPath, Shape};

use glint_core::{DisplayObject, Document, GeometryRegistry, NodeId, Point};

/// A pick query in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickRequest {
    pub position: Point,
    /// Stop at the frontmost hit instead of collecting every hit.
    pub topmost: bool,
}

impl PickRequest {
    pub fn topmost(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            topmost: true,
        }
    }

    pub fn all(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            topmost: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResponse {
    Topmost(Option<NodeId>),
    /// Every hit, frontmost first.
    All(Vec<NodeId>),
}

impl PickResponse {
    pub fn is_empty(&self) -> bool {
        match self {
            PickResponse::Topmost(hit) => hit.is_none(),
            PickResponse::All(hits) => hits.is_empty(),
        }
    }

    pub fn into_vec(self) -> Vec<NodeId> {
        match self {
            PickResponse::Topmost(hit) => hit.into_iter().collect(),
            PickResponse::All(hits) => hits,
        }
    }
}

/// Hit-tests points against a [`Document`].
///
/// Picking never mutates the scene; the only state is a scratch path reused
/// by the generic point-in-path test.
#[derive(Debug)]
pub struct Picker {
    geometries: GeometryRegistry,
    scratch: RefCell<BezPath>,
}

impl Default for Picker {
    fn default() -> Self {
        Self::new(GeometryRegistry::with_builtin_shapes())
    }
}

impl Picker {
    pub fn new(geometries: GeometryRegistry) -> Self {
        Self {
            geometries,
            scratch: RefCell::new(BezPath::new()),
        }
    }

    pub fn geometries(&self) -> &GeometryRegistry {
        &self.geometries
    }

    pub fn pick(&self, document: &Document, request: &PickRequest) -> PickResponse {
        let Point { x, y } = request.position;
        let mut candidates = document.elements_from_bbox(x, y, x, y);
        // Front-to-back; objects outside the tree sort last.
        candidates.sort_by_key(|id| std::cmp::Reverse(document.render_order(id)));

        let mut hits = Vec::new();
        for id in candidates {
            if !self.accepts(document, &id, request.position) {
                continue;
            }
            if request.topmost {
                return PickResponse::Topmost(Some(id));
            }
            hits.push(id);
        }
        log::trace!("Pick at ({x}, {y}) hit {} object(s)", hits.len());

        if request.topmost {
            PickResponse::Topmost(None)
        } else {
            PickResponse::All(hits)
        }
    }

    fn accepts(&self, document: &Document, id: &NodeId, position: Point) -> bool {
        let (Some(object), Some(world)) = (document.get(id), document.world_transform(id)) else {
            return false;
        };
        if !self.hit_object(object, &world, position) {
            return false;
        }

        let Some(holder) = document.find_closest_clip_path_target(id) else {
            return true;
        };
        let Some(clip) = document.clip_path_of(&holder) else {
            log::debug!("Clip path of {holder} is gone, treating as unclipped");
            return true;
        };
        if self.geometries.get(&clip.kind()).is_none() {
            return true;
        }
        let base = if holder == *id {
            world
        } else {
            match document.world_transform(&holder) {
                Some(m) => m,
                None => return true,
            }
        };
        let clip_world = base * clip.local_transform().to_matrix();
        self.hit_object(clip, &clip_world, position)
    }

    /// Precise test of `position` against `object` placed by `world`.
    fn hit_object(&self, object: &DisplayObject, world: &DMat4, position: Point) -> bool {
        let Some(geometry) = self.geometries.get(&object.kind()) else {
            return false;
        };
        if world.determinant().abs() < f64::EPSILON {
            return false;
        }
        let (ax, ay) = object.anchor_offset();
        let local = position.transform(&world.inverse()).translate(ax, ay);
        let fallback = |object: &DisplayObject, point: Point| self.point_in_path(object, point);
        geometry.contains(object, local, &fallback)
    }

    /// Nonzero-winding containment against the object's outline.
    fn point_in_path(&self, object: &DisplayObject, point: Point) -> bool {
        let mut path = self.scratch.borrow_mut();
        path.truncate(0);
        if !self.geometries.build_path(object, &mut path) {
            return false;
        }
        path.close_path();
        path.contains(point.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{Geometry, LocalTransform, ParsedStyle, Rgba, ShapeKind};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn filled(geometry: Geometry) -> DisplayObject {
        DisplayObject::new("shape", geometry).with_style(ParsedStyle::default().with_fill(Rgba::BLACK))
    }

    fn circle_at(doc: &mut Document, x: f64, y: f64, r: f64) -> NodeId {
        let root = doc.root();
        doc.append_child(root, filled(Geometry::Circle { r }).with_position(x, y))
            .unwrap()
    }

    #[test]
    fn test_empty_outside_bounds() {
        init();
        let mut doc = Document::new("test");
        circle_at(&mut doc, 50.0, 50.0, 10.0);
        let picker = Picker::default();
        assert_eq!(
            picker.pick(&doc, &PickRequest::all(200.0, 200.0)),
            PickResponse::All(vec![])
        );
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(200.0, 200.0)),
            PickResponse::Topmost(None)
        );
    }

    #[test]
    fn test_circle_hit_and_clip_excludes() {
        init();
        let mut doc = Document::new("test");
        let circle = circle_at(&mut doc, 50.0, 50.0, 10.0);
        let picker = Picker::default();
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(50.0, 50.0)),
            PickResponse::Topmost(Some(circle))
        );

        // The clip is placed relative to the circle, so (-50, -50) puts it
        // at (0, 0)..(10, 10) in world space.
        let clip = doc
            .add_detached(filled(Geometry::rect(10.0, 10.0)).with_position(-50.0, -50.0))
            .unwrap();
        doc.update_style(circle, |s| s.clip_path = Some(clip)).unwrap();
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(50.0, 50.0)),
            PickResponse::Topmost(None)
        );
    }

    #[test]
    fn test_clip_allows_point_inside() {
        let mut doc = Document::new("test");
        let rect = doc
            .append_child(doc.root(), filled(Geometry::rect(100.0, 100.0)))
            .unwrap();
        let clip = doc
            .add_detached(filled(Geometry::rect(20.0, 20.0)).with_position(10.0, 10.0))
            .unwrap();
        doc.update_style(rect, |s| s.clip_path = Some(clip)).unwrap();
        let picker = Picker::default();
        assert_eq!(picker.pick(&doc, &PickRequest::all(15.0, 15.0)).into_vec(), vec![rect]);
        assert!(picker.pick(&doc, &PickRequest::all(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_clip_inherited_from_ancestor() {
        let mut doc = Document::new("test");
        let group = doc
            .append_child(doc.root(), DisplayObject::group("g").with_position(100.0, 0.0))
            .unwrap();
        let rect = doc.append_child(group, filled(Geometry::rect(50.0, 50.0))).unwrap();
        let clip = doc.add_detached(filled(Geometry::rect(10.0, 10.0))).unwrap();
        doc.update_style(group, |s| s.clip_path = Some(clip)).unwrap();
        let picker = Picker::default();
        assert!(!picker.pick(&doc, &PickRequest::topmost(105.0, 5.0)).is_empty());
        assert!(picker.pick(&doc, &PickRequest::topmost(130.0, 30.0)).is_empty());
        assert_eq!(doc.find_closest_clip_path_target(&rect), Some(group));
    }

    #[test]
    fn test_dangling_clip_means_no_clip() {
        let mut doc = Document::new("test");
        let circle = circle_at(&mut doc, 50.0, 50.0, 10.0);
        let clip = doc.add_detached(filled(Geometry::rect(1.0, 1.0))).unwrap();
        doc.update_style(circle, |s| s.clip_path = Some(clip)).unwrap();
        doc.remove(clip).unwrap();
        let picker = Picker::default();
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(50.0, 50.0)),
            PickResponse::Topmost(Some(circle))
        );
    }

    #[test]
    fn test_topmost_versus_all() {
        let mut doc = Document::new("test");
        let root = doc.root();
        let back = doc.append_child(root, filled(Geometry::rect(100.0, 100.0))).unwrap();
        let front = doc
            .append_child(root, filled(Geometry::rect(50.0, 50.0)).with_position(10.0, 10.0))
            .unwrap();
        let lifted = doc
            .insert_child(
                root,
                0,
                filled(Geometry::rect(30.0, 30.0))
                    .with_position(20.0, 20.0)
                    .with_z_index(5),
            )
            .unwrap();
        let picker = Picker::default();
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(25.0, 25.0)),
            PickResponse::Topmost(Some(lifted))
        );
        assert_eq!(
            picker.pick(&doc, &PickRequest::all(25.0, 25.0)),
            PickResponse::All(vec![lifted, front, back])
        );
        assert_eq!(
            picker.pick(&doc, &PickRequest::all(90.0, 90.0)),
            PickResponse::All(vec![back])
        );
    }

    #[test]
    fn test_bounding_box_hit_but_shape_miss() {
        let mut doc = Document::new("test");
        circle_at(&mut doc, 50.0, 50.0, 10.0);
        let picker = Picker::default();
        // Inside the circle's box, outside the circle.
        assert!(picker.pick(&doc, &PickRequest::all(41.0, 41.0)).is_empty());
    }

    #[test]
    fn test_rotated_and_nested() {
        let mut doc = Document::new("test");
        let group = doc
            .append_child(doc.root(), DisplayObject::group("g").with_position(100.0, 100.0))
            .unwrap();
        let mut transform = LocalTransform::default();
        transform.rotation = 90.0;
        let bar = doc
            .append_child(
                group,
                filled(Geometry::rect(40.0, 10.0)).with_transform(transform),
            )
            .unwrap();
        let picker = Picker::default();
        // Rotated by 90 degrees the bar spans x in [90, 100], y in [100, 140].
        assert_eq!(
            picker.pick(&doc, &PickRequest::topmost(95.0, 130.0)),
            PickResponse::Topmost(Some(bar))
        );
        assert!(picker.pick(&doc, &PickRequest::topmost(130.0, 105.0)).is_empty());
    }

    #[test]
    fn test_non_interactive_and_hidden_are_skipped() {
        let mut doc = Document::new("test");
        let a = circle_at(&mut doc, 50.0, 50.0, 10.0);
        let picker = Picker::default();
        doc.update_style(a, |s| s.interactive = false).unwrap();
        assert!(picker.pick(&doc, &PickRequest::topmost(50.0, 50.0)).is_empty());
        doc.update_style(a, |s| {
            s.interactive = true;
            s.visible = false;
        })
        .unwrap();
        assert!(picker.pick(&doc, &PickRequest::topmost(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_unregistered_kind_is_a_miss() {
        let mut doc = Document::new("test");
        circle_at(&mut doc, 50.0, 50.0, 10.0);
        let mut registry = GeometryRegistry::new();
        registry.register(ShapeKind::Rect, glint_core::shapes::RectGeometry);
        let picker = Picker::new(registry);
        assert!(picker.pick(&doc, &PickRequest::all(50.0, 50.0)).is_empty());
    }

    #[test]
    fn test_zero_scale_is_a_miss() {
        let mut doc = Document::new("test");
        let rect = doc
            .append_child(doc.root(), filled(Geometry::rect(10.0, 10.0)))
            .unwrap();
        doc.set_scale(rect, 0.0, 1.0).unwrap();
        let picker = Picker::default();
        assert!(picker.pick(&doc, &PickRequest::all(0.0, 5.0)).is_empty());
    }

    #[test]
    fn test_polygon_uses_path_fallback() {
        let mut doc = Document::new("test");
        let triangle = doc
            .append_child(
                doc.root(),
                filled(Geometry::Polygon {
                    points: vec![
                        Point::new(0.0, 0.0),
                        Point::new(40.0, 0.0),
                        Point::new(0.0, 40.0),
                    ],
                }),
            )
            .unwrap();
        let picker = Picker::default();
        assert_eq!(picker.pick(&doc, &PickRequest::all(5.0, 5.0)).into_vec(), vec![triangle]);
        assert!(picker.pick(&doc, &PickRequest::all(35.0, 35.0)).is_empty());
    }
}
