use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use glam::DMat4;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::display_object::{DisplayObject, NodeId};
use crate::error::SceneError;
use crate::geometry::{BBox, Point};
use crate::shape::Geometry;
use crate::spatial::{SpatialEntry, SpatialIndex};
use crate::style::ParsedStyle;
use crate::transform::{decompose, Decomposed, LocalTransform};

/// The scene tree: owns every display object and the derived caches
/// (world transforms, render order, spatial index).
///
/// Objects added with [`Document::add_detached`] live in the document but
/// outside the tree; they are never drawn or picked directly and are meant to
/// serve as clip paths.
#[derive(Debug, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    pub id: Uuid,
    pub name: String,
    root: NodeId,
    objects: HashMap<NodeId, DisplayObject>,
    #[serde(skip)]
    caches: Caches,
}

#[derive(Default)]
struct Caches {
    spatial: RefCell<Option<SpatialIndex>>,
    render_order: RefCell<Option<HashMap<NodeId, usize>>>,
}

impl fmt::Debug for Caches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caches")
            .field("spatial_built", &self.spatial.borrow().is_some())
            .field("render_order_built", &self.render_order.borrow().is_some())
            .finish()
    }
}

impl Document {
    pub fn new(name: &str) -> Self {
        let root = DisplayObject::group("root");
        let root_id = root.id;
        let mut objects = HashMap::new();
        objects.insert(root_id, root);
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            root: root_id,
            objects,
            caches: Caches::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: &NodeId) -> Option<&DisplayObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of objects, including the root and detached objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.len() <= 1
    }

    // ── Tree structure ───────────────────────────────────────────────

    pub fn append_child(
        &mut self,
        parent: NodeId,
        object: DisplayObject,
    ) -> Result<NodeId, SceneError> {
        let index = self.get(&parent).map(|p| p.children.len()).unwrap_or(0);
        self.insert_child(parent, index, object)
    }

    /// Insert `object` under `parent` at `index` (clamped to the child count).
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        mut object: DisplayObject,
    ) -> Result<NodeId, SceneError> {
        if self.objects.contains_key(&object.id) {
            return Err(SceneError::AlreadyAttached(object.id));
        }
        let parent_obj = self
            .objects
            .get_mut(&parent)
            .ok_or(SceneError::NodeNotFound(parent))?;
        let id = object.id;
        let index = index.min(parent_obj.children.len());
        parent_obj.children.insert(index, id);
        object.parent = Some(parent);
        object.children.clear();
        object.world.set(None);
        self.objects.insert(id, object);
        self.invalidate_structure();
        Ok(id)
    }

    /// Register an object that is not part of the tree, e.g. a clip path.
    pub fn add_detached(&mut self, mut object: DisplayObject) -> Result<NodeId, SceneError> {
        if self.objects.contains_key(&object.id) {
            return Err(SceneError::AlreadyAttached(object.id));
        }
        let id = object.id;
        object.parent = None;
        object.children.clear();
        self.objects.insert(id, object);
        Ok(id)
    }

    /// Move `node` (with its subtree) under `new_parent`.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> Result<(), SceneError> {
        if node == self.root {
            return Err(SceneError::RootNode);
        }
        if !self.contains(&node) {
            return Err(SceneError::NodeNotFound(node));
        }
        if !self.contains(&new_parent) {
            return Err(SceneError::NodeNotFound(new_parent));
        }
        if self.is_ancestor_or_self(node, new_parent) {
            return Err(SceneError::Cycle {
                node,
                parent: new_parent,
            });
        }
        self.detach(node);
        if let Some(parent) = self.objects.get_mut(&new_parent) {
            parent.children.push(node);
        }
        if let Some(obj) = self.objects.get_mut(&node) {
            obj.parent = Some(new_parent);
        }
        self.invalidate_world(node);
        self.invalidate_structure();
        Ok(())
    }

    /// Remove `id` and its whole subtree. Clip-path references to removed
    /// objects are left dangling and resolve to "no clip".
    pub fn remove(&mut self, id: NodeId) -> Result<DisplayObject, SceneError> {
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        if !self.contains(&id) {
            return Err(SceneError::NodeNotFound(id));
        }
        self.detach(id);
        for descendant in self.descendants(id).into_iter().skip(1) {
            self.objects.remove(&descendant);
        }
        self.invalidate_structure();
        let mut removed = self
            .objects
            .remove(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        removed.children.clear();
        removed.parent = None;
        log::debug!("Removed display object {} ({})", removed.name, id);
        Ok(removed)
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.objects.get(&id).and_then(|o| o.parent);
        if let Some(parent) = parent.and_then(|p| self.objects.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.parent = None;
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(&id).and_then(|o| o.parent);
        }
        false
    }

    /// Children of `id` ordered for traversal: by z-index, ties in insertion order.
    pub fn sorted_children(&self, id: &NodeId) -> Vec<NodeId> {
        let Some(obj) = self.get(id) else {
            return Vec::new();
        };
        let mut children = obj.children.clone();
        children.sort_by_key(|c| self.get(c).map(|o| o.z_index).unwrap_or(0));
        children
    }

    /// Depth-first pre-order over z-sorted children, starting at `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(&current) {
                continue;
            }
            out.push(current);
            stack.extend(self.sorted_children(&current).into_iter().rev());
        }
        out
    }

    /// Position of `id` in back-to-front drawing order. Detached objects have none.
    pub fn render_order(&self, id: &NodeId) -> Option<usize> {
        let mut cache = self.caches.render_order.borrow_mut();
        let order = cache.get_or_insert_with(|| {
            self.descendants(self.root)
                .into_iter()
                .enumerate()
                .map(|(i, node)| (node, i))
                .collect()
        });
        order.get(id).copied()
    }

    // ── Mutation ─────────────────────────────────────────────────────

    pub fn set_transform(&mut self, id: NodeId, transform: LocalTransform) -> Result<(), SceneError> {
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        obj.transform = transform;
        self.invalidate_world(id);
        self.invalidate_bounds();
        Ok(())
    }

    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) -> Result<(), SceneError> {
        let mut transform = self.local_transform(id)?;
        transform.position = Point::new(x, y);
        self.set_transform(id, transform)
    }

    pub fn set_rotation(&mut self, id: NodeId, degrees: f64) -> Result<(), SceneError> {
        let mut transform = self.local_transform(id)?;
        transform.rotation = degrees;
        self.set_transform(id, transform)
    }

    pub fn set_scale(&mut self, id: NodeId, sx: f64, sy: f64) -> Result<(), SceneError> {
        let mut transform = self.local_transform(id)?;
        transform.scale = [sx, sy];
        self.set_transform(id, transform)
    }

    pub fn set_skew(&mut self, id: NodeId, kx: f64, ky: f64) -> Result<(), SceneError> {
        let mut transform = self.local_transform(id)?;
        transform.skew = [kx, ky];
        self.set_transform(id, transform)
    }

    fn local_transform(&self, id: NodeId) -> Result<LocalTransform, SceneError> {
        self.get(&id)
            .map(|o| o.transform)
            .ok_or(SceneError::NodeNotFound(id))
    }

    pub fn set_z_index(&mut self, id: NodeId, z_index: i32) -> Result<(), SceneError> {
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        obj.z_index = z_index;
        self.invalidate_structure();
        Ok(())
    }

    pub fn update_style(
        &mut self,
        id: NodeId,
        update: impl FnOnce(&mut ParsedStyle),
    ) -> Result<(), SceneError> {
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        update(&mut obj.style);
        self.invalidate_bounds();
        Ok(())
    }

    pub fn set_geometry(&mut self, id: NodeId, geometry: Geometry) -> Result<(), SceneError> {
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        obj.geometry = geometry;
        self.invalidate_bounds();
        Ok(())
    }

    pub fn set_culled(&mut self, id: NodeId, culled: bool) -> Result<(), SceneError> {
        let obj = self
            .objects
            .get_mut(&id)
            .ok_or(SceneError::NodeNotFound(id))?;
        obj.culled = culled;
        self.invalidate_bounds();
        Ok(())
    }

    fn invalidate_world(&self, id: NodeId) {
        for node in self.descendants(id) {
            if let Some(obj) = self.get(&node) {
                obj.world.set(None);
            }
        }
    }

    fn invalidate_bounds(&self) {
        self.caches.spatial.borrow_mut().take();
    }

    fn invalidate_structure(&self) {
        self.caches.render_order.borrow_mut().take();
        self.invalidate_bounds();
    }

    // ── Transforms ───────────────────────────────────────────────────

    /// Product of every ancestor's local transform and the node's own.
    pub fn world_transform(&self, id: &NodeId) -> Option<DMat4> {
        let obj = self.get(id)?;
        if let Some(world) = obj.world.get() {
            return Some(world);
        }
        let local = obj.transform.to_matrix();
        let world = match obj.parent {
            Some(parent) => self.world_transform(&parent)? * local,
            None => local,
        };
        obj.world.set(Some(world));
        Some(world)
    }

    pub fn world_decomposed(&self, id: &NodeId) -> Option<Decomposed> {
        self.world_transform(id).map(|m| decompose(&m))
    }

    pub fn world_position(&self, id: &NodeId) -> Option<Point> {
        self.world_decomposed(id).map(|d| d.translation)
    }

    /// World-space bounds of what the object paints.
    pub fn world_render_bounds(&self, id: &NodeId) -> Option<BBox> {
        let bounds = self.get(id)?.render_bounds()?;
        Some(bounds.transform(&self.world_transform(id)?))
    }

    // ── Clip paths ───────────────────────────────────────────────────

    /// The nearest object, starting at `id` and walking up, with a clip path set.
    pub fn find_closest_clip_path_target(&self, id: &NodeId) -> Option<NodeId> {
        let mut current = Some(*id);
        while let Some(node) = current {
            let obj = self.get(&node)?;
            if obj.style.clip_path.is_some() {
                return Some(node);
            }
            current = obj.parent;
        }
        None
    }

    /// The clip object referenced by `holder`, if it still exists.
    pub fn clip_path_of(&self, holder: &NodeId) -> Option<&DisplayObject> {
        let clip = self.get(holder)?.style.clip_path?;
        self.get(&clip)
    }

    // ── Spatial queries ──────────────────────────────────────────────

    fn build_spatial_index(&self) -> SpatialIndex {
        let entries: Vec<SpatialEntry> = self
            .descendants(self.root)
            .into_iter()
            .filter_map(|node| {
                let bbox = self.world_render_bounds(&node)?;
                bbox.is_finite().then_some(SpatialEntry { node, bbox })
            })
            .collect();
        log::debug!("Rebuilt spatial index with {} entries", entries.len());
        SpatialIndex::build(entries)
    }

    /// Pickable objects whose world bounds intersect the box, in no
    /// particular order. Invisible, culled, non-interactive and container
    /// objects are left out.
    pub fn elements_from_bbox(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<NodeId> {
        let bbox = BBox::new(Point::new(min_x, min_y), Point::new(max_x, max_y));
        let mut cache = self.caches.spatial.borrow_mut();
        let index = cache.get_or_insert_with(|| self.build_spatial_index());
        index
            .query_bbox(&bbox)
            .into_iter()
            .map(|entry| entry.node)
            .filter(|node| {
                self.get(node).is_some_and(|o| {
                    o.is_visible()
                        && !o.is_culled()
                        && o.is_interactive()
                        && !o.kind().is_container()
                })
            })
            .collect()
    }

    pub fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        self.elements_from_bbox(x, y, x, y)
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Rgba;

    fn rect(name: &str, w: f64, h: f64) -> DisplayObject {
        DisplayObject::new(name, Geometry::rect(w, h))
            .with_style(ParsedStyle::default().with_fill(Rgba::BLACK))
    }

    #[test]
    fn test_document_create() {
        let doc = Document::new("scene");
        assert_eq!(doc.name, "scene");
        assert_eq!(doc.len(), 1);
        assert!(doc.is_empty());
    }

    #[test]
    fn test_world_transform_composes_ancestors() {
        let mut doc = Document::new("scene");
        let group = doc
            .append_child(doc.root(), DisplayObject::group("g").with_position(100.0, 0.0))
            .unwrap();
        let child = doc
            .append_child(group, rect("r", 10.0, 10.0).with_position(5.0, 5.0))
            .unwrap();
        let p = doc.world_position(&child).unwrap();
        assert!((p.x - 105.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);

        doc.set_position(group, 0.0, 50.0).unwrap();
        let p = doc.world_position(&child).unwrap();
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_render_order_follows_z_index() {
        let mut doc = Document::new("scene");
        let a = doc.append_child(doc.root(), rect("a", 1.0, 1.0)).unwrap();
        let b = doc.append_child(doc.root(), rect("b", 1.0, 1.0)).unwrap();
        assert!(doc.render_order(&a).unwrap() < doc.render_order(&b).unwrap());

        doc.set_z_index(a, 10).unwrap();
        assert!(doc.render_order(&a).unwrap() > doc.render_order(&b).unwrap());
        assert_eq!(doc.sorted_children(&doc.root()), vec![b, a]);
    }

    #[test]
    fn test_remove_subtree() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut doc = Document::new("scene");
        let group = doc.append_child(doc.root(), DisplayObject::group("g")).unwrap();
        let child = doc.append_child(group, rect("r", 1.0, 1.0)).unwrap();
        let removed = doc.remove(group).unwrap();
        assert_eq!(removed.name, "g");
        assert!(!doc.contains(&child));
        assert!(doc.get(&doc.root()).unwrap().children().is_empty());
        assert!(matches!(doc.remove(doc.root()), Err(SceneError::RootNode)));
    }

    #[test]
    fn test_reparent_rejects_cycle() {
        let mut doc = Document::new("scene");
        let a = doc.append_child(doc.root(), DisplayObject::group("a")).unwrap();
        let b = doc.append_child(a, DisplayObject::group("b")).unwrap();
        assert!(matches!(doc.reparent(a, b), Err(SceneError::Cycle { .. })));
        doc.reparent(b, doc.root()).unwrap();
        assert_eq!(doc.get(&b).unwrap().parent(), Some(doc.root()));
        assert!(doc.get(&a).unwrap().children().is_empty());
    }

    #[test]
    fn test_elements_from_point_filters_and_updates() {
        let mut doc = Document::new("scene");
        let r = doc
            .append_child(doc.root(), rect("r", 10.0, 10.0).with_position(20.0, 20.0))
            .unwrap();
        assert_eq!(doc.elements_from_point(25.0, 25.0), vec![r]);
        assert!(doc.elements_from_point(5.0, 5.0).is_empty());

        doc.set_position(r, 0.0, 0.0).unwrap();
        assert_eq!(doc.elements_from_point(5.0, 5.0), vec![r]);

        doc.update_style(r, |s| s.interactive = false).unwrap();
        assert!(doc.elements_from_point(5.0, 5.0).is_empty());
    }

    #[test]
    fn test_clip_path_lookup_walks_ancestors() {
        let mut doc = Document::new("scene");
        let clip = doc.add_detached(rect("clip", 5.0, 5.0)).unwrap();
        let group = doc.append_child(doc.root(), DisplayObject::group("g")).unwrap();
        let child = doc.append_child(group, rect("r", 10.0, 10.0)).unwrap();
        assert!(doc.find_closest_clip_path_target(&child).is_none());

        doc.update_style(group, |s| s.clip_path = Some(clip)).unwrap();
        assert_eq!(doc.find_closest_clip_path_target(&child), Some(group));
        assert_eq!(doc.clip_path_of(&group).unwrap().id, clip);

        doc.remove(clip).unwrap();
        assert!(doc.clip_path_of(&group).is_none());
        // Detached objects are never indexed.
        assert_eq!(doc.render_order(&clip), None);
    }

    #[test]
    fn test_json_round_trip() {
        let mut doc = Document::new("scene");
        let r = doc
            .append_child(doc.root(), rect("r", 10.0, 10.0).with_position(3.0, 4.0))
            .unwrap();
        let json = doc.to_json().unwrap();
        let restored = Document::from_json(&json).unwrap();
        assert_eq!(restored.root(), doc.root());
        assert_eq!(restored.world_position(&r), Some(Point::new(3.0, 4.0)));
        assert_eq!(restored.elements_from_point(5.0, 5.0), vec![r]);
    }
}
