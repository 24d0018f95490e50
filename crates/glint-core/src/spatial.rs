use rstar::{RTree, RTreeObject, AABB};

use crate::display_object::NodeId;
use crate::geometry::BBox;

/// A display object keyed by its world-space render bounds.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub node: NodeId,
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_aabb(&self.bbox)
    }
}

fn to_aabb(bbox: &BBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y])
}

/// Candidate lookup for picking, rebuilt lazily by the document.
///
/// Results come back in R-tree order, which says nothing about render order.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Entries whose bounds touch `bbox`. Pass a zero-area box to query a
    /// single point; edges count as inside.
    pub fn query_bbox(&self, bbox: &BBox) -> Vec<&SpatialEntry> {
        self.tree
            .locate_in_envelope_intersecting(&to_aabb(bbox))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use uuid::Uuid;

    fn at(x: f64, y: f64) -> BBox {
        BBox::new(Point::new(x, y), Point::new(x, y))
    }

    #[test]
    fn test_point_queries_hit_containing_bounds() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let index = SpatialIndex::build(vec![
            SpatialEntry {
                node: a,
                bbox: BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            },
            SpatialEntry {
                node: b,
                bbox: BBox::new(Point::new(5.0, 5.0), Point::new(30.0, 30.0)),
            },
        ]);
        assert_eq!(index.len(), 2);

        let hits = index.query_bbox(&at(2.0, 2.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node, a);

        let mut overlap: Vec<NodeId> = index.query_bbox(&at(7.0, 7.0)).iter().map(|e| e.node).collect();
        overlap.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(overlap, expected);

        // Edge of the first box.
        assert_eq!(index.query_bbox(&at(0.0, 0.0)).len(), 1);
        assert!(index.query_bbox(&at(40.0, 40.0)).is_empty());
    }

    #[test]
    fn test_box_query() {
        let index = SpatialIndex::build(vec![SpatialEntry {
            node: Uuid::new_v4(),
            bbox: BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0)),
        }]);
        let area = BBox::new(Point::new(-5.0, -5.0), Point::new(15.0, 15.0));
        assert!(index.query_bbox(&area).is_empty());
        let area = BBox::new(Point::new(15.0, 15.0), Point::new(21.0, 21.0));
        assert_eq!(index.query_bbox(&area).len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::default();
        assert!(index.is_empty());
        assert!(index.query_bbox(&at(0.0, 0.0)).is_empty());
    }
}
