use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

/// A 2D point in scene coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Map the point through a 4x4 transform (z = 0, w = 1).
    pub fn transform(&self, matrix: &DMat4) -> Self {
        let p = matrix.transform_point3(DVec3::new(self.x, self.y, 0.0));
        Self { x: p.x, y: p.y }
    }

    /// Distance from this point to the segment `a`..`b`.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.distance_to(a);
        }
        let t = (((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
        self.distance_to(&Point::new(a.x + t * dx, a.y + t * dy))
    }
}

impl From<Point> for kurbo::Point {
    fn from(p: Point) -> Self {
        kurbo::Point::new(p.x, p.y)
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Half the width and height.
    pub fn half_extents(&self) -> (f64, f64) {
        (self.width() / 2.0, self.height() / 2.0)
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow the box by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            min: self.min.translate(-amount, -amount),
            max: self.max.translate(amount, amount),
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            min: self.min.translate(dx, dy),
            max: self.max.translate(dx, dy),
        }
    }

    /// Axis-aligned bounds of the four corners after `matrix`.
    pub fn transform(&self, matrix: &DMat4) -> Self {
        let corners = [
            self.min.transform(matrix),
            Point::new(self.max.x, self.min.y).transform(matrix),
            self.max.transform(matrix),
            Point::new(self.min.x, self.max.y).transform(matrix),
        ];
        // Four corners, never empty.
        Self::from_points(&corners).unwrap_or(*self)
    }

    pub fn is_finite(&self) -> bool {
        self.min.x.is_finite()
            && self.min.y.is_finite()
            && self.max.x.is_finite()
            && self.max.y.is_finite()
    }
}

impl From<BBox> for kurbo::Rect {
    fn from(b: BBox) -> Self {
        kurbo::Rect::new(b.min.x, b.min.y, b.max.x, b.max.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((Point::new(5.0, 3.0).distance_to_segment(&a, &b) - 3.0).abs() < 1e-10);
        assert!((Point::new(13.0, 4.0).distance_to_segment(&a, &b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_bbox_transform_rotated() {
        let b = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let m = DMat4::from_rotation_z(std::f64::consts::FRAC_PI_4);
        let t = b.transform(&m);
        let diag = 10.0 * std::f64::consts::SQRT_2;
        assert!((t.height() - diag).abs() < 1e-9);
        assert!((t.width() - diag).abs() < 1e-9);
    }
}
