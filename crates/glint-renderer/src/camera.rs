use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use glint_core::transform::{decompose, Decomposed};
use glint_core::{BBox, Point};

/// 2D orthographic camera over the scene.
///
/// With the defaults (centre in the middle of the canvas, zoom 1, no roll)
/// scene coordinates equal canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Scene point shown at the centre of the canvas.
    pub center: Point,
    /// Canvas pixels per scene unit.
    pub zoom: f64,
    /// Rotation about the view axis, in degrees.
    pub roll: f64,
    /// Canvas width in CSS pixels.
    pub width: f64,
    /// Canvas height in CSS pixels.
    pub height: f64,
}

impl Camera {
    pub const MIN_ZOOM: f64 = 0.001;
    pub const MAX_ZOOM: f64 = 1_000_000.0;

    pub fn new(width: f64, height: f64) -> Self {
        Self {
            center: Point::new(width / 2.0, height / 2.0),
            zoom: 1.0,
            roll: 0.0,
            width,
            height,
        }
    }

    /// Pan by a delta in canvas pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let delta = DMat4::from_rotation_z(-self.roll.to_radians())
            .transform_vector3(DVec3::new(dx, dy, 0.0));
        self.center = self.center.translate(-delta.x / self.zoom, -delta.y / self.zoom);
    }

    /// Zoom by `factor`, keeping the scene point under `(x, y)` in place.
    pub fn zoom_at(&mut self, x: f64, y: f64, factor: f64) {
        let anchor = self.viewport_to_world(Point::new(x, y));
        self.zoom = (self.zoom * factor).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        let moved = self.viewport_to_world(Point::new(x, y));
        self.center = self
            .center
            .translate(anchor.x - moved.x, anchor.y - moved.y);
    }

    pub fn rotate(&mut self, degrees: f64) {
        self.roll += degrees;
    }

    /// Centre on `bbox` and zoom so it fills 90% of the canvas.
    pub fn fit_bbox(&mut self, bbox: &BBox) {
        let (width, height) = (bbox.width(), bbox.height());
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.center = bbox.center();
        let zoom_x = self.width / width * 0.9;
        let zoom_y = self.height / height * 0.9;
        self.zoom = zoom_x.min(zoom_y).clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
    }

    /// Scene to canvas transform.
    pub fn ortho_matrix(&self) -> DMat4 {
        DMat4::from_translation(DVec3::new(self.width / 2.0, self.height / 2.0, 0.0))
            * DMat4::from_rotation_z(self.roll.to_radians())
            * DMat4::from_scale(DVec3::new(self.zoom, self.zoom, 1.0))
            * DMat4::from_translation(DVec3::new(-self.center.x, -self.center.y, 0.0))
    }

    /// The ortho matrix as translate, rotate and scale, in canvas apply order.
    pub fn decomposed(&self) -> Decomposed {
        decompose(&self.ortho_matrix())
    }

    pub fn world_to_viewport(&self, p: Point) -> Point {
        p.transform(&self.ortho_matrix())
    }

    pub fn viewport_to_world(&self, p: Point) -> Point {
        p.transform(&self.ortho_matrix().inverse())
    }

    /// Scene-space box covering the visible canvas.
    pub fn visible_bounds(&self) -> BBox {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(self.width, self.height),
            Point::new(0.0, self.height),
        ]
        .map(|c| self.viewport_to_world(c));
        BBox::from_points(&corners).unwrap_or(BBox::new(self.center, self.center))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn test_default_is_identity() {
        let camera = Camera::new(200.0, 100.0);
        assert!(camera.ortho_matrix().abs_diff_eq(DMat4::IDENTITY, 1e-12));
        let d = camera.decomposed();
        assert!(close(d.translation, Point::new(0.0, 0.0)));
        assert!((d.scale[0] - 1.0).abs() < 1e-12 && (d.scale[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut camera = Camera::new(200.0, 100.0);
        let anchor = camera.viewport_to_world(Point::new(30.0, 40.0));
        camera.zoom_at(30.0, 40.0, 2.0);
        assert_eq!(camera.zoom, 2.0);
        assert!(close(camera.world_to_viewport(anchor), Point::new(30.0, 40.0)));
    }

    #[test]
    fn test_pan_moves_scene_with_pointer() {
        let mut camera = Camera::new(200.0, 100.0);
        camera.zoom = 2.0;
        let p = Point::new(50.0, 50.0);
        let before = camera.world_to_viewport(p);
        camera.pan(10.0, -4.0);
        assert!(close(camera.world_to_viewport(p), before.translate(10.0, -4.0)));
    }

    #[test]
    fn test_roll_decomposes() {
        let mut camera = Camera::new(100.0, 100.0);
        camera.rotate(30.0);
        camera.zoom = 3.0;
        let d = camera.decomposed();
        assert!((d.rotation - 30.0).abs() < 1e-9);
        assert!((d.scale[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_bbox() {
        let mut camera = Camera::new(100.0, 100.0);
        camera.fit_bbox(&BBox::new(Point::new(0.0, 0.0), Point::new(1000.0, 500.0)));
        assert!((camera.zoom - 0.09).abs() < 1e-12);
        assert_eq!(camera.center, Point::new(500.0, 250.0));
        let visible = camera.visible_bounds();
        assert!(visible.contains_point(&Point::new(0.0, 250.0)));
    }
}
