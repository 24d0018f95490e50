//! Gradient geometry shared by every gradient-capable backend.

use crate::geometry::Point;
use crate::style::{Length, RadialSize};

/// Endpoints of a linear gradient line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientLine {
    pub start: Point,
    pub end: Point,
}

impl GradientLine {
    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }
}

/// Gradient line through the centre of a `width x height` box at `angle`
/// degrees, long enough that the corners hit the 0% and 100% stops.
///
/// See <https://observablehq.com/@danburzo/css-gradient-line>.
pub fn compute_linear_gradient(width: f64, height: f64, angle: f64) -> GradientLine {
    let rad = angle.to_radians();
    let (sin, cos) = rad.sin_cos();
    let cx = width / 2.0;
    let cy = height / 2.0;
    let length = (width * cos).abs() + (height * sin).abs();
    GradientLine {
        start: Point::new(cx - cos * length / 2.0, cy - sin * length / 2.0),
        end: Point::new(cx + cos * length / 2.0, cy + sin * length / 2.0),
    }
}

/// Centre and radius of a radial gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientCircle {
    pub center: Point,
    pub radius: f64,
}

pub fn compute_radial_gradient(
    width: f64,
    height: f64,
    cx: Length,
    cy: Length,
    size: RadialSize,
) -> GradientCircle {
    let x = cx.resolve(width);
    let y = cy.resolve(height);
    let center = Point::new(x, y);
    let corners = [
        Point::new(0.0, 0.0),
        Point::new(0.0, height),
        Point::new(width, height),
        Point::new(width, 0.0),
    ];
    let corner_distances = corners.map(|c| center.distance_to(&c));
    let sides = [x, width - x, y, height - y];

    let radius = match size {
        RadialSize::Length(r) => r,
        RadialSize::ClosestSide => sides.into_iter().fold(f64::MAX, f64::min),
        RadialSize::FarthestSide => sides.into_iter().fold(f64::MIN, f64::max),
        RadialSize::ClosestCorner => corner_distances.into_iter().fold(f64::MAX, f64::min),
        RadialSize::FarthestCorner => corner_distances.into_iter().fold(f64::MIN, f64::max),
    };

    GradientCircle { center, radius }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_linear_angle_zero_spans_width() {
        let line = compute_linear_gradient(100.0, 50.0, 0.0);
        assert!(approx(line.start.x, 0.0));
        assert!(approx(line.start.y, 25.0));
        assert!(approx(line.end.x, 100.0));
        assert!(approx(line.end.y, 25.0));
    }

    #[test]
    fn test_linear_angle_ninety_spans_height() {
        let line = compute_linear_gradient(100.0, 50.0, 90.0);
        assert!(approx(line.start.x, 50.0));
        assert!(approx(line.start.y, 0.0));
        assert!(approx(line.end.x, 50.0));
        assert!(approx(line.end.y, 50.0));
    }

    #[test]
    fn test_linear_diagonal_length() {
        let line = compute_linear_gradient(100.0, 100.0, 45.0);
        assert!(approx(line.length(), 100.0 * std::f64::consts::SQRT_2));
    }

    #[test]
    fn test_radial_centered_farthest_corner() {
        let c = compute_radial_gradient(
            100.0,
            100.0,
            Length::percent(50.0),
            Length::percent(50.0),
            RadialSize::FarthestCorner,
        );
        assert!(approx(c.center.x, 50.0));
        assert!(approx(c.center.y, 50.0));
        assert!(approx(c.radius, 50.0 * std::f64::consts::SQRT_2));
    }

    #[test]
    fn test_radial_closest_side_and_explicit() {
        let c = compute_radial_gradient(
            100.0,
            40.0,
            Length::px(30.0),
            Length::percent(50.0),
            RadialSize::ClosestSide,
        );
        assert!(approx(c.radius, 20.0));

        let c = compute_radial_gradient(
            100.0,
            40.0,
            Length::px(30.0),
            Length::px(10.0),
            RadialSize::Length(7.0),
        );
        assert!(approx(c.center.x, 30.0));
        assert!(approx(c.center.y, 10.0));
        assert!(approx(c.radius, 7.0));
    }
}
