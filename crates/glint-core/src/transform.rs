use glam::{DMat4, DVec3, DVec4, EulerRot};
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// The local transform of a display object relative to its parent.
///
/// Composition order is translate, skew, rotate, scale, which is also the
/// order in which the renderer applies them to a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    /// Translation offset.
    pub position: Point,
    /// Non-uniform scale factors.
    pub scale: [f64; 2],
    /// Rotation about the view axis in degrees.
    pub rotation: f64,
    /// Shear factors along x and y.
    pub skew: [f64; 2],
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Point::new(0.0, 0.0),
            scale: [1.0, 1.0],
            rotation: 0.0,
            skew: [0.0, 0.0],
        }
    }
}

impl LocalTransform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_translation(DVec3::new(self.position.x, self.position.y, 0.0))
            * skew_matrix(self.skew[0], self.skew[1])
            * DMat4::from_rotation_z(self.rotation.to_radians())
            * DMat4::from_scale(DVec3::new(self.scale[0], self.scale[1], 1.0))
    }
}

/// A 2D shear expressed as a 4x4 matrix: `x' = x + kx * y`, `y' = ky * x + y`.
pub fn skew_matrix(kx: f64, ky: f64) -> DMat4 {
    DMat4::from_cols(
        DVec4::new(1.0, ky, 0.0, 0.0),
        DVec4::new(kx, 1.0, 0.0, 0.0),
        DVec4::Z,
        DVec4::W,
    )
}

/// Translation, rotation about Z and scale extracted from an affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Point,
    /// Degrees.
    pub rotation: f64,
    pub scale: [f64; 2],
}

/// Split `matrix` into translate / rotate / scale so that applying them in
/// that order reproduces it (shear is dropped).
pub fn decompose(matrix: &DMat4) -> Decomposed {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    let (_, _, z) = rotation.to_euler(EulerRot::XYZ);
    Decomposed {
        translation: Point::new(translation.x, translation.y),
        rotation: z.to_degrees(),
        scale: [scale.x, scale.y],
    }
}
