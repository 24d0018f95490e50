//! # Glint Core
//!
//! Retained-mode scene model: display objects with local transforms and
//! parsed style, the document tree with lazily cached world transforms, an
//! R-tree spatial index, per-shape geometry (paths and point-in-shape tests)
//! and the gradient geometry shared by all backends.

pub mod geometry;
pub mod transform;
pub mod style;
pub mod gradient;
pub mod shape;
pub mod shapes;
pub mod display_object;
pub mod document;
pub mod spatial;
pub mod error;

pub use display_object::{DisplayObject, NodeId};
pub use document::Document;
pub use error::SceneError;
pub use geometry::{BBox, Point};
pub use shape::{Geometry, PathCommand, ShapeKind};
pub use shapes::{GeometryRegistry, ShapeGeometry};
pub use style::{ParsedStyle, PaintSource, Rgba};
pub use transform::LocalTransform;
