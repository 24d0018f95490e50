use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point};

/// Stable tag naming the kind of a display object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Group,
    Circle,
    Ellipse,
    Rect,
    Line,
    Polyline,
    Polygon,
    Path,
    Image,
    Text,
    Html,
    Mesh,
    Custom(String),
}

impl ShapeKind {
    /// Pure containers are never drawn or picked themselves.
    pub fn is_container(&self) -> bool {
        matches!(self, ShapeKind::Group | ShapeKind::Html | ShapeKind::Mesh)
    }

    /// Anchor used when the style sets none: circles and ellipses sit on
    /// their centre, everything else on its top-left corner.
    pub fn default_anchor(&self) -> [f64; 2] {
        match self {
            ShapeKind::Circle | ShapeKind::Ellipse => [0.5, 0.5],
            _ => [0.0, 0.0],
        }
    }
}

/// One segment command of a path shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

/// Shape attributes in geometry space.
///
/// Circles and ellipses are centred on their radii and rects start at the
/// origin, so their geometry box always begins at `(0, 0)`. Point-based
/// shapes keep their points' own coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Group,
    Circle {
        r: f64,
    },
    Ellipse {
        rx: f64,
        ry: f64,
    },
    Rect {
        width: f64,
        height: f64,
        radius: f64,
    },
    Line {
        from: Point,
        to: Point,
    },
    Polyline {
        points: Vec<Point>,
    },
    Polygon {
        points: Vec<Point>,
    },
    Path {
        commands: Vec<PathCommand>,
    },
    Image {
        src: String,
        width: f64,
        height: f64,
    },
    /// Text extents come from an external layout step.
    Text {
        text: String,
        font_size: f64,
        width: f64,
        height: f64,
    },
    Html {
        width: f64,
        height: f64,
    },
    Mesh,
    Custom {
        kind: String,
        bounds: BBox,
    },
}

impl Geometry {
    pub fn rect(width: f64, height: f64) -> Self {
        Geometry::Rect {
            width,
            height,
            radius: 0.0,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Group => ShapeKind::Group,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Ellipse { .. } => ShapeKind::Ellipse,
            Geometry::Rect { .. } => ShapeKind::Rect,
            Geometry::Line { .. } => ShapeKind::Line,
            Geometry::Polyline { .. } => ShapeKind::Polyline,
            Geometry::Polygon { .. } => ShapeKind::Polygon,
            Geometry::Path { .. } => ShapeKind::Path,
            Geometry::Image { .. } => ShapeKind::Image,
            Geometry::Text { .. } => ShapeKind::Text,
            Geometry::Html { .. } => ShapeKind::Html,
            Geometry::Mesh => ShapeKind::Mesh,
            Geometry::Custom { kind, .. } => ShapeKind::Custom(kind.clone()),
        }
    }

    /// Geometry-space bounds, not including any stroke.
    pub fn bounds(&self) -> Option<BBox> {
        let origin = Point::new(0.0, 0.0);
        match self {
            Geometry::Group | Geometry::Mesh => None,
            Geometry::Circle { r } => Some(BBox::new(origin, Point::new(2.0 * r, 2.0 * r))),
            Geometry::Ellipse { rx, ry } => {
                Some(BBox::new(origin, Point::new(2.0 * rx, 2.0 * ry)))
            }
            Geometry::Rect { width, height, .. }
            | Geometry::Image { width, height, .. }
            | Geometry::Text { width, height, .. }
            | Geometry::Html { width, height } => {
                Some(BBox::new(origin, Point::new(*width, *height)))
            }
            Geometry::Line { from, to } => BBox::from_points(&[*from, *to]),
            Geometry::Polyline { points } | Geometry::Polygon { points } => {
                BBox::from_points(points)
            }
            Geometry::Path { commands } => {
                let points: Vec<Point> = commands
                    .iter()
                    .flat_map(|c| match *c {
                        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => vec![p],
                        PathCommand::QuadTo(a, b) => vec![a, b],
                        PathCommand::CubicTo(a, b, c) => vec![a, b, c],
                        PathCommand::Close => vec![],
                    })
                    .collect();
                BBox::from_points(&points)
            }
            Geometry::Custom { bounds, .. } => Some(*bounds),
        }
    }

    /// Full width and height of the geometry box.
    pub fn size(&self) -> (f64, f64) {
        self.bounds()
            .map(|b| (b.width(), b.height()))
            .unwrap_or((0.0, 0.0))
    }
}
