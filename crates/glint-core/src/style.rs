//! Parsed style values.
//!
//! These are the computed values produced by the style pipeline, which lives
//! outside this crate. Everything here is plain data; the renderer turns it
//! into paints each frame.

use serde::{Deserialize, Serialize};

use crate::display_object::NodeId;

/// RGBA color. Channels are in `0.0 ..= 255.0`, alpha in `0.0 ..= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub alpha: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Rgba = Rgba::new(255.0, 255.0, 255.0, 1.0);
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, alpha: f32) -> Self {
        Self { r, g, b, alpha }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32, g as f32, b as f32, 1.0)
    }

    /// Channels scaled to `0.0 ..= 1.0`, alpha multiplied by `opacity`.
    pub fn to_f32_array(&self, opacity: f32) -> [f32; 4] {
        [
            self.r / 255.0,
            self.g / 255.0,
            self.b / 255.0,
            self.alpha * opacity,
        ]
    }
}

/// Source of a fill or stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PaintSource {
    /// The `none` keyword: paint nothing.
    None,
    Color(Rgba),
    /// One or more gradients layered left to right.
    Gradients(Vec<Gradient>),
    Pattern(Pattern),
}

impl PaintSource {
    pub fn is_none(&self) -> bool {
        matches!(self, PaintSource::None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Gradient {
    Linear(LinearGradient),
    Radial(RadialGradient),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    /// Degrees, 0 points along +x.
    pub angle: f64,
    pub steps: Vec<ColorStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialGradient {
    pub cx: Length,
    pub cy: Length,
    pub size: RadialSize,
    pub steps: Vec<ColorStop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub offset: Length,
    pub color: Rgba,
}

impl ColorStop {
    pub fn new(offset: Length, color: Rgba) -> Self {
        Self { offset, color }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Percent,
    Px,
    /// Unit-less number.
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    pub unit: Unit,
}

impl Length {
    pub fn percent(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Percent,
        }
    }

    pub fn px(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Px,
        }
    }

    pub fn number(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Number,
        }
    }

    /// Resolve against `reference`: percentages scale it, everything else is
    /// taken as an absolute value.
    pub fn resolve(&self, reference: f64) -> f64 {
        match self.unit {
            Unit::Percent => reference * self.value / 100.0,
            Unit::Px | Unit::Number => self.value,
        }
    }
}

/// Ending shape size of a radial gradient.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RadialSize {
    Length(f64),
    ClosestSide,
    FarthestSide,
    ClosestCorner,
    #[default]
    FarthestCorner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Image URL resolved through the image pool.
    pub image: String,
    pub repetition: Repetition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Repetition {
    #[default]
    Repeat,
    RepeatX,
    RepeatY,
    NoRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineJoin {
    Bevel,
    Round,
    #[default]
    Miter,
}

/// The computed style of a display object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStyle {
    pub fill: Option<PaintSource>,
    pub stroke: Option<PaintSource>,
    pub opacity: f32,
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: Option<f64>,
    pub line_dash: Option<Vec<f64>>,
    pub line_dash_offset: Option<f64>,
    pub shadow_color: Option<Rgba>,
    pub shadow_blur: f64,
    pub shadow_offset_x: f64,
    pub shadow_offset_y: f64,
    /// Fractions of the geometry size; `[0.5, 0.5]` puts the origin at the
    /// centre. `None` uses the default of the shape kind.
    pub anchor: Option<[f64; 2]>,
    /// Another display object (or this one) whose geometry clips this subtree.
    pub clip_path: Option<NodeId>,
    /// Whether the object takes part in picking.
    pub interactive: bool,
    pub visible: bool,
}

impl Default for ParsedStyle {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            opacity: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: None,
            line_dash: None,
            line_dash_offset: None,
            shadow_color: None,
            shadow_blur: 0.0,
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            anchor: None,
            clip_path: None,
            interactive: true,
            visible: true,
        }
    }
}

impl ParsedStyle {
    pub fn with_fill(mut self, color: Rgba) -> Self {
        self.fill = Some(PaintSource::Color(color));
        self
    }

    pub fn with_stroke(mut self, color: Rgba, line_width: f64) -> Self {
        self.stroke = Some(PaintSource::Color(color));
        self.line_width = line_width;
        self
    }

    pub fn with_anchor(mut self, x: f64, y: f64) -> Self {
        self.anchor = Some([x, y]);
        self
    }

    pub fn has_fill(&self) -> bool {
        self.fill.as_ref().is_some_and(|f| !f.is_none())
    }

    pub fn has_stroke(&self) -> bool {
        self.stroke.as_ref().is_some_and(|s| !s.is_none())
    }

    pub fn has_shadow(&self) -> bool {
        self.shadow_color.is_some() && self.shadow_blur > 0.0
    }
}
