//! Turning parsed style into paints.
//!
//! Paints are plain values rebuilt for every object on every frame. A
//! [`PaintSet`] lives for one object's draw and is dropped when the draw
//! scope ends.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use glint_core::gradient::{compute_linear_gradient, compute_radial_gradient};
use glint_core::style::{ColorStop, Gradient, LineCap, LineJoin, Pattern, Repetition, Unit};
use glint_core::{DisplayObject, PaintSource, Point, Rgba};
use glint_io::{DecodedImage, ImageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    Clamp,
    Repeat,
    Mirror,
    /// Transparent outside the source.
    Decal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    SrcOver,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    /// Straight RGBA in `0.0 ..= 1.0`.
    pub color: [f32; 4],
}

/// Cubic resampling coefficients (Mitchell-Netravali B and C).
pub const CUBIC_RESAMPLER: [f32; 2] = [1.0 / 3.0, 1.0 / 3.0];

#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Linear {
        start: Point,
        end: Point,
        stops: Vec<GradientStop>,
        tile_mode: TileMode,
    },
    Radial {
        center: Point,
        radius: f64,
        stops: Vec<GradientStop>,
        tile_mode: TileMode,
    },
    Image {
        image: Arc<DecodedImage>,
        tile_x: TileMode,
        tile_y: TileMode,
        cubic: [f32; 2],
    },
    /// `src` composited over `dst`.
    Blend {
        mode: BlendMode,
        dst: Box<Shader>,
        src: Box<Shader>,
    },
}

impl Shader {
    /// The non-blend shaders in back-to-front order.
    pub fn layers(&self) -> Vec<&Shader> {
        match self {
            Shader::Blend { dst, src, .. } => {
                let mut layers = dst.layers();
                layers.extend(src.layers());
                layers
            }
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dash {
    pub intervals: Vec<f64>,
    pub offset: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f64>,
    pub dash: Option<Dash>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintStyle {
    Fill,
    Stroke(StrokeStyle),
}

/// Backend-neutral paint.
///
/// With a shader only the alpha of `color` is used, as a global opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub style: PaintStyle,
    pub anti_alias: bool,
    pub color: [f32; 4],
    pub shader: Option<Shader>,
    /// Gaussian blur applied to the painted coverage.
    pub blur_sigma: Option<f32>,
}

impl Paint {
    pub fn fill(color: [f32; 4]) -> Self {
        Self {
            style: PaintStyle::Fill,
            anti_alias: true,
            color,
            shader: None,
            blur_sigma: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.color[3]
    }

    /// A blurred, shader-free copy in the shadow color.
    pub fn to_shadow(&self, color: Rgba, sigma: f32) -> Self {
        Self {
            style: self.style.clone(),
            anti_alias: true,
            color: color.to_f32_array(1.0),
            shader: None,
            blur_sigma: Some(sigma),
        }
    }
}

/// Paints for one object's draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaintSet {
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
    pub shadow_fill: Option<Paint>,
    pub shadow_stroke: Option<Paint>,
}

impl PaintSet {
    pub fn is_empty(&self) -> bool {
        self.fill.is_none()
            && self.stroke.is_none()
            && self.shadow_fill.is_none()
            && self.shadow_stroke.is_none()
    }
}

/// Builds [`PaintSet`]s from parsed style.
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    redraw: Rc<Cell<bool>>,
}

impl StyleResolver {
    /// `redraw` is raised when a deferred pattern image becomes available.
    pub fn new(redraw: Rc<Cell<bool>>) -> Self {
        Self { redraw }
    }

    pub fn resolve(&self, object: &DisplayObject, images: &dyn ImageSource) -> PaintSet {
        let style = object.style();
        let fill = style
            .fill
            .as_ref()
            .filter(|source| !source.is_none())
            .and_then(|source| {
                self.source_paint(object, source, style.fill_opacity * style.opacity, images)
            })
            .map(|(color, shader)| Paint {
                shader,
                ..Paint::fill(color)
            });

        let stroke = style
            .stroke
            .as_ref()
            .filter(|source| !source.is_none() && style.line_width > 0.0)
            .and_then(|source| {
                self.source_paint(object, source, style.stroke_opacity * style.opacity, images)
            })
            .map(|(color, shader)| Paint {
                style: PaintStyle::Stroke(StrokeStyle {
                    width: style.line_width,
                    cap: style.line_cap,
                    join: style.line_join,
                    miter_limit: style.miter_limit,
                    dash: style.line_dash.as_ref().map(|intervals| Dash {
                        intervals: intervals.clone(),
                        offset: style.line_dash_offset.unwrap_or(0.0),
                    }),
                }),
                shader,
                ..Paint::fill(color)
            });

        let (shadow_fill, shadow_stroke) = match style.shadow_color {
            Some(color) if style.shadow_blur > 0.0 => {
                let sigma = (style.shadow_blur / 2.0) as f32;
                (
                    fill.as_ref().map(|p| p.to_shadow(color, sigma)),
                    stroke.as_ref().map(|p| p.to_shadow(color, sigma)),
                )
            }
            _ => (None, None),
        };

        PaintSet {
            fill,
            stroke,
            shadow_fill,
            shadow_stroke,
        }
    }

    /// Color and optional shader for a paint source, or `None` when nothing
    /// can be painted this frame.
    fn source_paint(
        &self,
        object: &DisplayObject,
        source: &PaintSource,
        opacity: f32,
        images: &dyn ImageSource,
    ) -> Option<([f32; 4], Option<Shader>)> {
        match source {
            PaintSource::None => None,
            PaintSource::Color(color) => Some((color.to_f32_array(opacity), None)),
            PaintSource::Gradients(gradients) => {
                let shader = gradients_shader(object, gradients)?;
                Some(([0.0, 0.0, 0.0, opacity], Some(shader)))
            }
            PaintSource::Pattern(pattern) => {
                let shader = self.pattern_shader(object, pattern, images)?;
                Some(([0.0, 0.0, 0.0, opacity], Some(shader)))
            }
        }
    }

    fn pattern_shader(
        &self,
        object: &DisplayObject,
        pattern: &Pattern,
        images: &dyn ImageSource,
    ) -> Option<Shader> {
        let dirty = object.paint_dirty_flag();
        let redraw = Rc::clone(&self.redraw);
        let image = images.get_image_sync(
            &pattern.image,
            object.id,
            Box::new(move |_| {
                dirty.set(true);
                redraw.set(true);
            }),
        )?;
        let (tile_x, tile_y) = match pattern.repetition {
            Repetition::Repeat => (TileMode::Repeat, TileMode::Repeat),
            Repetition::RepeatX => (TileMode::Repeat, TileMode::Decal),
            Repetition::RepeatY => (TileMode::Decal, TileMode::Repeat),
            Repetition::NoRepeat => (TileMode::Decal, TileMode::Decal),
        };
        Some(Shader::Image {
            image,
            tile_x,
            tile_y,
            cubic: CUBIC_RESAMPLER,
        })
    }
}

/// Layer the gradients left to right into one shader.
pub fn gradients_shader(object: &DisplayObject, gradients: &[Gradient]) -> Option<Shader> {
    let (width, height) = object.size();
    gradients
        .iter()
        .map(|g| gradient_shader(width, height, g))
        .reduce(|dst, src| Shader::Blend {
            mode: BlendMode::SrcOver,
            dst: Box::new(dst),
            src: Box::new(src),
        })
}

pub fn gradient_shader(width: f64, height: f64, gradient: &Gradient) -> Shader {
    match gradient {
        Gradient::Linear(linear) => {
            let line = compute_linear_gradient(width, height, linear.angle);
            Shader::Linear {
                start: line.start,
                end: line.end,
                stops: resolve_stops(&linear.steps, line.length()),
                tile_mode: TileMode::Mirror,
            }
        }
        Gradient::Radial(radial) => {
            let circle =
                compute_radial_gradient(width, height, radial.cx, radial.cy, radial.size);
            Shader::Radial {
                center: circle.center,
                radius: circle.radius,
                stops: resolve_stops(&radial.steps, circle.radius),
                tile_mode: TileMode::Clamp,
            }
        }
    }
}

/// One position per stop: percentages and numbers are fractions, pixels are
/// divided by `length`. Positions are clamped to `[0, 1]` and never decrease.
/// Fully transparent stops use white so they fade instead of darkening.
pub fn resolve_stops(steps: &[ColorStop], length: f64) -> Vec<GradientStop> {
    let mut last = 0.0_f64;
    steps
        .iter()
        .map(|stop| {
            let raw = match stop.offset.unit {
                Unit::Percent => stop.offset.value / 100.0,
                Unit::Number => stop.offset.value,
                Unit::Px if length > 0.0 => stop.offset.value / length,
                Unit::Px => 0.0,
            };
            let raw = if raw.is_finite() { raw } else { 0.0 };
            last = raw.clamp(0.0, 1.0).max(last);
            let color = if stop.color.alpha == 0.0 {
                [1.0, 1.0, 1.0, 0.0]
            } else {
                stop.color.to_f32_array(1.0)
            };
            GradientStop {
                position: last as f32,
                color,
            }
        })
        .collect()
}
