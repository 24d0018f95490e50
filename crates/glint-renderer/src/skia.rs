//! Software backend on top of tiny-skia.

use kurbo::{BezPath, PathEl, Rect};
use tiny_skia::{
    Color, ColorU8, FillRule, FilterQuality, LinearGradient, Mask, Path, PathBuilder, Pattern,
    Pixmap, PixmapPaint, RadialGradient, SpreadMode, Stroke, StrokeDash, Transform,
};

use glint_core::style::{LineCap, LineJoin};
use glint_io::{DecodedImage, RgbaSnapshot};

use crate::backend::{Canvas, Surface};
use crate::error::RenderError;
use crate::paint::{GradientStop, Paint, PaintStyle, Shader, StrokeStyle, TileMode};

/// Half-size of the strip a one-axis decal pattern is confined to.
const DECAL_EXTENT: f32 = 1.0e5;

pub struct PixmapCanvas {
    pixmap: Pixmap,
    transform: Transform,
    stack: Vec<Transform>,
}

impl PixmapCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::SurfaceCreation { width, height })?;
        Ok(Self {
            pixmap,
            transform: Transform::identity(),
            stack: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Straight RGBA copy of the pixels.
    pub fn snapshot(&self) -> RgbaSnapshot {
        let data = self
            .pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaSnapshot {
            width: self.pixmap.width(),
            height: self.pixmap.height(),
            data,
        }
    }

    fn draw_blurred(&mut self, path: &Path, paint: &Paint, sigma: f32) {
        let Some(mut layer) = Pixmap::new(self.pixmap.width(), self.pixmap.height()) else {
            return;
        };
        paint_path(&mut layer, path, paint, self.transform);
        box_blur(&mut layer, sigma);
        self.pixmap.draw_pixmap(
            0,
            0,
            layer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }
}

impl Canvas for PixmapCanvas {
    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.transform = self.transform.pre_translate(dx as f32, dy as f32);
    }

    fn rotate(&mut self, degrees: f64) {
        self.transform = self
            .transform
            .pre_concat(Transform::from_rotate(degrees as f32));
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.transform = self.transform.pre_scale(sx as f32, sy as f32);
    }

    fn skew(&mut self, kx: f64, ky: f64) {
        self.transform = self
            .transform
            .pre_concat(Transform::from_row(1.0, ky as f32, kx as f32, 1.0, 0.0, 0.0));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.pixmap.fill(to_color(color));
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        let Some(path) = to_skia_path(path) else {
            return;
        };
        match paint.blur_sigma {
            Some(sigma) if sigma > 0.0 => self.draw_blurred(&path, paint, sigma),
            _ => paint_path(&mut self.pixmap, &path, paint, self.transform),
        }
    }

    fn draw_image(&mut self, image: &DecodedImage, dst: Rect, opacity: f32) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let Some(source) = to_pixmap(image) else {
            return;
        };
        let transform = self
            .transform
            .pre_translate(dst.x0 as f32, dst.y0 as f32)
            .pre_scale(
                (dst.width() / image.width as f64) as f32,
                (dst.height() / image.height as f64) as f32,
            );
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    }
}

/// A tiny-skia pixmap the frame renderer draws into.
pub struct PixmapSurface {
    canvas: PixmapCanvas,
    deleted: bool,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        Ok(Self {
            canvas: PixmapCanvas::new(width, height)?,
            deleted: false,
        })
    }

    pub fn pixmap(&self) -> &Pixmap {
        self.canvas.pixmap()
    }

    /// Stop the frame loop at the next frame.
    pub fn delete(&mut self) {
        self.deleted = true;
    }
}

impl Surface for PixmapSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn size(&self) -> (u32, u32) {
        (self.canvas.pixmap.width(), self.canvas.pixmap.height())
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn snapshot(&mut self) -> Result<RgbaSnapshot, RenderError> {
        Ok(self.canvas.snapshot())
    }
}

fn to_color(c: [f32; 4]) -> Color {
    Color::from_rgba(
        c[0].clamp(0.0, 1.0),
        c[1].clamp(0.0, 1.0),
        c[2].clamp(0.0, 1.0),
        c[3].clamp(0.0, 1.0),
    )
    .unwrap_or(Color::TRANSPARENT)
}

fn to_skia_path(path: &BezPath) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn to_pixmap(image: &DecodedImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width, image.height)?;
    for (px, rgba) in pixmap
        .pixels_mut()
        .iter_mut()
        .zip(image.data.chunks_exact(4))
    {
        *px = ColorU8::from_rgba(rgba[0], rgba[1], rgba[2], rgba[3]).premultiply();
    }
    Some(pixmap)
}

fn spread_mode(mode: TileMode) -> SpreadMode {
    match mode {
        TileMode::Clamp | TileMode::Decal => SpreadMode::Pad,
        TileMode::Repeat => SpreadMode::Repeat,
        TileMode::Mirror => SpreadMode::Reflect,
    }
}

/// Gradient stops with the paint's alpha folded in.
fn skia_stops(stops: &[GradientStop], alpha: f32) -> Vec<tiny_skia::GradientStop> {
    stops
        .iter()
        .map(|s| {
            let [r, g, b, a] = s.color;
            tiny_skia::GradientStop::new(s.position, to_color([r, g, b, a * alpha]))
        })
        .collect()
}

fn skia_stroke(style: &StrokeStyle) -> Stroke {
    let dash = style.dash.as_ref().and_then(|dash| {
        let mut intervals: Vec<f32> = dash.intervals.iter().map(|v| *v as f32).collect();
        if intervals.len() % 2 == 1 {
            intervals.extend_from_within(..);
        }
        StrokeDash::new(intervals, dash.offset as f32)
    });
    Stroke {
        width: style.width as f32,
        miter_limit: style.miter_limit.map(|m| m as f32).unwrap_or(4.0),
        line_cap: match style.cap {
            LineCap::Butt => tiny_skia::LineCap::Butt,
            LineCap::Round => tiny_skia::LineCap::Round,
            LineCap::Square => tiny_skia::LineCap::Square,
        },
        line_join: match style.join {
            LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
            LineJoin::Round => tiny_skia::LineJoin::Round,
            LineJoin::Miter => tiny_skia::LineJoin::Miter,
        },
        dash,
    }
}

/// Mask confining a pattern to the image along its decal axes.
fn decal_mask(
    image: &DecodedImage,
    tile_x: TileMode,
    tile_y: TileMode,
    transform: Transform,
    width: u32,
    height: u32,
) -> Option<Mask> {
    let (x0, x1) = match tile_x {
        TileMode::Decal => (0.0, image.width as f32),
        _ => (-DECAL_EXTENT, DECAL_EXTENT),
    };
    let (y0, y1) = match tile_y {
        TileMode::Decal => (0.0, image.height as f32),
        _ => (-DECAL_EXTENT, DECAL_EXTENT),
    };
    let rect = tiny_skia::Rect::from_ltrb(x0, y0, x1, y1)?;
    let mut mask = Mask::new(width, height)?;
    mask.fill_path(&PathBuilder::from_rect(rect), FillRule::Winding, true, transform);
    Some(mask)
}

/// Fill or stroke `path`, one pass per shader layer.
fn paint_path(target: &mut Pixmap, path: &Path, paint: &Paint, transform: Transform) {
    let layers: Vec<Option<&Shader>> = match &paint.shader {
        Some(shader) => shader.layers().into_iter().map(Some).collect(),
        None => vec![None],
    };
    let (width, height) = (target.width(), target.height());

    for layer in layers {
        let pattern_source: Pixmap;
        let mut mask = None;
        let mut sk = tiny_skia::Paint {
            anti_alias: paint.anti_alias,
            ..tiny_skia::Paint::default()
        };
        match layer {
            None => sk.set_color(to_color(paint.color)),
            Some(Shader::Linear {
                start,
                end,
                stops,
                tile_mode,
            }) => {
                let Some(shader) = LinearGradient::new(
                    tiny_skia::Point::from_xy(start.x as f32, start.y as f32),
                    tiny_skia::Point::from_xy(end.x as f32, end.y as f32),
                    skia_stops(stops, paint.alpha()),
                    spread_mode(*tile_mode),
                    Transform::identity(),
                ) else {
                    continue;
                };
                sk.shader = shader;
            }
            Some(Shader::Radial {
                center,
                radius,
                stops,
                tile_mode,
            }) => {
                let center = tiny_skia::Point::from_xy(center.x as f32, center.y as f32);
                let Some(shader) = RadialGradient::new(
                    center,
                    center,
                    *radius as f32,
                    skia_stops(stops, paint.alpha()),
                    spread_mode(*tile_mode),
                    Transform::identity(),
                ) else {
                    continue;
                };
                sk.shader = shader;
            }
            Some(Shader::Image {
                image,
                tile_x,
                tile_y,
                ..
            }) => {
                let Some(source) = to_pixmap(image) else {
                    continue;
                };
                pattern_source = source;
                let repeats = *tile_x == TileMode::Repeat || *tile_y == TileMode::Repeat;
                if *tile_x == TileMode::Decal || *tile_y == TileMode::Decal {
                    mask = decal_mask(image, *tile_x, *tile_y, transform, width, height);
                }
                sk.shader = Pattern::new(
                    pattern_source.as_ref(),
                    if repeats { SpreadMode::Repeat } else { SpreadMode::Pad },
                    FilterQuality::Bicubic,
                    paint.alpha().clamp(0.0, 1.0),
                    Transform::identity(),
                );
            }
            Some(Shader::Blend { .. }) => continue,
        }

        match &paint.style {
            PaintStyle::Fill => {
                target.fill_path(path, &sk, FillRule::Winding, transform, mask.as_ref())
            }
            PaintStyle::Stroke(style) => {
                target.stroke_path(path, &sk, &skia_stroke(style), transform, mask.as_ref())
            }
        }
    }
}

/// Approximate a gaussian blur with three box passes per axis on
/// premultiplied pixels.
fn box_blur(pixmap: &mut Pixmap, sigma: f32) {
    let radius = (((4.0 * sigma * sigma + 1.0).sqrt() - 1.0) / 2.0).round() as usize;
    if radius == 0 {
        return;
    }
    let (width, height) = (pixmap.width() as usize, pixmap.height() as usize);
    let data = pixmap.data_mut();
    let mut scratch = vec![0u8; data.len()];
    for _ in 0..3 {
        blur_pass(data, &mut scratch, width, height, radius, true);
        blur_pass(&scratch, data, width, height, radius, false);
    }
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize, horizontal: bool) {
    let (lines, len) = if horizontal { (height, width) } else { (width, height) };
    let index = |line: usize, i: usize| {
        if horizontal {
            (line * width + i) * 4
        } else {
            (i * width + line) * 4
        }
    };
    let divisor = (2 * radius + 1) as u32;

    for line in 0..lines {
        let mut sum = [0u32; 4];
        for i in 0..=radius.min(len - 1) {
            let at = index(line, i);
            for c in 0..4 {
                sum[c] += src[at + c] as u32;
            }
        }
        for i in 0..len {
            let out = index(line, i);
            for c in 0..4 {
                dst[out + c] = (sum[c] / divisor) as u8;
            }
            if i + radius + 1 < len {
                let at = index(line, i + radius + 1);
                for c in 0..4 {
                    sum[c] += src[at + c] as u32;
                }
            }
            if i >= radius {
                let at = index(line, i - radius);
                for c in 0..4 {
                    sum[c] -= src[at + c] as u32;
                }
            }
        }
    }
}
