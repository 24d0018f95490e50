use std::cell::Cell;
use std::rc::Rc;

use futures::channel::oneshot;
use kurbo::Rect;
use serde::{Deserialize, Serialize};

use glint_core::{Document, GeometryRegistry, NodeId, Rgba, ShapeKind};
use glint_io::{encode, CanvasConfig, CaptureFormat, EncodedImage, FontFace, FontLoader, ImageSource};

use crate::backend::{Canvas, Surface};
use crate::camera::Camera;
use crate::error::RenderError;
use crate::paint::StyleResolver;
use crate::shapes::{RenderContext, ShapeRenderer, ShapeRendererRegistry};

/// Region an animation reports as changed by a seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl DamageRect {
    pub const EMPTY: DamageRect = DamageRect {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        !(self.right > self.left && self.bottom > self.top)
    }
}

/// A vector animation driven by the frame loop.
pub trait Animation {
    /// Length of one loop in milliseconds.
    fn duration(&self) -> f64;
    /// Natural size, used as the default drawing bounds.
    fn size(&self) -> (f64, f64);
    /// Move to `t` in `[0, 1)` of the loop and report what changed.
    fn seek(&mut self, t: f64) -> DamageRect;
    fn render(&mut self, canvas: &mut dyn Canvas, bounds: Rect);
    fn is_deleted(&self) -> bool;
    fn delete(&mut self);
}

/// A particle system driven by the frame loop.
pub trait Particles {
    /// Advance the simulation to `seconds`.
    fn update(&mut self, seconds: f64);
    fn draw(&mut self, canvas: &mut dyn Canvas);
    fn is_deleted(&self) -> bool;
    fn delete(&mut self);
}

/// Runs on the canvas before a particle system is drawn.
pub type ParticlesFrameHook = Box<dyn FnMut(&mut dyn Canvas)>;

struct AnimationEntry {
    name: String,
    bounds: Rect,
    animation: Box<dyn Animation>,
}

struct ParticlesEntry {
    particles: Box<dyn Particles>,
    on_frame: Option<ParticlesFrameHook>,
}

/// Capture result delivered by the frame after [`FrameRenderer::to_data_url`].
pub type CaptureReceiver = oneshot::Receiver<Result<EncodedImage, RenderError>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataUrlOptions {
    /// MIME type; PNG when empty.
    pub mime: String,
    /// Encoder quality in `0.0 ..= 1.0`. Only JPEG uses it; PNG and WebP
    /// captures are lossless and ignore it.
    pub quality: Option<f32>,
}

impl Default for DataUrlOptions {
    fn default() -> Self {
        Self {
            mime: CaptureFormat::Png.mime().to_string(),
            quality: None,
        }
    }
}

struct PendingCapture {
    format: CaptureFormat,
    quality: Option<f32>,
    sender: oneshot::Sender<Result<EncodedImage, RenderError>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    pub background: Rgba,
    pub device_pixel_ratio: f64,
    /// Faces loaded by [`FrameRenderer::start`].
    pub fonts: Vec<FontFace>,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            background: Rgba::TRANSPARENT,
            device_pixel_ratio: 1.0,
            fonts: Vec::new(),
        }
    }
}

impl From<&CanvasConfig> for RendererOptions {
    fn from(config: &CanvasConfig) -> Self {
        Self {
            background: config.background,
            device_pixel_ratio: config.device_pixel_ratio,
            fonts: config.fonts.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Idle,
    Running,
    Destroyed,
}

/// Whether the host should schedule another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Stopped,
}

/// Draws a [`Document`] onto a [`Surface`] once per animation frame.
pub struct FrameRenderer<S: Surface> {
    surface: S,
    options: RendererOptions,
    camera: Camera,
    resolver: StyleResolver,
    renderers: ShapeRendererRegistry,
    images: Rc<dyn ImageSource>,
    fonts: FontLoader,
    state: RendererState,
    first_frame: f64,
    animations: Vec<AnimationEntry>,
    particles: Vec<ParticlesEntry>,
    capture: Option<PendingCapture>,
    redraw: Rc<Cell<bool>>,
}

impl<S: Surface> FrameRenderer<S> {
    pub fn new(surface: S, options: RendererOptions, images: Rc<dyn ImageSource>) -> Self {
        let dpr = positive_or_one(options.device_pixel_ratio);
        let (width, height) = surface.size();
        let camera = Camera::new(width as f64 / dpr, height as f64 / dpr);
        let redraw = Rc::new(Cell::new(false));
        let renderers = ShapeRendererRegistry::with_builtin_renderers(
            GeometryRegistry::with_builtin_shapes(),
            Rc::clone(&images),
            Rc::clone(&redraw),
        );
        Self {
            surface,
            options,
            camera,
            resolver: StyleResolver::new(Rc::clone(&redraw)),
            renderers,
            images,
            fonts: FontLoader::new(),
            state: RendererState::Idle,
            first_frame: 0.0,
            animations: Vec::new(),
            particles: Vec::new(),
            capture: None,
            redraw,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn fonts(&self) -> &FontLoader {
        &self.fonts
    }

    pub fn register_renderer(&mut self, kind: ShapeKind, renderer: impl ShapeRenderer + 'static) {
        self.renderers.register(kind, renderer);
    }

    /// Set when a deferred image became ready since the last frame.
    pub fn needs_redraw(&self) -> bool {
        self.redraw.get()
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn particles_count(&self) -> usize {
        self.particles.len()
    }

    /// Load fonts, apply the device pixel ratio and start the frame loop.
    /// `now` (milliseconds) is the time animations are measured from.
    pub fn start(&mut self, now: f64) -> Result<FrameOutcome, RenderError> {
        match self.state {
            RendererState::Destroyed => return Err(RenderError::Destroyed),
            RendererState::Running => return Err(RenderError::AlreadyStarted),
            RendererState::Idle => {}
        }
        for face in &self.options.fonts {
            self.fonts.load_font(&face.family, &face.path)?;
        }
        let dpr = positive_or_one(self.options.device_pixel_ratio);
        self.surface.canvas().scale(dpr, dpr);
        self.first_frame = now;
        self.state = RendererState::Running;
        log::info!(
            "Frame renderer started ({} font(s), dpr {dpr})",
            self.fonts.len()
        );
        Ok(FrameOutcome::Continue)
    }

    pub fn play_animation(&mut self, name: &str, animation: Box<dyn Animation>, bounds: Option<Rect>) {
        let bounds = bounds.unwrap_or_else(|| {
            let (w, h) = animation.size();
            Rect::new(0.0, 0.0, w, h)
        });
        self.animations.push(AnimationEntry {
            name: name.to_string(),
            bounds,
            animation,
        });
    }

    /// Delete and drop every animation called `name`.
    pub fn stop_animation(&mut self, name: &str) -> bool {
        let before = self.animations.len();
        self.animations.retain_mut(|entry| {
            if entry.name == name {
                entry.animation.delete();
                false
            } else {
                true
            }
        });
        self.animations.len() != before
    }

    pub fn create_particles(&mut self, particles: Box<dyn Particles>, on_frame: Option<ParticlesFrameHook>) {
        self.particles.push(ParticlesEntry {
            particles,
            on_frame,
        });
    }

    /// Ask for the next frame to be captured.
    ///
    /// The format is checked now; the receiver resolves after the next drawn
    /// frame. A newer request replaces a pending one, whose receiver is
    /// cancelled.
    pub fn to_data_url(&mut self, options: &DataUrlOptions) -> Result<CaptureReceiver, RenderError> {
        if self.state == RendererState::Destroyed {
            return Err(RenderError::Destroyed);
        }
        let mime = if options.mime.is_empty() {
            CaptureFormat::Png.mime()
        } else {
            options.mime.as_str()
        };
        let format = CaptureFormat::from_mime(mime)
            .ok()
            .filter(CaptureFormat::is_encodable)
            .ok_or_else(|| RenderError::UnsupportedCaptureFormat(mime.to_string()))?;
        let (sender, receiver) = oneshot::channel();
        self.capture = Some(PendingCapture {
            format,
            quality: options.quality,
            sender,
        });
        Ok(receiver)
    }

    /// Draw one frame. Returns [`FrameOutcome::Stopped`] once the renderer is
    /// not running or the surface is gone; the host should then stop
    /// scheduling frames.
    pub fn on_animation_frame(&mut self, document: &Document, now: f64) -> FrameOutcome {
        if self.state != RendererState::Running || self.surface.is_deleted() {
            return FrameOutcome::Stopped;
        }
        self.redraw.set(false);

        let camera = self.camera.decomposed();
        let background = self.options.background.to_f32_array(1.0);
        let canvas = self.surface.canvas();
        canvas.save();
        canvas.translate(camera.translation.x, camera.translation.y);
        canvas.rotate(camera.rotation);
        canvas.scale(camera.scale[0], camera.scale[1]);
        canvas.clear(background);

        draw_animations(&mut self.animations, canvas, now - self.first_frame);
        draw_particles(&mut self.particles, canvas, now);

        let frame = FrameContext {
            resolver: &self.resolver,
            renderers: &self.renderers,
            images: self.images.as_ref(),
        };
        frame.draw_subtree(document, document.root(), canvas);
        canvas.restore();

        if let Some(capture) = self.capture.take() {
            let result = self
                .surface
                .snapshot()
                .and_then(|snapshot| {
                    encode(&snapshot, capture.format, capture.quality).map_err(RenderError::from)
                });
            if let Err(e) = &result {
                log::warn!("Frame capture failed: {e}");
            }
            // The caller may have dropped the receiver.
            let _ = capture.sender.send(result);
        }

        FrameOutcome::Continue
    }

    /// Stop the frame loop and release every backend resource. Idempotent.
    pub fn destroy(&mut self) {
        if self.state == RendererState::Destroyed {
            return;
        }
        self.state = RendererState::Destroyed;
        for entry in &mut self.animations {
            entry.animation.delete();
        }
        self.animations.clear();
        for entry in &mut self.particles {
            entry.particles.delete();
        }
        self.particles.clear();
        self.fonts.clear();
        self.capture = None;
        log::info!("Frame renderer destroyed");
    }
}

impl<S: Surface> Drop for FrameRenderer<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn positive_or_one(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

fn draw_animations(animations: &mut Vec<AnimationEntry>, canvas: &mut dyn Canvas, elapsed: f64) {
    animations.retain(|entry| {
        if entry.animation.is_deleted() {
            log::warn!("Dropping deleted animation '{}'", entry.name);
            return false;
        }
        true
    });
    for entry in animations.iter_mut() {
        let duration = entry.animation.duration();
        let t = if duration > 0.0 {
            (elapsed / duration).rem_euclid(1.0)
        } else {
            0.0
        };
        let damage = entry.animation.seek(t);
        if !damage.is_empty() {
            entry.animation.render(canvas, entry.bounds);
        }
    }
}

fn draw_particles(particles: &mut Vec<ParticlesEntry>, canvas: &mut dyn Canvas, now: f64) {
    particles.retain(|entry| {
        if entry.particles.is_deleted() {
            log::warn!("Dropping deleted particle system");
            return false;
        }
        true
    });
    for entry in particles.iter_mut() {
        canvas.save();
        if let Some(on_frame) = entry.on_frame.as_mut() {
            on_frame(&mut *canvas);
        }
        entry.particles.update(now / 1000.0);
        entry.particles.draw(canvas);
        canvas.restore();
    }
}

/// Borrowed state for one traversal.
struct FrameContext<'a> {
    resolver: &'a StyleResolver,
    renderers: &'a ShapeRendererRegistry,
    images: &'a dyn ImageSource,
}

impl FrameContext<'_> {
    /// Draw `id` and its children. The node's local transform stays in
    /// effect for the children; its anchor offset does not.
    fn draw_subtree(&self, document: &Document, id: NodeId, canvas: &mut dyn Canvas) {
        let Some(object) = document.get(&id) else {
            return;
        };
        let local = object.local_transform();
        canvas.save();
        canvas.translate(local.position.x, local.position.y);
        canvas.skew(local.skew[0], local.skew[1]);
        canvas.rotate(local.rotation);
        canvas.scale(local.scale[0], local.scale[1]);

        let drawable = object.is_visible() && !object.is_culled() && !object.kind().is_container();
        if drawable {
            if let Some(renderer) = self.renderers.get(&object.kind()) {
                let paints = self.resolver.resolve(object, self.images);
                let (ax, ay) = object.anchor_offset();
                canvas.save();
                if ax != 0.0 || ay != 0.0 {
                    canvas.translate(-ax, -ay);
                }
                renderer.render(object, &mut RenderContext::new(&paints, canvas));
                canvas.restore();
            }
            object.clear_paint_dirty();
        }

        for child in document.sorted_children(&id) {
            self.draw_subtree(document, child, canvas);
        }
        canvas.restore();
    }
}
