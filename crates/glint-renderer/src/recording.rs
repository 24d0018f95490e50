//! A display-list backend.
//!
//! [`RecordingCanvas`] keeps every call as a [`DrawCommand`] together with
//! the transform in effect, so a host (or a test) can replay or inspect a
//! frame without rasterising it.

use std::cell::Cell;
use std::rc::Rc;

use glam::{DMat4, DVec3};
use kurbo::{BezPath, Rect};

use glint_core::transform::skew_matrix;
use glint_io::{DecodedImage, RgbaSnapshot};

use crate::backend::{Canvas, Surface};
use crate::error::RenderError;
use crate::paint::Paint;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Translate { dx: f64, dy: f64 },
    Rotate { degrees: f64 },
    Scale { sx: f64, sy: f64 },
    Skew { kx: f64, ky: f64 },
    Clear { color: [f32; 4] },
    DrawPath {
        path: BezPath,
        paint: Paint,
        /// Current transform at the time of the call.
        transform: DMat4,
    },
    DrawImage {
        width: u32,
        height: u32,
        dst: Rect,
        opacity: f32,
        transform: DMat4,
    },
}

#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    transform: DMat4,
    stack: Vec<DMat4>,
}

impl Default for RecordingCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            transform: DMat4::IDENTITY,
            stack: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drain the recorded commands, keeping the transform state.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn transform(&self) -> DMat4 {
        self.transform
    }

    /// Number of unmatched saves.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn concat(&mut self, matrix: DMat4) {
        self.transform *= matrix;
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.stack.push(self.transform);
        self.commands.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
            self.commands.push(DrawCommand::Restore);
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.concat(DMat4::from_translation(DVec3::new(dx, dy, 0.0)));
        self.commands.push(DrawCommand::Translate { dx, dy });
    }

    fn rotate(&mut self, degrees: f64) {
        self.concat(DMat4::from_rotation_z(degrees.to_radians()));
        self.commands.push(DrawCommand::Rotate { degrees });
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.concat(DMat4::from_scale(DVec3::new(sx, sy, 1.0)));
        self.commands.push(DrawCommand::Scale { sx, sy });
    }

    fn skew(&mut self, kx: f64, ky: f64) {
        self.concat(skew_matrix(kx, ky));
        self.commands.push(DrawCommand::Skew { kx, ky });
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(DrawCommand::Clear { color });
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.commands.push(DrawCommand::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
            transform: self.transform,
        });
    }

    fn draw_image(&mut self, image: &DecodedImage, dst: Rect, opacity: f32) {
        self.commands.push(DrawCommand::DrawImage {
            width: image.width,
            height: image.height,
            dst,
            opacity,
            transform: self.transform,
        });
    }
}

/// A surface backed by a [`RecordingCanvas`]. Snapshots are blank.
#[derive(Debug)]
pub struct RecordingSurface {
    canvas: RecordingCanvas,
    width: u32,
    height: u32,
    deleted: Rc<Cell<bool>>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RecordingCanvas::new(),
            width,
            height,
            deleted: Rc::new(Cell::new(false)),
        }
    }

    pub fn recording(&self) -> &RecordingCanvas {
        &self.canvas
    }

    pub fn recording_mut(&mut self) -> &mut RecordingCanvas {
        &mut self.canvas
    }

    /// Handle that marks the surface deleted, as a host tearing down the
    /// backing context would.
    pub fn deleted_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.deleted)
    }
}

impl Surface for RecordingSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_deleted(&self) -> bool {
        self.deleted.get()
    }

    fn snapshot(&mut self) -> Result<RgbaSnapshot, RenderError> {
        Ok(RgbaSnapshot {
            width: self.width,
            height: self.height,
            data: vec![0; self.width as usize * self.height as usize * 4],
        })
    }
}
