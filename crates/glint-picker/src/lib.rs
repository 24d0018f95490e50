//! # Glint Picker
//!
//! Maps a pointer position to the display objects under it. Candidates come
//! from the document's spatial index, are ordered front-to-back by render
//! order and confirmed with each shape's precise test and the active clip
//! path.

pub mod picker;

pub use picker::{PickRequest, PickResponse, Picker};
