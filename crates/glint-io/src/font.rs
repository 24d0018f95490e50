use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::IoError;

/// Registry of font files by family name.
///
/// The renderer loads the configured faces on start and clears them on
/// destroy; shaping and rasterisation happen elsewhere.
#[derive(Debug, Default)]
pub struct FontLoader {
    fonts: HashMap<String, Arc<Vec<u8>>>,
}

impl FontLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_font(&mut self, family: &str, path: impl AsRef<Path>) -> Result<(), IoError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        log::info!("Loaded font '{family}' from {} ({} bytes)", path.display(), bytes.len());
        self.load_font_bytes(family, bytes);
        Ok(())
    }

    pub fn load_font_bytes(&mut self, family: &str, bytes: Vec<u8>) {
        self.fonts.insert(family.to_string(), Arc::new(bytes));
    }

    pub fn get(&self, family: &str) -> Option<Arc<Vec<u8>>> {
        self.fonts.get(family).cloned()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.fonts.is_empty() {
            log::debug!("Releasing {} font(s)", self.fonts.len());
        }
        self.fonts.clear();
    }
}
