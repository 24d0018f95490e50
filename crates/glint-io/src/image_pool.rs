use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use glint_core::NodeId;

use crate::data_url::{decode_data_url, is_data_url};
use crate::error::IoError;

/// A decoded image as straight RGBA pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl DecodedImage {
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == (width as usize) * (height as usize) * 4).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IoError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            data: rgba.into_raw(),
        })
    }
}

/// Invoked once when a requested image finishes loading.
pub type ImageReady = Box<dyn FnOnce(Arc<DecodedImage>)>;

/// Synchronous lookup with deferred completion.
///
/// Returns the image when it is already decoded. Otherwise returns `None`
/// and calls `on_ready` later, never from inside this call. While `url` is
/// loading, `waiter` keeps at most one callback queued: asking again every
/// frame does not queue more.
pub trait ImageSource {
    fn get_image_sync(
        &self,
        url: &str,
        waiter: NodeId,
        on_ready: ImageReady,
    ) -> Option<Arc<DecodedImage>>;
}

enum Entry {
    Ready(Arc<DecodedImage>),
    Failed,
}

/// URL-keyed image cache backed by the file system and `data:` URLs.
///
/// Loads are queued by [`ImageSource::get_image_sync`] and performed by
/// [`ImagePool::process_pending`], which the host calls between frames.
#[derive(Default)]
pub struct ImagePool {
    root: Option<PathBuf>,
    cache: RefCell<HashMap<String, Entry>>,
    pending: RefCell<HashMap<String, Vec<(NodeId, ImageReady)>>>,
}

impl fmt::Debug for ImagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePool")
            .field("root", &self.root)
            .field("cached", &self.cache.borrow().len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl ImagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Make `image` available under `url` without loading anything.
    pub fn insert(&self, url: &str, image: DecodedImage) -> Arc<DecodedImage> {
        let image = Arc::new(image);
        self.cache
            .borrow_mut()
            .insert(url.to_string(), Entry::Ready(Arc::clone(&image)));
        image
    }

    /// Callbacks waiting for a load, over all URLs.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().values().map(Vec::len).sum()
    }

    /// Load every queued image and run its callback. Returns the number of
    /// callbacks run. Failed loads are logged and their callbacks dropped.
    pub fn process_pending(&self) -> usize {
        let queued: Vec<(String, Vec<(NodeId, ImageReady)>)> =
            self.pending.borrow_mut().drain().collect();
        let mut ran = 0;
        for (url, waiters) in queued {
            let image = match self.cached(&url) {
                Some(Entry::Ready(image)) => image,
                Some(Entry::Failed) => continue,
                None => match self.load(&url) {
                    Ok(image) => self.insert(&url, image),
                    Err(e) => {
                        log::warn!("Failed to load image '{url}': {e}");
                        self.cache.borrow_mut().insert(url, Entry::Failed);
                        continue;
                    }
                },
            };
            for (_, on_ready) in waiters {
                on_ready(Arc::clone(&image));
                ran += 1;
            }
        }
        ran
    }

    fn cached(&self, url: &str) -> Option<Entry> {
        self.cache.borrow().get(url).map(|entry| match entry {
            Entry::Ready(image) => Entry::Ready(Arc::clone(image)),
            Entry::Failed => Entry::Failed,
        })
    }

    fn load(&self, url: &str) -> Result<DecodedImage, IoError> {
        if is_data_url(url) {
            let (_, bytes) = decode_data_url(url)?;
            return DecodedImage::from_bytes(&bytes);
        }
        let path = match &self.root {
            Some(root) => root.join(url),
            None => PathBuf::from(url),
        };
        log::info!("Loading image {}", path.display());
        let bytes = std::fs::read(&path)?;
        DecodedImage::from_bytes(&bytes)
    }
}

impl ImageSource for ImagePool {
    fn get_image_sync(
        &self,
        url: &str,
        waiter: NodeId,
        on_ready: ImageReady,
    ) -> Option<Arc<DecodedImage>> {
        match self.cached(url) {
            Some(Entry::Ready(image)) => Some(image),
            Some(Entry::Failed) => None,
            None => {
                let mut pending = self.pending.borrow_mut();
                let waiters = pending.entry(url.to_string()).or_default();
                if !waiters.iter().any(|(id, _)| *id == waiter) {
                    waiters.push((waiter, on_ready));
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_url::encode_data_url;
    use crate::encode::{encode, CaptureFormat, RgbaSnapshot};
    use glint_core::DisplayObject;
    use std::cell::Cell;
    use std::rc::Rc;

    fn waiter() -> NodeId {
        DisplayObject::group("waiter").id
    }

    fn png_data_url() -> String {
        let snapshot = RgbaSnapshot {
            width: 2,
            height: 2,
            data: [0, 0, 255, 255].repeat(4),
        };
        let png = encode(&snapshot, CaptureFormat::Png, None).unwrap();
        encode_data_url("image/png", &png.bytes)
    }

    #[test]
    fn test_deferred_load_runs_callback_once() {
        let pool = ImagePool::new();
        let url = png_data_url();
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let first = pool.get_image_sync(
            &url,
            waiter(),
            Box::new(move |_| counter.set(counter.get() + 1)),
        );
        assert!(first.is_none());
        assert_eq!(calls.get(), 0);
        assert_eq!(pool.pending_count(), 1);

        assert_eq!(pool.process_pending(), 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(pool.process_pending(), 0);
        assert_eq!(calls.get(), 1);

        let image = pool
            .get_image_sync(&url, waiter(), Box::new(|_| panic!("already loaded")))
            .unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(&image.data[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_failed_load_is_remembered() {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = ImagePool::with_root("/nonexistent-glint-root");
        let id = waiter();
        assert!(pool.get_image_sync("missing.png", id, Box::new(|_| panic!("never loads"))).is_none());
        assert_eq!(pool.process_pending(), 0);
        assert!(pool.get_image_sync("missing.png", id, Box::new(|_| panic!("never loads"))).is_none());
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn test_insert_and_validate_rgba() {
        let pool = ImagePool::new();
        assert!(DecodedImage::from_rgba(2, 2, vec![0; 3]).is_none());
        let image = DecodedImage::from_rgba(1, 1, vec![1, 2, 3, 4]).unwrap();
        pool.insert("tile", image);
        assert!(pool.get_image_sync("tile", waiter(), Box::new(|_| {})).is_some());
    }

    #[test]
    fn test_repeated_requests_queue_one_callback_per_waiter() {
        let pool = ImagePool::new();
        let url = png_data_url();
        let (a, b) = (waiter(), waiter());
        let calls = Rc::new(Cell::new(0));
        for _ in 0..1000 {
            for id in [a, b] {
                let counter = Rc::clone(&calls);
                let image = pool.get_image_sync(
                    &url,
                    id,
                    Box::new(move |_| counter.set(counter.get() + 1)),
                );
                assert!(image.is_none());
            }
        }
        assert_eq!(pool.pending_count(), 2);
        assert!(pool.get_image_sync("other.png", a, Box::new(|_| {})).is_none());
        assert_eq!(pool.pending_count(), 3);

        pool.process_pending();
        assert_eq!(calls.get(), 2);
        assert_eq!(pool.pending_count(), 0);
    }
}
