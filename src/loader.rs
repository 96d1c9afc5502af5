use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, ViewerError};
use crate::layout::{ContentLayout, SlotKind, SlotVisual};
use crate::viewport::{self, ViewportState, LOAD_QUOTA};

// ---------------------------------------------------------------------------
// Decoded image data, already scaled to its display size
// ---------------------------------------------------------------------------

pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub native_width: u32,
    pub native_height: u32,
    pub file_size: u64,
    pub format_name: String,
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("size", &(self.width, self.height))
            .field("native", &(self.native_width, self.native_height))
            .field("format", &self.format_name)
            .finish_non_exhaustive()
    }
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }
}

/// Turns raw file bytes into pixels.
pub trait Decoder {
    fn decode(&self, bytes: &[u8]) -> ImageResult<DynamicImage>;
}

pub struct ImageCrateDecoder;

impl Decoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> ImageResult<DynamicImage> {
        image::load_from_memory(bytes)
    }
}

/// Full display width times `scale`, height following the native aspect ratio.
pub fn target_size(native_w: u32, native_h: u32, display_width: u32, scale: f32) -> (u32, u32) {
    let w = ((display_width as f32 * scale).round() as u32).max(1);
    if native_w == 0 {
        return (w, 1);
    }
    let h = (native_h as f64 * w as f64 / native_w as f64).round() as u32;
    (w, h.max(1))
}

pub fn materialize(
    decoder: &dyn Decoder,
    path: &Path,
    display_width: u32,
    scale: f32,
) -> Result<DecodedImage> {
    let bytes = fs::read(path).map_err(|source| ViewerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let img = decoder.decode(&bytes).map_err(|source| ViewerError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let (native_w, native_h) = img.dimensions();
    if native_w == 0 || native_h == 0 {
        return Err(ViewerError::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    let (w, h) = target_size(native_w, native_h, display_width, scale);
    let scaled = if (w, h) == (native_w, native_h) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Lanczos3)
    };

    let format_name = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_uppercase();

    Ok(DecodedImage {
        rgba_bytes: scaled.to_rgba8().into_raw(),
        width: w,
        height: h,
        native_width: native_w,
        native_height: native_h,
        file_size: bytes.len() as u64,
        format_name,
    })
}

// ---------------------------------------------------------------------------
// Image cache
// ---------------------------------------------------------------------------

/// Slot index -> materialized image. Unbounded unless a byte budget is set;
/// with a budget, least recently visible entries outside the protected range
/// are dropped first.
pub struct ImageCache {
    images: HashMap<usize, Arc<DecodedImage>>,
    last_seen: HashMap<usize, u64>,
    clock: u64,
    used_bytes: u64,
    budget: Option<u64>,
}

impl ImageCache {
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            images: HashMap::new(),
            last_seen: HashMap::new(),
            clock: 0,
            used_bytes: 0,
            budget,
        }
    }

    pub fn get(&self, idx: usize) -> Option<Arc<DecodedImage>> {
        self.images.get(&idx).cloned()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.images.contains_key(&idx)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    pub fn indices(&self) -> Vec<usize> {
        let mut keys: Vec<usize> = self.images.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Insert or replace.
    pub fn insert(&mut self, idx: usize, decoded: DecodedImage) -> Arc<DecodedImage> {
        let img = Arc::new(decoded);
        if let Some(old) = self.images.insert(idx, Arc::clone(&img)) {
            self.used_bytes -= old.mem_size();
        }
        self.used_bytes += img.mem_size();
        self.clock += 1;
        self.last_seen.insert(idx, self.clock);
        img
    }

    pub fn remove(&mut self, idx: usize) -> Option<Arc<DecodedImage>> {
        let old = self.images.remove(&idx)?;
        self.used_bytes -= old.mem_size();
        self.last_seen.remove(&idx);
        Some(old)
    }

    pub fn touch(&mut self, indices: &[usize]) {
        self.clock += 1;
        for idx in indices {
            if self.images.contains_key(idx) {
                self.last_seen.insert(*idx, self.clock);
            }
        }
    }

    pub fn over_budget(&self) -> bool {
        self.budget.is_some_and(|b| self.used_bytes > b)
    }

    /// Drop entries until the budget holds or only protected entries remain.
    pub fn evict_over_budget(&mut self, protected: &HashSet<usize>) -> Vec<usize> {
        let mut evicted = Vec::new();
        while self.over_budget() {
            let oldest = self
                .images
                .keys()
                .filter(|idx| !protected.contains(*idx))
                .min_by_key(|idx| (self.last_seen.get(*idx).copied().unwrap_or(0), **idx))
                .copied();
            match oldest {
                Some(idx) => {
                    self.remove(idx);
                    evicted.push(idx);
                }
                None => break,
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.images.clear();
        self.last_seen.clear();
        self.used_bytes = 0;
    }
}

// ---------------------------------------------------------------------------
// Lazy loader
// ---------------------------------------------------------------------------

/// Outcome of one viewport pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadPass {
    pub visible: Vec<usize>,
    pub loaded: Vec<usize>,
    pub failed: Vec<usize>,
    pub evicted: Vec<usize>,
}

pub struct LazyLoader {
    decoder: Box<dyn Decoder>,
}

impl LazyLoader {
    pub fn new(decoder: Box<dyn Decoder>) -> Self {
        Self { decoder }
    }

    /// Return the cached image for `idx`, decoding it at the layout's current
    /// size if needed. A failure leaves the slot empty and retryable.
    pub fn ensure_loaded(
        &self,
        layout: &mut ContentLayout,
        cache: &mut ImageCache,
        idx: usize,
    ) -> Result<Arc<DecodedImage>> {
        if let Some(img) = cache.get(idx) {
            return Ok(img);
        }
        self.materialize_slot(layout, cache, idx)
    }

    fn materialize_slot(
        &self,
        layout: &mut ContentLayout,
        cache: &mut ImageCache,
        idx: usize,
    ) -> Result<Arc<DecodedImage>> {
        let path = match layout.slot(idx) {
            Some(slot) if slot.kind == SlotKind::Image => slot.source.clone(),
            _ => return Err(ViewerError::NoSuchSlot { index: idx }),
        };
        let metrics = layout.metrics();

        match materialize(&*self.decoder, &path, metrics.display_width, metrics.scale) {
            Ok(decoded) => {
                let img = cache.insert(idx, decoded);
                layout.set_visual(idx, SlotVisual::Image(Arc::clone(&img)));
                Ok(img)
            }
            Err(e) => {
                layout.set_error(idx, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Materialize up to `LOAD_QUOTA` uncached slots in or near the viewport.
    pub fn load_pass(
        &self,
        layout: &mut ContentLayout,
        cache: &mut ImageCache,
        vp: &ViewportState,
    ) -> LoadPass {
        let (top, bottom, buffer) = (vp.top(), vp.bottom(), vp.buffer());
        let scan = viewport::scan(layout.flush(), top, bottom, buffer, LOAD_QUOTA, |i| {
            cache.contains(i)
        });

        let mut pass = LoadPass {
            visible: scan.visible,
            ..LoadPass::default()
        };
        for idx in scan.to_load {
            match self.ensure_loaded(layout, cache, idx) {
                Ok(_) => pass.loaded.push(idx),
                Err(e) if e.is_decode_error() => {
                    log::warn!("{}", e);
                    pass.failed.push(idx);
                }
                Err(e) => {
                    log::error!("{}", e);
                    pass.failed.push(idx);
                }
            }
        }
        cache.touch(&pass.visible);

        if cache.over_budget() {
            let protected: HashSet<usize> =
                viewport::visible_range(layout.flush(), top, bottom, buffer)
                    .into_iter()
                    .collect();
            pass.evicted = cache.evict_over_budget(&protected);
            for idx in &pass.evicted {
                layout.set_visual(*idx, SlotVisual::Empty);
            }
            if !pass.evicted.is_empty() {
                log::debug!(
                    "[cache] evicted {:?}, {} bytes in use",
                    pass.evicted,
                    cache.used_bytes()
                );
            }
        }

        log::debug!(
            "[load] visible={} loaded={:?} failed={:?}",
            pass.visible.len(),
            pass.loaded,
            pass.failed
        );
        pass
    }

    /// Re-decode every cached slot at the layout's current size, replacing the
    /// old entries. Slots that fail are dropped back to the lazy path.
    pub fn rematerialize_cached(
        &self,
        layout: &mut ContentLayout,
        cache: &mut ImageCache,
    ) -> usize {
        let mut refreshed = 0;
        for idx in cache.indices() {
            cache.remove(idx);
            match self.materialize_slot(layout, cache, idx) {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    log::warn!("{}", e);
                    layout.set_visual(idx, SlotVisual::Empty);
                }
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutMetrics;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn blank(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            rgba_bytes: vec![0; (width * height * 4) as usize],
            width,
            height,
            native_width: width,
            native_height: height,
            file_size: 0,
            format_name: "PNG".to_string(),
        }
    }

    fn metrics(display_width: u32, scale: f32) -> LayoutMetrics {
        LayoutMetrics {
            display_width,
            scale,
        }
    }

    #[test]
    fn test_target_size_keeps_aspect_ratio() {
        assert_eq!(target_size(100, 50, 200, 1.0), (200, 100));
        assert_eq!(target_size(100, 50, 200, 1.5), (300, 150));
        assert_eq!(target_size(1000, 1, 10, 1.0), (10, 1));
        assert_eq!(target_size(0, 50, 10, 1.0), (10, 1));
    }

    #[test]
    fn test_materialize_scales_to_display_width() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "a.png", 40, 20);
        let img = materialize(&ImageCrateDecoder, &path, 80, 0.5).unwrap();
        assert_eq!((img.width, img.height), (40, 20));
        assert_eq!((img.native_width, img.native_height), (40, 20));
        assert_eq!(img.rgba_bytes.len(), 40 * 20 * 4);
        assert_eq!(img.format_name, "PNG");

        let img = materialize(&ImageCrateDecoder, &path, 80, 1.0).unwrap();
        assert_eq!((img.width, img.height), (80, 40));
    }

    #[test]
    fn test_materialize_reports_read_and_decode_errors() {
        let dir = TempDir::new().unwrap();
        let missing = materialize(&ImageCrateDecoder, &dir.path().join("nope.png"), 80, 1.0);
        assert!(matches!(missing, Err(ViewerError::Read { .. })));

        let bad = dir.path().join("bad.png");
        fs::write(&bad, b"definitely not a png").unwrap();
        let err = materialize(&ImageCrateDecoder, &bad, 80, 1.0).unwrap_err();
        assert!(matches!(err, ViewerError::Decode { .. }));
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_decoded_image_debug_omits_pixels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wide.png");
        image::RgbaImage::new(40, 20).save(&path).unwrap();
        let img = materialize(&ImageCrateDecoder, &path, 10, 1.0).unwrap();
        let shown = format!("{img:?}");
        assert!(shown.contains("(10, 5)"));
        assert!(shown.contains("(40, 20)"));
        assert!(!shown.contains("rgba_bytes"));
    }

    #[test]
    fn test_cache_replace_keeps_byte_count() {
        let mut cache = ImageCache::new(None);
        cache.insert(3, blank(10, 10));
        cache.insert(3, blank(20, 10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 20 * 10 * 4);
        assert_eq!(cache.get(3).unwrap().width, 20);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_unbounded_cache_never_evicts() {
        let mut cache = ImageCache::new(None);
        for i in 0..50 {
            cache.insert(i, blank(100, 100));
        }
        assert!(!cache.over_budget());
        assert!(cache.evict_over_budget(&HashSet::new()).is_empty());
        assert_eq!(cache.len(), 50);
    }

    #[test]
    fn test_eviction_is_lru_and_spares_protected() {
        let mut cache = ImageCache::new(Some(3 * 400));
        for i in 0..4 {
            cache.insert(i, blank(10, 10));
        }
        cache.touch(&[0]);
        let protected: HashSet<usize> = [1].into_iter().collect();
        let evicted = cache.evict_over_budget(&protected);
        assert_eq!(evicted, vec![2]);
        assert_eq!(cache.indices(), vec![0, 1, 3]);
    }

    #[test]
    fn test_eviction_stops_when_everything_is_protected() {
        let mut cache = ImageCache::new(Some(100));
        cache.insert(0, blank(10, 10));
        cache.insert(1, blank(10, 10));
        let protected: HashSet<usize> = [0, 1].into_iter().collect();
        assert!(cache.evict_over_budget(&protected).is_empty());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ensure_loaded_caches_and_swaps_visual() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "a.png", 10, 30);
        let mut layout = ContentLayout::for_images(vec![path], metrics(20, 1.0));
        let mut cache = ImageCache::new(None);
        let loader = LazyLoader::new(Box::new(ImageCrateDecoder));

        let first = loader.ensure_loaded(&mut layout, &mut cache, 0).unwrap();
        assert_eq!((first.width, first.height), (20, 60));
        assert!(layout.slot(0).unwrap().image().is_some());
        assert_eq!(layout.flush().get(0).unwrap().height(), 60.0);

        let second = loader.ensure_loaded(&mut layout, &mut cache, 0).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(
            loader.ensure_loaded(&mut layout, &mut cache, 5),
            Err(ViewerError::NoSuchSlot { index: 5 })
        ));
    }

    #[test]
    fn test_load_pass_is_throttled() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| write_png(dir.path(), &format!("{i}.png"), 4, 4))
            .collect();
        let mut layout = ContentLayout::for_images(paths, metrics(4, 1.0));
        let mut cache = ImageCache::new(None);
        let loader = LazyLoader::new(Box::new(ImageCrateDecoder));
        let mut viewport = ViewportState::new(1000.0);
        viewport.set_content_height(layout.flush().content_height());

        let pass = loader.load_pass(&mut layout, &mut cache, &viewport);
        assert_eq!(pass.loaded, vec![0, 1, 2]);
        assert_eq!(cache.len(), 3);

        let pass = loader.load_pass(&mut layout, &mut cache, &viewport);
        assert_eq!(pass.loaded, vec![3, 4, 5]);
        assert_eq!(cache.len(), 6);

        let pass = loader.load_pass(&mut layout, &mut cache, &viewport);
        assert!(pass.loaded.is_empty());
        assert_eq!(pass.visible.len(), 6);
    }

    #[test]
    fn test_failed_slot_stays_empty_and_is_retried() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("0.png");
        fs::write(&bad, b"garbage").unwrap();
        let good = write_png(dir.path(), "1.png", 4, 4);
        let mut layout = ContentLayout::for_images(vec![bad.clone(), good], metrics(4, 1.0));
        let mut cache = ImageCache::new(None);
        let loader = LazyLoader::new(Box::new(ImageCrateDecoder));
        let viewport = ViewportState::new(500.0);

        let pass = loader.load_pass(&mut layout, &mut cache, &viewport);
        assert_eq!(pass.failed, vec![0]);
        assert_eq!(pass.loaded, vec![1]);
        assert!(!cache.contains(0));
        assert!(layout.slot(0).unwrap().last_error.is_some());

        write_png(dir.path(), "0.png", 4, 4);
        let pass = loader.load_pass(&mut layout, &mut cache, &viewport);
        assert_eq!(pass.loaded, vec![0]);
        assert!(layout.slot(0).unwrap().last_error.is_none());
    }

    #[test]
    fn test_rematerialize_replaces_only_cached_slots() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| write_png(dir.path(), &format!("{i}.png"), 10, 10))
            .collect();
        let mut layout = ContentLayout::for_images(paths, metrics(10, 1.0));
        let mut cache = ImageCache::new(None);
        let loader = LazyLoader::new(Box::new(ImageCrateDecoder));
        loader.ensure_loaded(&mut layout, &mut cache, 0).unwrap();
        loader.ensure_loaded(&mut layout, &mut cache, 2).unwrap();

        layout.set_metrics(metrics(10, 2.0));
        assert_eq!(loader.rematerialize_cached(&mut layout, &mut cache), 2);
        assert_eq!(cache.indices(), vec![0, 2]);
        assert_eq!(cache.get(0).unwrap().width, 20);
        assert_eq!(cache.get(2).unwrap().height, 20);
        assert!(layout.slot(1).unwrap().image().is_none());
    }
}
