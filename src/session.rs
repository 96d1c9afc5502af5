use std::mem;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::files::{classify, list_folder, FolderView};
use crate::layout::{ContentLayout, LayoutMetrics, SlotKind};
use crate::loader::{ImageCache, LazyLoader, LoadPass};
use crate::scheduler::{Scheduler, Task, TaskId};
use crate::viewport::{visible_range, ViewportState};
use crate::zoom::ZoomState;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Delay between a scroll input and the lazy-load pass it triggers.
    pub scroll_debounce: Duration,
    /// Delay before the scroll fraction is re-applied after a reflow.
    pub settle_delay: Duration,
    /// Pixels per wheel line.
    pub line_step: f32,
    /// Optional byte budget for decoded images.
    pub cache_budget: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scroll_debounce: Duration::from_millis(50),
            settle_delay: Duration::from_millis(100),
            line_step: 60.0,
            cache_budget: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer session
// ---------------------------------------------------------------------------

/// All mutable viewer state: where we are, how we got here, what is laid out,
/// what is decoded, how far we scrolled and what is scheduled next.
pub struct ViewerSession {
    pub(crate) current_path: PathBuf,
    pub(crate) history: Vec<PathBuf>,
    pub(crate) image_mode: bool,
    pub(crate) layout: ContentLayout,
    pub(crate) cache: ImageCache,
    pub(crate) loader: LazyLoader,
    pub(crate) zoom: ZoomState,
    pub(crate) viewport: ViewportState,
    pub(crate) scheduler: Scheduler,
    pub(crate) config: SessionConfig,
    pub(crate) display_width: u32,
    /// Pending post-reflow anchor restore, cancelled by explicit scrolling.
    pub(crate) pending_anchor: Option<TaskId>,
    listing_error: Option<String>,
}

impl ViewerSession {
    pub fn new(
        start: PathBuf,
        loader: LazyLoader,
        config: SessionConfig,
        display_width: u32,
        surface_height: f32,
    ) -> Self {
        let zoom = ZoomState::default();
        let metrics = LayoutMetrics {
            display_width,
            scale: zoom.scale(),
        };
        let mut session = Self {
            current_path: start,
            history: Vec::new(),
            image_mode: false,
            layout: ContentLayout::empty(metrics),
            cache: ImageCache::new(config.cache_budget),
            loader,
            zoom,
            viewport: ViewportState::new(surface_height),
            scheduler: Scheduler::new(),
            config,
            display_width,
            pending_anchor: None,
            listing_error: None,
        };
        session.load_content();
        session
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn is_image_mode(&self) -> bool {
        self.image_mode
    }

    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    pub fn layout(&self) -> &ContentLayout {
        &self.layout
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn listing_error(&self) -> Option<&str> {
        self.listing_error.as_deref()
    }

    /// Folder name in image mode, nothing in folder mode.
    pub fn title(&self) -> String {
        if !self.image_mode {
            return String::new();
        }
        self.current_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.current_path.display().to_string())
    }

    pub fn metrics(&self) -> LayoutMetrics {
        LayoutMetrics {
            display_width: self.display_width,
            scale: self.zoom.scale(),
        }
    }

    // -----------------------------------------------------------------------
    // Folder loading and navigation
    // -----------------------------------------------------------------------

    /// Tear down the current view, list and classify the current folder, and
    /// lay it out from the top.
    pub fn load_content(&mut self) {
        self.teardown();
        self.viewport.reset();
        self.listing_error = None;

        let view = match list_folder(&self.current_path) {
            Ok(entries) => classify(entries),
            Err(e) => {
                log::warn!("{}", e);
                self.listing_error = Some(e.to_string());
                FolderView::Folders(Vec::new())
            }
        };

        self.image_mode = view.is_images();
        log::info!(
            "Loaded {:?}: {} {}",
            self.current_path,
            view.len(),
            if self.image_mode { "images" } else { "folders" }
        );

        let metrics = self.metrics();
        self.layout = match view {
            FolderView::Images(paths) => ContentLayout::for_images(paths, metrics),
            FolderView::Folders(entries) => ContentLayout::for_folders(entries, metrics),
        };
        self.sync_viewport();
        self.lazy_load_pass();
    }

    pub fn navigate_to(&mut self, path: PathBuf) {
        log::info!("[nav] {:?} -> {:?}", self.current_path, path);
        let previous = mem::replace(&mut self.current_path, path);
        self.history.push(previous);
        self.load_content();
    }

    /// Returns false (and changes nothing) when there is no history.
    pub fn navigate_back(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                log::info!("[nav] back to {:?}", previous);
                self.current_path = previous;
                self.load_content();
                true
            }
            None => false,
        }
    }

    /// Follow a folder row. Image rows are not navigable.
    pub fn open_slot(&mut self, idx: usize) -> bool {
        let target = match self.layout.slot(idx) {
            Some(slot) if slot.kind == SlotKind::Folder => slot.source.clone(),
            _ => return false,
        };
        self.navigate_to(target);
        true
    }

    /// Release every decoded image and forget pending work.
    pub fn teardown(&mut self) {
        self.cache.clear();
        self.scheduler.cancel_all();
        self.pending_anchor = None;
        self.layout = ContentLayout::empty(self.metrics());
        self.viewport.set_content_height(0.0);
    }

    // -----------------------------------------------------------------------
    // Viewport
    // -----------------------------------------------------------------------

    /// Settle the layout and hand the new content height to the viewport.
    pub(crate) fn sync_viewport(&mut self) {
        let height = self.layout.flush().content_height();
        self.viewport.set_content_height(height);
    }

    /// One viewport + lazy-load pass. Folder rows have nothing to decode, so
    /// in folder mode this only reports what is in range.
    pub fn lazy_load_pass(&mut self) -> LoadPass {
        if !self.image_mode {
            let visible = visible_range(
                self.layout.flush(),
                self.viewport.top(),
                self.viewport.bottom(),
                self.viewport.buffer(),
            );
            return LoadPass {
                visible,
                ..LoadPass::default()
            };
        }

        let pass = self
            .loader
            .load_pass(&mut self.layout, &mut self.cache, &self.viewport);
        self.sync_viewport();
        pass
    }

    pub fn set_surface_height(&mut self, height: f32) {
        self.viewport.set_surface_height(height);
        self.sync_viewport();
        self.lazy_load_pass();
    }

    /// Slot under a point given in surface coordinates.
    pub fn slot_at(&mut self, surface_y: f32) -> Option<usize> {
        let y = surface_y + self.viewport.scroll_offset();
        self.layout.flush().slot_at(y)
    }

    // -----------------------------------------------------------------------
    // Deferred work
    // -----------------------------------------------------------------------

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Run everything that is due. Returns true if anything ran.
    pub fn run_due(&mut self, now: Instant) -> bool {
        let due = self.scheduler.take_due(now);
        let ran = !due.is_empty();
        for task in due {
            log::debug!("[sched] {:?}", task);
            match task {
                Task::LazyLoad => {
                    self.lazy_load_pass();
                }
                Task::RestoreAnchor { fraction } => {
                    self.pending_anchor = None;
                    self.lazy_load_pass();
                    self.viewport.set_fraction(fraction);
                    self.scheduler
                        .schedule_once(Task::LazyLoad, self.config.scroll_debounce, now);
                }
            }
        }
        ran
    }

    /// Teardown before exit.
    pub fn quit(&mut self) {
        log::info!(
            "Exiting, releasing {} cached images ({} bytes)",
            self.cache.len(),
            self.cache.used_bytes()
        );
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_at, write_png};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_two_images_load_as_they_scroll_into_range() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "img1.png", 100, 100);
        write_png(dir.path(), "img2.png", 100, 100);

        let mut session = session_at(dir.path(), 100, 20.0);
        assert!(session.is_image_mode());
        assert_eq!(session.title(), dir.path().file_name().unwrap().to_string_lossy());
        assert_eq!(session.cache().indices(), vec![0]);

        let now = Instant::now();
        assert!(session.scroll_lines(2.0, now));
        assert_eq!(session.cache().len(), 1);
        assert!(session.run_due(now + Duration::from_millis(50)));
        assert_eq!(session.cache().indices(), vec![0, 1]);
    }

    #[test]
    fn test_subfolders_make_navigation_view() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Y")).unwrap();
        fs::create_dir(dir.path().join("X")).unwrap();

        let session = session_at(dir.path(), 100, 500.0);
        assert!(!session.is_image_mode());
        assert!(session.cache().is_empty());
        assert_eq!(session.title(), "");
        let labels: Vec<&str> = session
            .layout()
            .slots()
            .iter()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, vec!["X", "Y"]);
    }

    #[test]
    fn test_navigation_tears_down_cache_and_index() {
        let dir = TempDir::new().unwrap();
        let comic = dir.path().join("comic");
        fs::create_dir(&comic).unwrap();
        for i in 0..5 {
            write_png(&comic, &format!("{i}.png"), 10, 10);
        }
        fs::create_dir(dir.path().join("empty")).unwrap();

        let mut session = session_at(dir.path(), 10, 500.0);
        assert_eq!(session.layout().len(), 2);

        assert!(session.open_slot(0));
        assert_eq!(session.current_path(), comic.as_path());
        assert_eq!(session.history_depth(), 1);
        assert_eq!(session.layout().len(), 5);
        assert_eq!(session.cache().len(), 3);

        assert!(session.navigate_back());
        assert!(session.cache().is_empty());
        assert_eq!(session.layout().len(), 2);
        assert_eq!(session.viewport().scroll_offset(), 0.0);

        assert!(!session.navigate_back());
        assert_eq!(session.current_path(), dir.path());
    }

    #[test]
    fn test_image_rows_are_not_navigable() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "a.png", 10, 10);
        let mut session = session_at(dir.path(), 10, 100.0);
        assert!(!session.open_slot(0));
        assert!(!session.open_slot(9));
        assert_eq!(session.history_depth(), 0);
    }

    #[test]
    fn test_unreadable_folder_is_empty_view() {
        let dir = TempDir::new().unwrap();
        let session = session_at(&dir.path().join("gone"), 100, 100.0);
        assert!(!session.is_image_mode());
        assert!(session.layout().is_empty());
        assert!(session.listing_error().is_some());
        assert_eq!(session.viewport().content_height(), 0.0);
    }

    #[test]
    fn test_broken_image_keeps_placeholder_bounds() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"broken").unwrap();
        write_png(dir.path(), "b.png", 10, 10);

        let mut session = session_at(dir.path(), 10, 500.0);
        assert_eq!(session.cache().indices(), vec![1]);
        let slot = session.layout().slot(0).unwrap();
        assert!(slot.image().is_none());
        assert!(slot.last_error.is_some());

        let pass = session.lazy_load_pass();
        assert_eq!(pass.failed, vec![0]);
        assert_eq!(session.slot_at(crate::layout::CONTENT_PADDING), Some(0));
    }

    #[test]
    fn test_cache_never_shrinks_while_scrolling() {
        let dir = TempDir::new().unwrap();
        for i in 0..12 {
            write_png(dir.path(), &format!("{i:02}.png"), 20, 20);
        }
        let mut session = session_at(dir.path(), 20, 30.0);
        let mut now = Instant::now();
        let mut last = session.cache().len();
        for _ in 0..40 {
            session.scroll_lines(0.5, now);
            now += Duration::from_millis(60);
            session.run_due(now);
            assert!(session.cache().len() >= last);
            last = session.cache().len();
        }
        assert_eq!(last, 12);
    }

    #[test]
    fn test_resize_reruns_viewport() {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            write_png(dir.path(), &format!("{i}.png"), 10, 10);
        }
        let mut session = session_at(dir.path(), 10, 0.0);
        assert!(session.cache().is_empty());
        session.set_surface_height(1000.0);
        assert_eq!(session.cache().indices(), vec![0, 1, 2]);
        assert_eq!(session.viewport().buffer(), 500.0);
    }

    #[test]
    fn test_quit_releases_everything() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "a.png", 10, 10);
        let mut session = session_at(dir.path(), 10, 100.0);
        session.scroll_lines(1.0, Instant::now());
        session.quit();
        assert!(session.cache().is_empty());
        assert_eq!(session.next_deadline(), None);
    }
}
