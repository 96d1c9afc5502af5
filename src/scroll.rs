use std::time::Instant;

use crate::scheduler::Task;
use crate::session::ViewerSession;
use crate::viewport::ViewportState;

/// A page step moves this share of the visible height.
pub const PAGE_RATIO: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ViewerSession {
    /// Positive `lines` scroll toward the end of the folder.
    pub fn scroll_lines(&mut self, lines: f32, now: Instant) -> bool {
        let dy = lines * self.config.line_step;
        self.apply_scroll(|vp| vp.scroll_by(dy), now)
    }

    pub fn scroll_page(&mut self, direction: ScrollDirection, now: Instant) -> bool {
        let step = self.viewport.surface_height() * PAGE_RATIO;
        let dy = match direction {
            ScrollDirection::Up => -step,
            ScrollDirection::Down => step,
        };
        self.apply_scroll(|vp| vp.scroll_by(dy), now)
    }

    pub fn scroll_to_fraction(&mut self, fraction: f32, now: Instant) -> bool {
        self.apply_scroll(|vp| vp.set_fraction(fraction), now)
    }

    pub fn scroll_home(&mut self, now: Instant) -> bool {
        self.apply_scroll(|vp| vp.set_offset(0.0), now)
    }

    pub fn scroll_end(&mut self, now: Instant) -> bool {
        self.apply_scroll(|vp| vp.set_offset(f32::MAX), now)
    }

    /// Explicit scrolling wins over a pending post-zoom restore. Loading is
    /// deferred so a burst of input costs one pass.
    fn apply_scroll<F>(&mut self, mv: F, now: Instant) -> bool
    where
        F: FnOnce(&mut ViewportState) -> bool,
    {
        if let Some(id) = self.pending_anchor.take() {
            self.scheduler.cancel(id);
        }
        let moved = mv(&mut self.viewport);
        if moved {
            self.scheduler
                .schedule_once(Task::LazyLoad, self.config.scroll_debounce, now);
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{session_at, write_png};
    use std::time::Duration;
    use tempfile::TempDir;

    fn tall_session(dir: &TempDir) -> ViewerSession {
        for i in 0..4 {
            write_png(dir.path(), &format!("{i}.png"), 100, 100);
        }
        session_at(dir.path(), 100, 100.0)
    }

    #[test]
    fn test_scroll_is_clamped() {
        let dir = TempDir::new().unwrap();
        let mut session = tall_session(&dir);
        let now = Instant::now();
        assert!(!session.scroll_lines(-3.0, now));
        assert!(session.scroll_end(now));
        let vp = *session.viewport();
        assert_eq!(vp.scroll_offset(), vp.max_offset());
        assert!(!session.scroll_lines(1.0, now));
        assert!(session.scroll_home(now));
        assert_eq!(session.viewport().scroll_offset(), 0.0);
    }

    #[test]
    fn test_page_step_is_ninety_percent_of_surface() {
        let dir = TempDir::new().unwrap();
        let mut session = tall_session(&dir);
        let now = Instant::now();
        assert!(session.scroll_page(ScrollDirection::Down, now));
        assert_eq!(session.viewport().scroll_offset(), 90.0);
        assert!(session.scroll_page(ScrollDirection::Up, now));
        assert_eq!(session.viewport().scroll_offset(), 0.0);
    }

    #[test]
    fn test_burst_of_scrolls_schedules_one_pass() {
        let dir = TempDir::new().unwrap();
        let mut session = tall_session(&dir);
        let now = Instant::now();
        for i in 0..5 {
            session.scroll_lines(0.1, now + Duration::from_millis(i * 5));
        }
        assert_eq!(session.scheduler.len(), 1);
        assert_eq!(session.next_deadline(), Some(now + Duration::from_millis(50)));
        assert!(!session.run_due(now + Duration::from_millis(49)));
        assert!(session.run_due(now + Duration::from_millis(50)));
        assert!(session.scheduler.is_empty());
    }

    #[test]
    fn test_scroll_does_not_load_synchronously() {
        let dir = TempDir::new().unwrap();
        let mut session = tall_session(&dir);
        let before = session.cache().len();
        let now = Instant::now();
        session.scroll_end(now);
        assert_eq!(session.cache().len(), before);
        session.run_due(now + Duration::from_millis(50));
        assert!(session.cache().contains(3));
    }
}
