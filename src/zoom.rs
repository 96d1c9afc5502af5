use std::time::Instant;

use crate::scheduler::Task;
use crate::session::ViewerSession;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const ZOOM_IN_STEP: f32 = 1.1;
pub const ZOOM_OUT_STEP: f32 = 0.9;

// ---------------------------------------------------------------------------
// Zoom state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    scale: f32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl ZoomState {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn percent(&self) -> f32 {
        self.scale * 100.0
    }

    /// Scale after applying `multiplier`, or None if the step is rejected.
    /// Out-of-range results are rejected, except that from within one
    /// standard step of a bound the scale lands exactly on that bound.
    pub fn propose(&self, multiplier: f32) -> Option<f32> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return None;
        }
        let raw = self.scale * multiplier;
        let target = if raw > MAX_SCALE {
            (self.scale * ZOOM_IN_STEP >= MAX_SCALE).then_some(MAX_SCALE)?
        } else if raw < MIN_SCALE {
            (self.scale * ZOOM_OUT_STEP <= MIN_SCALE).then_some(MIN_SCALE)?
        } else {
            raw
        };
        (target != self.scale).then_some(target)
    }
}

// ---------------------------------------------------------------------------
// Reflow
// ---------------------------------------------------------------------------

impl ViewerSession {
    pub fn zoom_in(&mut self, now: Instant) -> bool {
        self.adjust_zoom(ZOOM_IN_STEP, now)
    }

    pub fn zoom_out(&mut self, now: Instant) -> bool {
        self.adjust_zoom(ZOOM_OUT_STEP, now)
    }

    /// Multiply the scale factor and reflow. Returns false when clamped away.
    pub fn adjust_zoom(&mut self, multiplier: f32, now: Instant) -> bool {
        let Some(scale) = self.zoom.propose(multiplier) else {
            log::debug!("[zoom] {:.0}% x {} rejected", self.zoom.percent(), multiplier);
            return false;
        };
        self.zoom.scale = scale;
        log::info!("[zoom] {:.0}%", self.zoom.percent());
        self.reflow(now);
        true
    }

    /// Images are sized from the display width, so a new width is a reflow
    /// at the current scale.
    pub fn set_display_width(&mut self, width: u32, now: Instant) {
        if width == 0 || width == self.display_width {
            return;
        }
        log::info!("Display width {} -> {}", self.display_width, width);
        self.display_width = width;
        self.reflow(now);
    }

    /// Re-materialize every cached slot at the current metrics, rebuild the
    /// position index and keep the same scroll fraction on screen.
    fn reflow(&mut self, now: Instant) {
        let anchor = self.viewport.fraction();

        self.layout.set_metrics(self.metrics());
        let refreshed = self
            .loader
            .rematerialize_cached(&mut self.layout, &mut self.cache);
        self.sync_viewport();
        self.viewport.set_fraction(anchor);
        log::debug!(
            "[zoom] refreshed {} images, anchor {:.3}, content {:.0}px",
            refreshed,
            anchor,
            self.viewport.content_height()
        );

        self.lazy_load_pass();
        self.viewport.set_fraction(anchor);

        if let Some(prev) = self.pending_anchor.filter(|id| self.scheduler.is_pending(*id)) {
            log::debug!("[zoom] superseding restore {:?}", prev);
        }

        // Newly loaded neighbours may still resize the column; restore the
        // fraction again once that has settled. A later zoom replaces this.
        let id = self.scheduler.schedule(
            Task::RestoreAnchor { fraction: anchor },
            self.config.settle_delay,
            now,
        );
        self.pending_anchor = Some(id);
    }
}
