// ---------------------------------------------------------------------------
// Slot positions and visibility
// ---------------------------------------------------------------------------

/// How many not-yet-cached slots a single viewport pass may hand to the loader.
pub const LOAD_QUOTA: usize = 3;

/// Buffer above and below the visible region, as a fraction of surface height.
pub const BUFFER_RATIO: f32 = 0.5;

/// Half-open vertical interval `[y1, y2)` in content space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotBounds {
    pub y1: f32,
    pub y2: f32,
}

impl SlotBounds {
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn contains(&self, y: f32) -> bool {
        y >= self.y1 && y < self.y2
    }

    /// Whether the bounds, grown by `buffer` on both sides, touch `[top, bottom]`.
    pub fn intersects(&self, top: f32, bottom: f32, buffer: f32) -> bool {
        self.y1 - buffer <= bottom && self.y2 + buffer >= top
    }
}

/// Ordered bounds of every slot, index-aligned with slot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionIndex {
    bounds: Vec<SlotBounds>,
    content_height: f32,
}

impl PositionIndex {
    /// Stack rows in a single column: `padding` above the first row and below
    /// the last, `gap` between neighbours.
    pub fn rebuild<I>(heights: I, padding: f32, gap: f32) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let mut bounds = Vec::new();
        let mut y = padding;
        for (i, h) in heights.into_iter().enumerate() {
            if i > 0 {
                y += gap;
            }
            let h = h.max(0.0);
            bounds.push(SlotBounds { y1: y, y2: y + h });
            y += h;
        }

        let content_height = if bounds.is_empty() { 0.0 } else { y + padding };
        Self {
            bounds,
            content_height,
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<SlotBounds> {
        self.bounds.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotBounds> {
        self.bounds.iter()
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    /// Slot under content-space `y`, if any (gaps and padding hit nothing).
    pub fn slot_at(&self, y: f32) -> Option<usize> {
        let idx = self.bounds.partition_point(|b| b.y2 <= y);
        match self.bounds.get(idx) {
            Some(b) if b.contains(y) => Some(idx),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Viewport state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    scroll_offset: f32,
    surface_height: f32,
    content_height: f32,
}

impl ViewportState {
    pub fn new(surface_height: f32) -> Self {
        Self {
            scroll_offset: 0.0,
            surface_height: surface_height.max(0.0),
            content_height: 0.0,
        }
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn surface_height(&self) -> f32 {
        self.surface_height
    }

    pub fn content_height(&self) -> f32 {
        self.content_height
    }

    pub fn top(&self) -> f32 {
        self.scroll_offset
    }

    pub fn bottom(&self) -> f32 {
        self.scroll_offset + self.surface_height
    }

    /// Grows with the window so a taller surface preloads further ahead.
    pub fn buffer(&self) -> f32 {
        self.surface_height * BUFFER_RATIO
    }

    pub fn max_offset(&self) -> f32 {
        (self.content_height - self.surface_height).max(0.0)
    }

    /// Top of the visible region as a fraction of total content height.
    pub fn fraction(&self) -> f32 {
        if self.content_height > 0.0 {
            (self.scroll_offset / self.content_height).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Bottom of the visible region as a fraction of total content height.
    pub fn bottom_fraction(&self) -> f32 {
        if self.content_height > 0.0 {
            (self.bottom() / self.content_height).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Returns true when the offset actually moved.
    pub fn set_offset(&mut self, offset: f32) -> bool {
        let clamped = if offset.is_finite() {
            offset.clamp(0.0, self.max_offset())
        } else {
            0.0
        };
        let changed = clamped != self.scroll_offset;
        self.scroll_offset = clamped;
        changed
    }

    pub fn scroll_by(&mut self, dy: f32) -> bool {
        self.set_offset(self.scroll_offset + dy)
    }

    pub fn set_fraction(&mut self, fraction: f32) -> bool {
        let f = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.set_offset(f * self.content_height)
    }

    pub fn set_surface_height(&mut self, height: f32) {
        self.surface_height = height.max(0.0);
        self.set_offset(self.scroll_offset);
    }

    pub fn set_content_height(&mut self, height: f32) {
        self.content_height = height.max(0.0);
        self.set_offset(self.scroll_offset);
    }

    pub fn reset(&mut self) {
        self.scroll_offset = 0.0;
    }
}

// ---------------------------------------------------------------------------
// Viewport calculator
// ---------------------------------------------------------------------------

/// Every slot whose buffered bounds intersect `[top, bottom]`.
pub fn visible_range(index: &PositionIndex, top: f32, bottom: f32, buffer: f32) -> Vec<usize> {
    index
        .iter()
        .enumerate()
        .take_while(|(_, b)| b.y1 - buffer <= bottom)
        .filter(|(_, b)| b.intersects(top, bottom, buffer))
        .map(|(i, _)| i)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportScan {
    /// Slots found in range before the scan stopped.
    pub visible: Vec<usize>,
    /// The uncached subset of `visible`, at most `quota` long.
    pub to_load: Vec<usize>,
}

/// Linear scan in index order that stops once `quota` uncached slots have
/// been found. Slots past the stop point stay candidates for the next scan.
pub fn scan<F>(
    index: &PositionIndex,
    top: f32,
    bottom: f32,
    buffer: f32,
    quota: usize,
    mut is_cached: F,
) -> ViewportScan
where
    F: FnMut(usize) -> bool,
{
    let mut scan = ViewportScan::default();
    for (idx, bounds) in index.iter().enumerate() {
        if scan.to_load.len() >= quota {
            break;
        }
        // Bounds are stacked top to bottom, nothing further down can match.
        if bounds.y1 - buffer > bottom {
            break;
        }
        if bounds.intersects(top, bottom, buffer) {
            scan.visible.push(idx);
            if !is_cached(idx) {
                scan.to_load.push(idx);
            }
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(heights: &[f32]) -> PositionIndex {
        PositionIndex::rebuild(heights.iter().copied(), 0.0, 0.0)
    }

    #[test]
    fn test_rebuild_stacks_rows_with_padding_and_gap() {
        let index = PositionIndex::rebuild([100.0, 50.0, 20.0], 10.0, 5.0);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(0), Some(SlotBounds { y1: 10.0, y2: 110.0 }));
        assert_eq!(index.get(1), Some(SlotBounds { y1: 115.0, y2: 165.0 }));
        assert_eq!(index.get(2), Some(SlotBounds { y1: 170.0, y2: 190.0 }));
        assert_eq!(index.content_height(), 200.0);
    }

    #[test]
    fn test_rebuild_is_monotonic() {
        let index = strip(&[30.0, 0.0, 12.5, 400.0, 1.0]);
        let bounds: Vec<SlotBounds> = index.iter().copied().collect();
        for pair in bounds.windows(2) {
            assert!(pair[0].y1 <= pair[1].y1);
            assert!(pair[0].y2 <= pair[1].y2);
        }
    }

    #[test]
    fn test_empty_index() {
        let index = strip(&[]);
        assert!(index.is_empty());
        assert_eq!(index.content_height(), 0.0);
        assert!(visible_range(&index, 0.0, 100.0, 50.0).is_empty());
        assert_eq!(index.slot_at(0.0), None);
    }

    #[test]
    fn test_slot_at_skips_gaps() {
        let index = PositionIndex::rebuild([100.0, 100.0], 10.0, 10.0);
        assert_eq!(index.slot_at(5.0), None);
        assert_eq!(index.slot_at(10.0), Some(0));
        assert_eq!(index.slot_at(109.9), Some(0));
        assert_eq!(index.slot_at(115.0), None);
        assert_eq!(index.slot_at(120.0), Some(1));
        assert_eq!(index.slot_at(500.0), None);
    }

    #[test]
    fn test_visible_range_matches_brute_force() {
        let index = strip(&[120.0, 40.0, 300.0, 10.0, 0.0, 75.0, 220.0, 60.0]);
        let cases = [
            (0.0, 0.0, 0.0),
            (0.0, 100.0, 0.0),
            (130.0, 130.0, 0.0),
            (150.0, 400.0, 125.0),
            (460.0, 470.0, 0.0),
            (800.0, 900.0, 50.0),
            (2000.0, 2500.0, 100.0),
        ];
        for (top, bottom, buffer) in cases {
            let expected: Vec<usize> = index
                .iter()
                .enumerate()
                .filter(|(_, b)| b.y1 - buffer <= bottom && b.y2 + buffer >= top)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(
                visible_range(&index, top, bottom, buffer),
                expected,
                "top={top} bottom={bottom} buffer={buffer}"
            );
        }
    }

    #[test]
    fn test_visible_range_edges_touch() {
        let index = strip(&[100.0, 100.0]);
        // Slot 1 starts exactly at the viewport bottom: touching counts.
        assert_eq!(visible_range(&index, 0.0, 100.0, 0.0), vec![0, 1]);
        assert_eq!(visible_range(&index, 0.0, 99.0, 0.0), vec![0]);
        assert_eq!(visible_range(&index, 0.0, 99.0, 1.0), vec![0, 1]);
    }

    #[test]
    fn test_scan_stops_after_quota() {
        let index = strip(&[10.0; 20]);
        let scan = scan(&index, 0.0, 1000.0, 0.0, LOAD_QUOTA, |_| false);
        assert_eq!(scan.to_load, vec![0, 1, 2]);
        assert_eq!(scan.visible, vec![0, 1, 2]);
    }

    #[test]
    fn test_scan_skips_cached_slots() {
        let index = strip(&[10.0; 20]);
        let scan = scan(&index, 0.0, 1000.0, 0.0, LOAD_QUOTA, |i| i < 5 || i == 6);
        assert_eq!(scan.to_load, vec![5, 7, 8]);
        assert_eq!(scan.visible, (0..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_with_everything_cached_reports_full_range() {
        let index = strip(&[100.0; 10]);
        let scan = scan(&index, 250.0, 450.0, 100.0, LOAD_QUOTA, |_| true);
        assert!(scan.to_load.is_empty());
        assert_eq!(scan.visible, visible_range(&index, 250.0, 450.0, 100.0));
    }

    #[test]
    fn test_viewport_clamps_offset() {
        let mut vp = ViewportState::new(100.0);
        vp.set_content_height(400.0);
        assert!(vp.set_offset(1000.0));
        assert_eq!(vp.scroll_offset(), 300.0);
        assert!(vp.set_offset(-5.0));
        assert_eq!(vp.scroll_offset(), 0.0);
        assert!(!vp.scroll_by(-10.0));
    }

    #[test]
    fn test_viewport_fraction_round_trip() {
        let mut vp = ViewportState::new(100.0);
        vp.set_content_height(1000.0);
        vp.set_fraction(0.25);
        assert_eq!(vp.scroll_offset(), 250.0);
        assert!((vp.fraction() - 0.25).abs() < 1e-6);
        assert!((vp.bottom_fraction() - 0.35).abs() < 1e-6);
        assert_eq!(vp.buffer(), 50.0);
    }

    #[test]
    fn test_viewport_shrinking_content_reclamps() {
        let mut vp = ViewportState::new(100.0);
        vp.set_content_height(1000.0);
        vp.set_offset(900.0);
        vp.set_content_height(300.0);
        assert_eq!(vp.scroll_offset(), 200.0);
        vp.set_content_height(50.0);
        assert_eq!(vp.scroll_offset(), 0.0);
        assert_eq!(vp.fraction(), 0.0);
    }
}
