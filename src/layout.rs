use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::files::FolderEntry;
use crate::loader::{target_size, DecodedImage};
use crate::viewport::PositionIndex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CONTENT_PADDING: f32 = 10.0;
/// Height of an image slot that has never been materialized (one text line).
pub const PLACEHOLDER_HEIGHT: f32 = 24.0;
pub const FOLDER_ROW_HEIGHT: f32 = 44.0;
pub const FOLDER_ROW_GAP: f32 = 10.0;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Image,
    Folder,
}

#[derive(Clone)]
pub enum SlotVisual {
    Empty,
    Image(Arc<DecodedImage>),
}

impl fmt::Debug for SlotVisual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotVisual::Empty => f.write_str("Empty"),
            SlotVisual::Image(img) => write!(f, "Image({}x{})", img.width, img.height),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub index: usize,
    /// Image file in image mode, navigation target in folder mode.
    pub source: PathBuf,
    pub label: String,
    pub kind: SlotKind,
    pub visual: SlotVisual,
    /// Native pixel size, known once the file has been decoded.
    pub native_size: Option<(u32, u32)>,
    pub last_error: Option<String>,
}

impl Slot {
    fn new(index: usize, source: PathBuf, label: String, kind: SlotKind) -> Self {
        Self {
            index,
            source,
            label,
            kind,
            visual: SlotVisual::Empty,
            native_size: None,
            last_error: None,
        }
    }

    pub fn image(&self) -> Option<&Arc<DecodedImage>> {
        match &self.visual {
            SlotVisual::Image(img) => Some(img),
            SlotVisual::Empty => None,
        }
    }

    fn height(&self, metrics: LayoutMetrics) -> f32 {
        match (self.kind, &self.visual) {
            (SlotKind::Folder, _) => FOLDER_ROW_HEIGHT,
            (SlotKind::Image, SlotVisual::Image(img)) => img.height as f32,
            // Once the native size is known an unloaded slot keeps the
            // height it would have at the current scale.
            (SlotKind::Image, SlotVisual::Empty) => match self.native_size {
                Some((w, h)) => target_size(w, h, metrics.display_width, metrics.scale).1 as f32,
                None => PLACEHOLDER_HEIGHT,
            },
        }
    }
}

/// Inputs that size a materialized image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub display_width: u32,
    pub scale: f32,
}

// ---------------------------------------------------------------------------
// Content layout
// ---------------------------------------------------------------------------

/// The scrollable column of slots. Bounds are recomputed lazily: any change
/// that affects slot sizes marks the layout dirty, and the position index is
/// only handed out by `flush`, which settles the layout first.
pub struct ContentLayout {
    slots: Vec<Slot>,
    gap: f32,
    metrics: LayoutMetrics,
    index: PositionIndex,
    dirty: bool,
}

impl ContentLayout {
    pub fn empty(metrics: LayoutMetrics) -> Self {
        Self {
            slots: Vec::new(),
            gap: 0.0,
            metrics,
            index: PositionIndex::default(),
            dirty: false,
        }
    }

    pub fn for_images(paths: Vec<PathBuf>, metrics: LayoutMetrics) -> Self {
        let slots = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let label = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Slot::new(i, path, label, SlotKind::Image)
            })
            .collect();
        Self::with_slots(slots, 0.0, metrics)
    }

    pub fn for_folders(entries: Vec<FolderEntry>, metrics: LayoutMetrics) -> Self {
        let slots = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| Slot::new(i, e.path, e.name, SlotKind::Folder))
            .collect();
        Self::with_slots(slots, FOLDER_ROW_GAP, metrics)
    }

    fn with_slots(slots: Vec<Slot>, gap: f32, metrics: LayoutMetrics) -> Self {
        Self {
            slots,
            gap,
            metrics,
            index: PositionIndex::default(),
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, idx: usize) -> Option<&Slot> {
        self.slots.get(idx)
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics
    }

    pub fn is_settled(&self) -> bool {
        !self.dirty
    }

    pub fn set_metrics(&mut self, metrics: LayoutMetrics) {
        if metrics != self.metrics {
            self.metrics = metrics;
            self.dirty = true;
        }
    }

    /// Swap a slot between placeholder and image.
    pub fn set_visual(&mut self, idx: usize, visual: SlotVisual) {
        let Some(slot) = self.slots.get_mut(idx) else {
            return;
        };
        if let SlotVisual::Image(img) = &visual {
            slot.native_size = Some((img.native_width, img.native_height));
            slot.last_error = None;
        }
        slot.visual = visual;
        self.dirty = true;
    }

    pub fn set_error(&mut self, idx: usize, error: Option<String>) {
        if let Some(slot) = self.slots.get_mut(idx) {
            slot.last_error = error;
        }
    }

    /// The bounds, only if no size change is pending.
    pub fn settled(&self) -> Option<&PositionIndex> {
        self.is_settled().then_some(&self.index)
    }

    /// Settle pending size changes and return the up-to-date bounds.
    pub fn flush(&mut self) -> &PositionIndex {
        if self.dirty {
            let metrics = self.metrics;
            self.index = PositionIndex::rebuild(
                self.slots.iter().map(|s| s.height(metrics)),
                CONTENT_PADDING,
                self.gap,
            );
            self.dirty = false;
        }
        &self.index
    }
}
