use std::collections::HashSet;
use std::time::Instant;
use winit::keyboard::NamedKey;
use winit::window::{Fullscreen, Window};

use crate::cli::HELP_KEYS;
use crate::layout::{SlotKind, SlotVisual, CONTENT_PADDING};
use crate::scroll::ScrollDirection;
use crate::session::ViewerSession;
use crate::ui::render::{blit_rgba, draw_text, fill_rect, rgb, text_width, Rect, BG_COLOR};
use crate::viewport::visible_range;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const HEADER_HEIGHT: u32 = 40;
const BUTTON_MARGIN: u32 = 6;
const TEXT_SCALE: u32 = 2;

const HEADER_COLOR: (u8, u8, u8, u8) = (45, 45, 45, 255);
const BUTTON_COLOR: (u8, u8, u8, u8) = (70, 70, 70, 255);
const ROW_COLOR: (u8, u8, u8, u8) = (55, 55, 60, 255);
const WHITE: (u8, u8, u8, u8) = (255, 255, 255, 255);
const DIM: (u8, u8, u8, u8) = (150, 150, 150, 255);
const ERROR_RED: (u8, u8, u8, u8) = (255, 80, 80, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderButton {
    Back,
    ZoomIn,
    ZoomOut,
    Quit,
}

impl HeaderButton {
    fn label(self) -> &'static str {
        match self {
            HeaderButton::Back => "< Back",
            HeaderButton::ZoomIn => "+",
            HeaderButton::ZoomOut => "-",
            HeaderButton::Quit => "Quit",
        }
    }
}

/// Header button rectangles for a framebuffer `fb_w` pixels wide.
pub fn header_buttons(fb_w: u32) -> [(HeaderButton, Rect); 4] {
    let h = HEADER_HEIGHT - 2 * BUTTON_MARGIN;
    let y = BUTTON_MARGIN as i32;
    let pad = 2 * BUTTON_MARGIN as i32;
    let width = |b: HeaderButton| text_width(b.label(), TEXT_SCALE) + 2 * BUTTON_MARGIN + 4;

    let back = Rect::new(pad, y, width(HeaderButton::Back), h);
    let zoom_in = Rect::new(back.right() + pad, y, width(HeaderButton::ZoomIn), h);
    let zoom_out = Rect::new(
        zoom_in.right() + BUTTON_MARGIN as i32,
        y,
        width(HeaderButton::ZoomOut),
        h,
    );
    let quit_w = width(HeaderButton::Quit);
    let quit = Rect::new(fb_w as i32 - quit_w as i32 - pad, y, quit_w, h);

    [
        (HeaderButton::Back, back),
        (HeaderButton::ZoomIn, zoom_in),
        (HeaderButton::ZoomOut, zoom_out),
        (HeaderButton::Quit, quit),
    ]
}

/// Effects of one frame of input that need the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    None,
    ToggleFullscreen,
    Quit,
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub session: ViewerSession,
    pub show_info: bool,
    pub show_help: bool,
    pub is_fullscreen: bool,
    pub mouse_pos: (f64, f64),
    pub ctrl_held: bool,

    // Input accumulated since the last frame.
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,
    pub wheel_y: f32,
    pub click: Option<(f64, f64)>,
}

impl ViewerState {
    pub fn new(session: ViewerSession, is_fullscreen: bool) -> Self {
        Self {
            session,
            show_info: false,
            show_help: false,
            is_fullscreen,
            mouse_pos: (0.0, 0.0),
            ctrl_held: false,
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
            wheel_y: 0.0,
            click: None,
        }
    }

    /// Run the per-frame input handling. Returns true if the app should quit.
    pub fn update(&mut self, window: &Window) -> bool {
        let fb_w = window.inner_size().width.max(1);
        match self.handle_input(fb_w, Instant::now()) {
            FrameAction::Quit => return true,
            FrameAction::ToggleFullscreen => {
                self.is_fullscreen = !self.is_fullscreen;
                if self.is_fullscreen {
                    window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                } else {
                    window.set_fullscreen(None);
                }
            }
            FrameAction::None => {}
        }
        false
    }

    /// Apply the accumulated input to the session and clear it.
    pub fn handle_input(&mut self, fb_w: u32, now: Instant) -> FrameAction {
        let keys = std::mem::take(&mut self.keys_pressed);
        let chars = std::mem::take(&mut self.chars_pressed);
        let wheel = std::mem::take(&mut self.wheel_y);
        let click = self.click.take();

        // ------------------------------------------------------------------
        // Window
        // ------------------------------------------------------------------
        if chars.contains(&'q') {
            self.session.quit();
            return FrameAction::Quit;
        }
        if let Some((x, y)) = click {
            if let Some(action) = self.handle_click(x, y, fb_w, now) {
                return action;
            }
        }
        // The toggle needs the window; the rest of the frame's input still applies.
        let action = if keys.contains(&NamedKey::Escape) {
            FrameAction::ToggleFullscreen
        } else {
            FrameAction::None
        };
        if chars.contains(&'i') {
            self.show_info = !self.show_info;
        }
        if chars.contains(&'?') {
            self.show_help = !self.show_help;
        }

        // ------------------------------------------------------------------
        // Navigation
        // ------------------------------------------------------------------
        let image_mode = self.session.is_image_mode();
        let back = keys.contains(&NamedKey::Backspace)
            || (!image_mode && keys.contains(&NamedKey::ArrowLeft));
        if back {
            self.session.navigate_back();
        }

        // ------------------------------------------------------------------
        // Scrolling
        // ------------------------------------------------------------------
        let page_up = keys.contains(&NamedKey::ArrowUp)
            || keys.contains(&NamedKey::PageUp)
            || (image_mode && keys.contains(&NamedKey::ArrowLeft));
        let page_down = keys.contains(&NamedKey::ArrowDown)
            || keys.contains(&NamedKey::PageDown)
            || keys.contains(&NamedKey::Space)
            || (image_mode && keys.contains(&NamedKey::ArrowRight));
        if page_up {
            self.session.scroll_page(ScrollDirection::Up, now);
        }
        if page_down {
            self.session.scroll_page(ScrollDirection::Down, now);
        }
        if keys.contains(&NamedKey::Home) {
            self.session.scroll_home(now);
        } else if keys.contains(&NamedKey::End) {
            self.session.scroll_end(now);
        }

        // ------------------------------------------------------------------
        // Zoom
        // ------------------------------------------------------------------
        if chars.contains(&'+') || chars.contains(&'=') {
            self.session.zoom_in(now);
        }
        if chars.contains(&'-') {
            self.session.zoom_out(now);
        }

        if wheel != 0.0 {
            if self.ctrl_held {
                if wheel > 0.0 {
                    self.session.zoom_in(now);
                } else {
                    self.session.zoom_out(now);
                }
            } else {
                // Wheel up is positive; content moves toward the top.
                self.session.scroll_lines(-wheel, now);
            }
        }

        action
    }

    fn handle_click(&mut self, x: f64, y: f64, fb_w: u32, now: Instant) -> Option<FrameAction> {
        if y < HEADER_HEIGHT as f64 {
            let (button, _) = header_buttons(fb_w)
                .into_iter()
                .find(|(_, rect)| rect.contains(x, y))?;
            match button {
                HeaderButton::Back => {
                    self.session.navigate_back();
                }
                HeaderButton::ZoomIn => {
                    self.session.zoom_in(now);
                }
                HeaderButton::ZoomOut => {
                    self.session.zoom_out(now);
                }
                HeaderButton::Quit => {
                    self.session.quit();
                    return Some(FrameAction::Quit);
                }
            }
            return None;
        }
        if !self.session.is_image_mode() {
            let surface_y = (y - HEADER_HEIGHT as f64) as f32;
            if let Some(idx) = self.session.slot_at(surface_y) {
                self.session.open_slot(idx);
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let bg = rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]);
        frame.fill(bg);

        self.render_content(frame, fb_w, fb_h);
        self.render_scrollbar(frame, fb_w, fb_h);
        self.render_header(frame, fb_w, fb_h);

        if self.show_info {
            self.render_info(frame, fb_w, fb_h);
        }

        if self.show_help {
            let shade = Rect::new(0, 0, fb_w, fb_h);
            fill_rect(frame, fb_w, fb_h, shade, (0, 0, 0, 200));
            let mut y = 20;
            for line in HELP_KEYS.lines() {
                draw_text(frame, fb_w, fb_h, line, 20, y, TEXT_SCALE, WHITE);
                y += 24;
            }
        }
    }

    fn render_content(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let session = &self.session;
        let layout = session.layout();
        let top = HEADER_HEIGHT as i32;

        if layout.is_empty() {
            let (msg, color) = match session.listing_error() {
                Some(err) => (err.to_string(), ERROR_RED),
                None if session.is_image_mode() => ("(no images)".to_string(), DIM),
                None => ("(no folders)".to_string(), DIM),
            };
            let pad = CONTENT_PADDING as i32;
            draw_text(frame, fb_w, fb_h, &msg, pad, top + pad, TEXT_SCALE, color);
            return;
        }

        let Some(index) = layout.settled() else {
            return;
        };
        let vp = session.viewport();
        let offset = vp.scroll_offset();

        for idx in visible_range(index, vp.top(), vp.bottom(), 0.0) {
            let (Some(slot), Some(bounds)) = (layout.slot(idx), index.get(idx)) else {
                continue;
            };
            let y = top + (bounds.y1 - offset).round() as i32;

            match (slot.kind, &slot.visual) {
                (SlotKind::Image, SlotVisual::Image(img)) => {
                    let x = (fb_w as i32 - img.width as i32) / 2;
                    blit_rgba(
                        frame,
                        fb_w,
                        fb_h,
                        &img.rgba_bytes,
                        img.width,
                        img.height,
                        x,
                        y,
                        top,
                        fb_h as i32,
                    );
                }
                (SlotKind::Image, SlotVisual::Empty) => {
                    if y < top {
                        continue;
                    }
                    let tx = CONTENT_PADDING as i32;
                    let ty = y + 4;
                    let end = draw_text(frame, fb_w, fb_h, &slot.label, tx, ty, TEXT_SCALE, DIM);
                    if let Some(ref err) = slot.last_error {
                        let ex = end + 12;
                        draw_text(frame, fb_w, fb_h, err, ex, ty, TEXT_SCALE, ERROR_RED);
                    }
                }
                (SlotKind::Folder, _) => {
                    let row_y = y.max(top);
                    let row = Rect::new(
                        CONTENT_PADDING as i32,
                        row_y,
                        fb_w.saturating_sub(2 * CONTENT_PADDING as u32),
                        (bounds.height() as i32 - (row_y - y)).max(0) as u32,
                    );
                    fill_rect(frame, fb_w, fb_h, row, ROW_COLOR);
                    let ty = y + (bounds.height() as i32 - 7 * TEXT_SCALE as i32) / 2;
                    if ty >= top {
                        let text = format!("> {}", slot.label);
                        let tx = row.x + 12;
                        draw_text(frame, fb_w, fb_h, &text, tx, ty, TEXT_SCALE, WHITE);
                    }
                }
            }
        }
    }

    fn render_scrollbar(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let vp = self.session.viewport();
        if vp.content_height() <= vp.surface_height() || vp.surface_height() <= 0.0 {
            return;
        }
        let track_h = vp.surface_height();
        let thumb_h = (track_h * track_h / vp.content_height()).max(12.0);
        let thumb_y = HEADER_HEIGHT as f32 + vp.fraction() * (track_h - thumb_h);
        let thumb = Rect::new(
            fb_w as i32 - 8,
            thumb_y.round() as i32,
            5,
            thumb_h.round() as u32,
        );
        fill_rect(frame, fb_w, fb_h, thumb, (200, 200, 200, 140));
    }

    fn render_header(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let bar = Rect::new(0, 0, fb_w, HEADER_HEIGHT);
        fill_rect(frame, fb_w, fb_h, bar, HEADER_COLOR);

        let glyph_h = 7 * TEXT_SCALE as i32;
        for (button, rect) in header_buttons(fb_w) {
            fill_rect(frame, fb_w, fb_h, rect, BUTTON_COLOR);
            let enabled = button != HeaderButton::Back || self.session.history_depth() > 0;
            let label = button.label();
            let tx = rect.x + (rect.w as i32 - text_width(label, TEXT_SCALE) as i32) / 2;
            let ty = rect.y + (rect.h as i32 - glyph_h) / 2;
            let color = if enabled { WHITE } else { DIM };
            draw_text(frame, fb_w, fb_h, label, tx, ty, TEXT_SCALE, color);
        }

        let title = self.session.title();
        if !title.is_empty() {
            let tx = (fb_w as i32 - text_width(&title, TEXT_SCALE) as i32) / 2;
            let ty = (HEADER_HEIGHT as i32 - glyph_h) / 2;
            draw_text(frame, fb_w, fb_h, &title, tx, ty, TEXT_SCALE, WHITE);
        }
    }

    fn render_info(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let session = &self.session;
        let cache = session.cache();
        let vp = session.viewport();
        let mb = |b: u64| b as f64 / (1024.0 * 1024.0);

        let mut lines = vec![session.current_path().display().to_string()];
        let budget = match cache.budget() {
            Some(b) => format!("{:.0}/{:.0} MB", mb(cache.used_bytes()), mb(b)),
            None => format!("{:.0} MB", mb(cache.used_bytes())),
        };
        lines.push(format!(
            "{} items | cache: {} images | {} | zoom {:.0}% | view {:.0}-{:.0}%",
            session.layout().len(),
            cache.len(),
            budget,
            session.zoom().percent(),
            vp.fraction() * 100.0,
            vp.bottom_fraction() * 100.0,
        ));

        // Describe the image under the top edge of the viewport.
        if let Some(slot) = session
            .layout()
            .settled()
            .and_then(|index| index.slot_at(vp.top()))
            .and_then(|idx| session.layout().slot(idx))
        {
            if let Some(img) = slot.image() {
                lines.push(format!(
                    "[{}/{}] {} | {}x{} | {} | {:.1} KB",
                    slot.index + 1,
                    session.layout().len(),
                    slot.label,
                    img.native_width,
                    img.native_height,
                    img.format_name,
                    img.file_size as f64 / 1024.0,
                ));
            }
        }

        let line_h = (7 * TEXT_SCALE + 4) as i32;
        let box_h = line_h as u32 * lines.len() as u32 + 8;
        let y0 = fb_h as i32 - box_h as i32;
        let panel = Rect::new(0, y0, fb_w, box_h);
        fill_rect(frame, fb_w, fb_h, panel, (0, 0, 0, 178));
        for (i, line) in lines.iter().enumerate() {
            let ty = y0 + 4 + line_h * i as i32;
            draw_text(frame, fb_w, fb_h, line, 10, ty, TEXT_SCALE, WHITE);
        }
    }
}
