use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use softbuffer::Surface;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::Key;
use winit::window::{Fullscreen, Window, WindowId};

use crate::ui::state::{ViewerState, HEADER_HEIGHT};

pub mod render;
pub mod state;

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: ViewerState,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
}

impl App {
    pub fn new(state: ViewerState) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    /// Images are sized to the monitor, not the window, so leaving
    /// fullscreen does not shrink them.
    fn sync_display_width(&mut self) {
        let Some(ref window) = self.window else {
            return;
        };
        let width = window
            .current_monitor()
            .map(|m| m.size().width)
            .unwrap_or_else(|| window.inner_size().width);
        self.state.session.set_display_width(width, Instant::now());
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let Some(ref mut surface) = self.surface else {
            return;
        };
        let (w, h) = (NonZeroU32::new(width.max(1)), NonZeroU32::new(height.max(1)));
        if let (Some(w), Some(h)) = (w, h) {
            if let Err(e) = surface.resize(w, h) {
                log::warn!("Surface resize to {}x{} failed: {}", width, height, e);
            }
        }
    }

    fn sync_surface_height(&mut self, fb_h: u32) {
        let height = fb_h.saturating_sub(HEADER_HEIGHT) as f32;
        self.state.session.set_surface_height(height);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let mut attrs = Window::default_attributes()
            .with_title("fv")
            .with_inner_size(LogicalSize::new(1280u32, 720u32));
        if self.state.is_fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = softbuffer::Context::new(Arc::clone(&window)).and_then(|context| {
            let surface = Surface::new(&context, Arc::clone(&window))?;
            Ok((context, surface))
        });
        let (context, surface) = match surface {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Could not create drawing surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);

        self.resize_surface(size.width, size.height);
        self.sync_display_width();
        self.sync_surface_height(size.height);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.state.session.quit();
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                self.resize_surface(width, height);
                self.sync_display_width();
                self.sync_surface_height(height);
                self.request_redraw();
            }

            WindowEvent::ModifiersChanged(modifiers) => {
                self.state.ctrl_held = modifiers.state().control_key();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                // Repeats count: holding a page key keeps scrolling.
                if event.state != ElementState::Pressed {
                    return;
                }
                match &event.logical_key {
                    Key::Named(named) => {
                        self.state.keys_pressed.insert(*named);
                    }
                    Key::Character(s) => {
                        if let Some(c) = s.chars().next() {
                            self.state.chars_pressed.insert(c.to_ascii_lowercase());
                        }
                    }
                    _ => {}
                }
                self.request_redraw();
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left && state == ElementState::Pressed {
                    self.state.click = Some(self.state.mouse_pos);
                    self.request_redraw();
                }
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                self.state.mouse_pos = (x, y);
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => y as f32 / 40.0,
                };
                self.state.wheel_y += y;
                self.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.clone() else {
                    return;
                };
                if self.state.update(&window) {
                    event_loop.exit();
                    return;
                }

                if let Some(ref mut surface) = self.surface {
                    let size = window.inner_size();
                    let fb_w = size.width.max(1);
                    let fb_h = size.height.max(1);
                    match surface.buffer_mut() {
                        Ok(mut buffer) => {
                            if buffer.len() == (fb_w * fb_h) as usize {
                                self.state.render(&mut buffer, fb_w, fb_h);
                            }
                            if let Err(e) = buffer.present() {
                                log::warn!("Present failed: {}", e);
                            }
                        }
                        Err(e) => log::warn!("Could not map framebuffer: {}", e),
                    }
                }
            }

            _ => {}
        }
    }

    /// Deferred loads and anchor restores are driven from here: run what is
    /// due, then sleep until the next deadline.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.session.run_due(Instant::now()) {
            self.request_redraw();
        }
        match self.state.session.next_deadline() {
            Some(when) => event_loop.set_control_flow(ControlFlow::WaitUntil(when)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }
}
