mod cli;
mod error;
mod files;
mod layout;
mod loader;
mod scheduler;
mod scroll;
mod session;
mod ui;
mod viewport;
mod zoom;

#[cfg(test)]
mod test_support;

use clap::Parser;
use winit::event_loop::EventLoop;

use crate::cli::Cli;
use crate::loader::{ImageCrateDecoder, LazyLoader};
use crate::session::ViewerSession;
use crate::ui::state::ViewerState;
use crate::ui::App;

/// Used until the window reports the monitor it landed on.
const INITIAL_DISPLAY_WIDTH: u32 = 1280;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = cli.session_config();
    if let Some(budget) = config.cache_budget {
        log::info!("Image memory capped at {} MB", budget / (1024 * 1024));
    }

    // Nothing is visible until the window exists, so this decodes nothing.
    let session = ViewerSession::new(
        cli.path.clone(),
        LazyLoader::new(Box::new(ImageCrateDecoder)),
        config,
        INITIAL_DISPLAY_WIDTH,
        0.0,
    );
    let state = ViewerState::new(session, !cli.windowed);
    let mut app = App::new(state);

    let event_loop = match EventLoop::new() {
        Ok(el) => el,
        Err(e) => {
            log::error!("Could not create event loop: {}", e);
            return;
        }
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
    }
}
