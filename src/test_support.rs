use std::path::{Path, PathBuf};

use crate::loader::{ImageCrateDecoder, LazyLoader};
use crate::session::{SessionConfig, ViewerSession};

pub fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbaImage::from_pixel(w, h, image::Rgba([30, 120, 200, 255]))
        .save(&path)
        .unwrap();
    path
}

pub fn session_at(path: &Path, display_width: u32, surface_height: f32) -> ViewerSession {
    ViewerSession::new(
        path.to_path_buf(),
        LazyLoader::new(Box::new(ImageCrateDecoder)),
        SessionConfig::default(),
        display_width,
        surface_height,
    )
}

/// Materialize every slot, then put the surface height back.
pub fn load_all(session: &mut ViewerSession) {
    let height = session.viewport().surface_height();
    session.set_surface_height(1.0e6);
    while session.cache().len() < session.layout().len() {
        if session.lazy_load_pass().loaded.is_empty() {
            break;
        }
    }
    session.set_surface_height(height);
}
