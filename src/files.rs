use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ViewerError};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// What a folder turns into once listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderView {
    /// Every entry is an image: shown as one continuous vertical strip.
    Images(Vec<PathBuf>),
    /// Anything else: only the subfolders are shown, as navigable rows.
    Folders(Vec<FolderEntry>),
}

impl FolderView {
    pub fn is_images(&self) -> bool {
        matches!(self, FolderView::Images(_))
    }

    pub fn len(&self) -> usize {
        match self {
            FolderView::Images(paths) => paths.len(),
            FolderView::Folders(entries) => entries.len(),
        }
    }
}

/// List a directory, folders first, then by case-insensitive name.
pub fn list_folder(dir: &Path) -> Result<Vec<FolderEntry>> {
    let entries = fs::read_dir(dir).map_err(|source| ViewerError::Listing {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut listing = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = path.is_dir();
        listing.push(FolderEntry { name, path, is_dir });
    }

    sort_entries(&mut listing);
    Ok(listing)
}

pub fn sort_entries(entries: &mut [FolderEntry]) {
    entries.sort_by(|a, b| folders_first(a, b));
}

fn folders_first(a: &FolderEntry, b: &FolderEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// A folder is an image folder when it holds no subdirectories and every
/// entry has an image extension. An empty folder is an (empty) image folder.
pub fn classify(entries: Vec<FolderEntry>) -> FolderView {
    let has_dirs = entries.iter().any(|e| e.is_dir);
    let all_images = entries.iter().all(|e| e.is_dir || is_image_file(&e.path));

    if all_images && !has_dirs {
        FolderView::Images(entries.into_iter().map(|e| e.path).collect())
    } else {
        FolderView::Folders(entries.into_iter().filter(|e| e.is_dir).collect())
    }
}
