use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Failures that are contained at the item level: a folder that cannot be
/// listed or a single image that cannot be read or decoded.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("cannot list {}: {source}", .path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} has no pixels", .path.display())]
    EmptyImage { path: PathBuf },

    #[error("no image slot at index {index}")]
    NoSuchSlot { index: usize },
}

impl ViewerError {
    /// True for the errors that leave a single slot unmaterialized.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::Decode { .. } | Self::EmptyImage { .. }
        )
    }
}
