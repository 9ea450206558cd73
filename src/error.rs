use crate::decoder::CodecError;
use crate::handle::ImageHandle;
use thiserror::Error;

/// Failures of image-store operations. Cloneable so it can ride inside
/// completion events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("{0} not found")]
    NotFound(ImageHandle),

    #[error("destination buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("decode failed: {0}")]
    Codec(#[from] CodecError),
}

/// Failures of the asynchronous request surface.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T, E = ImageError> = std::result::Result<T, E>;
