pub mod image_codec;

use std::fmt;
use std::path::Path;
use thiserror::Error;

pub use image_codec::ImageCodec;

/// Bytes per pixel of every decoded image (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// A fully decoded image.
///
/// The pixel layout is whatever the codec produces, unmodified: interleaved
/// 8-bit RGBA for [`ImageCodec`]. No channel reordering is ever applied.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, rgba_data: Vec<u8>) -> Self {
        Self {
            rgba_data,
            width,
            height,
        }
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.rgba_data.len()
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba_data.len())
            .finish()
    }
}

/// Numeric codec failure codes, stable across the host ABI. `0` is reserved
/// for success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Io = 1,
    UnsupportedFormat = 2,
    Decoding = 3,
    LimitsExceeded = 4,
    InvalidParameter = 5,
    Unknown = 255,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Io),
            2 => Some(Self::UnsupportedFormat),
            3 => Some(Self::Decoding),
            4 => Some(Self::LimitsExceeded),
            5 => Some(Self::InvalidParameter),
            255 => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Human-readable text for a numeric error code.
pub fn error_text(code: u32) -> &'static str {
    match ErrorCode::from_u32(code) {
        _ if code == 0 => "no error",
        Some(ErrorCode::Io) => "failed to open file for reading",
        Some(ErrorCode::UnsupportedFormat) => "unsupported image format",
        Some(ErrorCode::Decoding) => "image data is corrupt or truncated",
        Some(ErrorCode::LimitsExceeded) => "image exceeds decoder limits",
        Some(ErrorCode::InvalidParameter) => "invalid decoder parameter",
        Some(ErrorCode::Unknown) => "unknown decoder failure",
        None => "unrecognized error code",
    }
}

/// A terminal decode failure, carried as data rather than raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} ({detail})", error_text(.code.as_u32()))]
pub struct CodecError {
    pub code: ErrorCode,
    pub detail: String,
}

impl CodecError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// Turns an image file into pixels. Implementations must be pure: no shared
/// state between calls, safe to call from any worker thread.
pub trait Codec: Send + Sync + 'static {
    fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError>;

    fn error_text(&self, code: u32) -> &'static str {
        error_text(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_round_trip_through_u32() {
        for code in [
            ErrorCode::Io,
            ErrorCode::UnsupportedFormat,
            ErrorCode::Decoding,
            ErrorCode::LimitsExceeded,
            ErrorCode::InvalidParameter,
            ErrorCode::Unknown,
        ] {
            assert_ne!(code.as_u32(), 0);
            assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
        }
        assert_eq!(ErrorCode::from_u32(0), None);
    }

    #[test]
    fn test_error_text_lookup() {
        assert_eq!(error_text(0), "no error");
        assert_eq!(error_text(1), "failed to open file for reading");
        assert_eq!(error_text(42), "unrecognized error code");
    }

    #[test]
    fn test_codec_error_display() {
        let err = CodecError::new(ErrorCode::Io, "missing.png");
        assert_eq!(err.to_string(), "failed to open file for reading (missing.png)");
    }
}
