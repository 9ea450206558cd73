use super::{Codec, CodecError, DecodedImage, ErrorCode};
use image::{ImageError, ImageReader};
use std::path::Path;
use std::time::Instant;

/// [`Codec`] backed by the `image` crate. Any format it can sniff or infer
/// from the extension is decoded and converted to interleaved RGBA8.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl Codec for ImageCodec {
    fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError> {
        let start = Instant::now();

        log::info!("Opening image file: {:?}", path);

        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| CodecError::new(ErrorCode::Io, format!("{}: {}", path.display(), e)))?;

        let decoded = reader
            .decode()
            .map_err(|e| CodecError::new(classify(&e), e.to_string()))?;

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Decoded {}x{} in {:?}", width, height, start.elapsed());

        Ok(DecodedImage::new(width, height, rgba.into_raw()))
    }
}

fn classify(err: &ImageError) -> ErrorCode {
    match err {
        ImageError::IoError(_) => ErrorCode::Io,
        ImageError::Unsupported(_) => ErrorCode::UnsupportedFormat,
        ImageError::Decoding(_) => ErrorCode::Decoding,
        ImageError::Limits(_) => ErrorCode::LimitsExceeded,
        ImageError::Parameter(_) => ErrorCode::InvalidParameter,
        ImageError::Encoding(_) => ErrorCode::Unknown,
    }
}
