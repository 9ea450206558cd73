//! Decoded images, addressed by [`ImageHandle`].
//!
//! Images live until the caller destroys them; nothing is collected in the
//! background. Pixel copies happen outside the store lock on a snapshot.

use crate::decoder::DecodedImage;
use crate::error::{ImageError, Result};
use crate::handle::ImageHandle;
use crate::table::HandleTable;

pub struct ImageStore {
    images: HandleTable<DecodedImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self {
            images: HandleTable::new("images"),
        }
    }

    pub fn insert(&self, image: DecodedImage) -> ImageHandle {
        ImageHandle::from_index(self.images.allocate(image))
    }

    pub fn width(&self, handle: ImageHandle) -> Result<u32> {
        self.read(handle, |image| image.width)
    }

    pub fn height(&self, handle: ImageHandle) -> Result<u32> {
        self.read(handle, |image| image.height)
    }

    pub fn byte_size(&self, handle: ImageHandle) -> Result<usize> {
        self.read(handle, DecodedImage::byte_size)
    }

    pub fn contains(&self, handle: ImageHandle) -> bool {
        self.images.contains(handle.index())
    }

    /// Copy of the stored image, taken under the store lock.
    pub fn snapshot(&self, handle: ImageHandle) -> Result<DecodedImage> {
        self.images
            .get_clone(handle.index())
            .ok_or(ImageError::NotFound(handle))
    }

    /// Copy the image's pixels verbatim into the front of `dest`.
    pub fn copy_into(&self, handle: ImageHandle, dest: &mut [u8]) -> Result<()> {
        let source = self.snapshot(handle)?;
        copy_pixels(&source, dest)
    }

    /// Free the image. `false` if it was never created or is already gone.
    pub fn destroy(&self, handle: ImageHandle) -> bool {
        let destroyed = self.images.release(handle.index());
        if destroyed {
            log::debug!("Destroyed {}", handle);
        }
        destroyed
    }

    /// Number of images currently held.
    pub fn len(&self) -> usize {
        self.images.live()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<R>(&self, handle: ImageHandle, f: impl FnOnce(&DecodedImage) -> R) -> Result<R> {
        self.images
            .with(handle.index(), f)
            .ok_or(ImageError::NotFound(handle))
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy every pixel byte of `source` into `dest`. Bytes of `dest` past the
/// image size are left untouched; a short `dest` is rejected up front.
pub fn copy_pixels(source: &DecodedImage, dest: &mut [u8]) -> Result<()> {
    let needed = source.byte_size();
    if dest.len() < needed {
        return Err(ImageError::BufferTooSmall {
            needed,
            actual: dest.len(),
        });
    }
    dest[..needed].copy_from_slice(&source.rgba_data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(width: u32, height: u32) -> DecodedImage {
        let data = (0..width * height * 4).map(|i| (i % 251) as u8).collect();
        DecodedImage::new(width, height, data)
    }

    #[test]
    fn test_dimensions_and_size() {
        let store = ImageStore::new();
        let handle = store.insert(checkerboard(10, 5));
        assert_eq!(store.width(handle), Ok(10));
        assert_eq!(store.height(handle), Ok(5));
        assert_eq!(store.byte_size(handle), Ok(200));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_copy_into_exact_buffer_is_verbatim() {
        let store = ImageStore::new();
        let image = checkerboard(10, 10);
        let handle = store.insert(image.clone());

        let mut buf = vec![0u8; 400];
        store.copy_into(handle, &mut buf).unwrap();
        assert_eq!(buf, image.rgba_data);
    }

    #[test]
    fn test_copy_into_larger_buffer_leaves_tail() {
        let store = ImageStore::new();
        let handle = store.insert(checkerboard(1, 1));

        let mut buf = vec![0xAAu8; 6];
        store.copy_into(handle, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[0, 1, 2, 3]);
        assert_eq!(&buf[4..], &[0xAA, 0xAA]);
    }

    #[test]
    fn test_copy_into_short_buffer_fails_cleanly() {
        let store = ImageStore::new();
        let handle = store.insert(checkerboard(10, 10));

        let mut buf = vec![7u8; 399];
        assert_eq!(
            store.copy_into(handle, &mut buf),
            Err(ImageError::BufferTooSmall {
                needed: 400,
                actual: 399
            })
        );
        assert!(buf.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_destroy_then_lookup_is_not_found() {
        let store = ImageStore::new();
        let handle = store.insert(checkerboard(2, 2));
        assert!(store.destroy(handle));
        assert_eq!(store.width(handle), Err(ImageError::NotFound(handle)));
        assert_eq!(store.snapshot(handle), Err(ImageError::NotFound(handle)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_destroy_unknown_or_twice_returns_false() {
        let store = ImageStore::new();
        assert!(!store.destroy(ImageHandle::from_index(3)));

        let handle = store.insert(checkerboard(1, 1));
        assert!(store.destroy(handle));
        assert!(!store.destroy(handle));
    }

    #[test]
    fn test_copy_from_unknown_handle() {
        let store = ImageStore::new();
        let missing = ImageHandle::from_index(0);
        let mut buf = [0u8; 4];
        assert_eq!(
            store.copy_into(missing, &mut buf),
            Err(ImageError::NotFound(missing))
        );
    }
}
