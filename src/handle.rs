//! Typed handles handed out to the host.
//!
//! Both handle kinds are plain slot indices. They are only unique among the
//! live entries of their own table and get reused once a slot is freed.

use std::fmt;

/// Raw value hosts use for "no handle".
pub const NONE_RAW: i64 = -1;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a slot index.
            #[inline]
            pub const fn from_index(index: usize) -> Self {
                Self(index)
            }

            /// Slot index inside the owning table.
            #[inline]
            pub const fn index(self) -> usize {
                self.0
            }

            /// Projection used when passing the handle across the host ABI.
            #[inline]
            pub fn to_raw(self) -> i64 {
                self.0 as i64
            }

            /// Parse a raw host value; negative values never name a slot.
            pub fn from_raw(raw: i64) -> Option<Self> {
                usize::try_from(raw).ok().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Identifies an in-flight asynchronous task.
    TaskHandle,
    "task"
);

define_handle!(
    /// Identifies a decoded image held by the image store.
    ImageHandle,
    "image"
);

/// Raw projection of an optional image handle, `-1` when absent.
pub fn image_raw(image: Option<ImageHandle>) -> i64 {
    image.map_or(NONE_RAW, ImageHandle::to_raw)
}
