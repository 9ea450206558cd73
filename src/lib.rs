//! Off-thread image decoding for single-threaded hosts.
//!
//! Decoded images and in-flight tasks are addressed by small integer handles
//! kept in two independently locked [`table::HandleTable`]s. Results reach
//! the host as [`CompletionEvent`]s through a [`Notify`] sink.

pub mod decoder;
pub mod error;
pub mod events;
pub mod handle;
pub mod service;
pub mod store;
pub mod table;
pub mod tasks;

pub use decoder::{error_text, Codec, CodecError, DecodedImage, ErrorCode, ImageCodec};
pub use error::{ImageError, ServiceError};
pub use events::{CompletionEvent, EventQueue, EventSender, Notify};
pub use handle::{ImageHandle, TaskHandle};
pub use service::{AsyncDecodeService, ServiceConfig, SharedBuffer};
pub use store::ImageStore;
pub use table::HandleTable;
pub use tasks::TaskRegistry;
