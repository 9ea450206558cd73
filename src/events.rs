//! Completion events and the sinks they are delivered to.

use crate::decoder::CodecError;
use crate::error::ImageError;
use crate::handle::{self, ImageHandle, TaskHandle};
use smol::channel::{self, Receiver, Sender};
use std::path::PathBuf;

/// The single notification a task emits when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A load-from-path task finished, successfully or not.
    ImageLoaded {
        handle: TaskHandle,
        path: PathBuf,
        image: Option<ImageHandle>,
        error: Option<CodecError>,
    },
    /// A buffer-copy task finished.
    BufferLoaded {
        handle: TaskHandle,
        buffer_id: u64,
        image: ImageHandle,
        error: Option<ImageError>,
    },
}

impl CompletionEvent {
    /// Type tag hosts dispatch on.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ImageLoaded { .. } => "image_loaded",
            Self::BufferLoaded { .. } => "buffer_loaded",
        }
    }

    pub fn handle(&self) -> TaskHandle {
        match self {
            Self::ImageLoaded { handle, .. } | Self::BufferLoaded { handle, .. } => *handle,
        }
    }

    /// Codec error code, `0` on success. Buffer copies always report `0`.
    pub fn error_code(&self) -> u32 {
        match self {
            Self::ImageLoaded {
                error: Some(err), ..
            } => err.code.as_u32(),
            _ => 0,
        }
    }

    /// Image handle as the host sees it: `-1` when no image was produced.
    pub fn image_raw(&self) -> i64 {
        match self {
            Self::ImageLoaded { image, .. } => handle::image_raw(*image),
            Self::BufferLoaded { image, .. } => image.to_raw(),
        }
    }
}

/// Receives completion events. Called from worker threads; must not block
/// for long and gets no acknowledgement back.
///
/// `notify` runs while the task table is locked, so a sink must not call back
/// into the service (`is_live`, `cancel_task`, `load_image_async`, ...); that
/// deadlocks. Forward the event to another thread instead, as
/// [`EventSender`] does.
pub trait Notify: Send + Sync + 'static {
    fn notify(&self, event: CompletionEvent);
}

impl<F> Notify for F
where
    F: Fn(CompletionEvent) + Send + Sync + 'static,
{
    fn notify(&self, event: CompletionEvent) {
        self(event)
    }
}

/// Unbounded queue delivering events to a single consumer thread.
pub struct EventQueue;

impl EventQueue {
    pub fn unbounded() -> (EventSender, Receiver<CompletionEvent>) {
        let (sender, receiver) = channel::unbounded();
        (EventSender(sender), receiver)
    }
}

/// Producer half of an [`EventQueue`].
#[derive(Clone)]
pub struct EventSender(Sender<CompletionEvent>);

impl Notify for EventSender {
    fn notify(&self, event: CompletionEvent) {
        if let Err(e) = self.0.try_send(event) {
            log::debug!("Dropping {} event, queue closed", e.into_inner().kind());
        }
    }
}
