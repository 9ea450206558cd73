//! Off-thread decoding and buffer copies.
//!
//! Every asynchronous request reserves a task handle, hands it to a freshly
//! spawned worker thread and returns it to the caller. The worker does its
//! work without holding any table lock, then emits exactly one completion
//! event and releases its handle, unless the caller cancelled the task in
//! the meantime, in which case the result is dropped silently.
//!
//! Lock order: the image lock is never held while the task lock is taken.

use crate::decoder::{Codec, DecodedImage};
use crate::error::{ImageError, ServiceError};
use crate::events::{CompletionEvent, Notify};
use crate::handle::{ImageHandle, TaskHandle};
use crate::store::{copy_pixels, ImageStore};
use crate::tasks::{TaskRegistry, TaskTicket};
use parking_lot::{Condvar, Mutex};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Destination for asynchronous pixel copies. The worker locks it only for
/// the duration of the copy.
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Worker thread settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Worker threads are named `<worker_name>-<task index>`.
    pub worker_name: String,
    /// Stack size for worker threads; platform default when `None`.
    pub stack_size: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            worker_name: "lazy-image-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ServiceConfig {
    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

struct Shared {
    images: ImageStore,
    tasks: TaskRegistry,
    codec: Box<dyn Codec>,
    notifier: Box<dyn Notify>,
    workers: Mutex<usize>,
    idle: Condvar,
}

/// Decrements the running-worker count when a worker exits, even by panic.
struct WorkerGuard(Arc<Shared>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let mut workers = self.0.workers.lock();
        *workers -= 1;
        if *workers == 0 {
            self.0.idle.notify_all();
        }
    }
}

pub struct AsyncDecodeService {
    shared: Arc<Shared>,
    config: ServiceConfig,
}

impl AsyncDecodeService {
    pub fn new(codec: impl Codec, notifier: impl Notify) -> Self {
        Self::with_config(codec, notifier, ServiceConfig::default())
    }

    pub fn with_config(codec: impl Codec, notifier: impl Notify, config: ServiceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                images: ImageStore::new(),
                tasks: TaskRegistry::new(),
                codec: Box::new(codec),
                notifier: Box::new(notifier),
                workers: Mutex::new(0),
                idle: Condvar::new(),
            }),
            config,
        }
    }

    pub fn images(&self) -> &ImageStore {
        &self.shared.images
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.shared.tasks
    }

    /// Decode `path` on a worker thread. The returned handle shows up in the
    /// `ImageLoaded` event.
    pub fn load_image_async(&self, path: impl Into<PathBuf>) -> Result<TaskHandle, ServiceError> {
        let path = path.into();
        log::info!("Queueing decode of {:?}", path);

        self.spawn_worker(move |shared, handle, ticket| {
            run_load(shared, handle, ticket, path);
        })
    }

    /// Copy the pixels of `image` into `buffer` on a worker thread. The image
    /// is snapshotted now; destroying it afterwards does not affect the copy.
    pub fn load_image_data_async(
        &self,
        buffer: SharedBuffer,
        buffer_id: u64,
        image: ImageHandle,
    ) -> Result<TaskHandle, ServiceError> {
        let source = self.shared.images.snapshot(image)?;
        let actual = buffer.lock().len();
        if actual < source.byte_size() {
            return Err(ImageError::BufferTooSmall {
                needed: source.byte_size(),
                actual,
            }
            .into());
        }

        log::info!("Queueing copy of {} into buffer {}", image, buffer_id);

        self.spawn_worker(move |shared, handle, ticket| {
            run_copy(shared, handle, ticket, buffer, buffer_id, image, source);
        })
    }

    /// Decode `path` on the calling thread and store the result.
    pub fn load_image(&self, path: impl AsRef<Path>) -> Result<ImageHandle, ImageError> {
        let decoded = self.shared.codec.decode(path.as_ref())?;
        Ok(self.shared.images.insert(decoded))
    }

    /// Copy the pixels of `image` into `buffer` on the calling thread.
    pub fn load_image_data(&self, buffer: &mut [u8], image: ImageHandle) -> Result<(), ImageError> {
        self.shared.images.copy_into(image, buffer)
    }

    pub fn destroy_image(&self, image: ImageHandle) -> bool {
        self.shared.images.destroy(image)
    }

    /// Forget about a task. A worker still running keeps running but its
    /// event is never delivered.
    pub fn cancel_task(&self, task: TaskHandle) -> bool {
        let cancelled = self.shared.tasks.end(task);
        if cancelled {
            log::info!("Cancelled {}", task);
        }
        cancelled
    }

    pub fn is_live(&self, task: TaskHandle) -> bool {
        self.shared.tasks.is_live(task)
    }

    pub fn image_width(&self, image: ImageHandle) -> Result<u32, ImageError> {
        self.shared.images.width(image)
    }

    pub fn image_height(&self, image: ImageHandle) -> Result<u32, ImageError> {
        self.shared.images.height(image)
    }

    pub fn image_byte_size(&self, image: ImageHandle) -> Result<usize, ImageError> {
        self.shared.images.byte_size(image)
    }

    pub fn error_message(&self, code: u32) -> &'static str {
        self.shared.codec.error_text(code)
    }

    /// Worker threads that have not exited yet, cancelled ones included.
    pub fn active_workers(&self) -> usize {
        *self.shared.workers.lock()
    }

    /// Block until every worker has exited or `timeout` passes. Returns
    /// whether the service went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut workers = self.shared.workers.lock();
        while *workers > 0 {
            if self.shared.idle.wait_until(&mut workers, deadline).timed_out() {
                return *workers == 0;
            }
        }
        true
    }

    fn spawn_worker<F>(&self, job: F) -> Result<TaskHandle, ServiceError>
    where
        F: FnOnce(&Shared, TaskHandle, TaskTicket) + Send + 'static,
    {
        let (handle, ticket) = self.shared.tasks.begin();

        *self.shared.workers.lock() += 1;
        let guard = WorkerGuard(Arc::clone(&self.shared));

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.worker_name, handle.index()));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let spawned = builder.spawn(move || {
            let guard = guard;
            job(&*guard.0, handle, ticket);
        });

        match spawned {
            Ok(_) => Ok(handle),
            Err(e) => {
                log::error!("Failed to spawn worker for {}: {}", handle, e);
                self.shared.tasks.end(handle);
                Err(ServiceError::Spawn(e))
            }
        }
    }
}

fn run_load(shared: &Shared, handle: TaskHandle, ticket: TaskTicket, path: PathBuf) {
    let (image, error) = match shared.codec.decode(&path) {
        Ok(decoded) => (Some(shared.images.insert(decoded)), None),
        Err(e) => {
            log::warn!("Decoding {:?} failed: {}", path, e);
            (None, Some(e))
        }
    };

    let delivered = shared.tasks.complete(handle, ticket, |handle| {
        shared.notifier.notify(CompletionEvent::ImageLoaded {
            handle,
            path,
            image,
            error,
        });
    });

    if delivered {
        log::info!("{} finished", handle);
    } else if let Some(image) = image {
        // Nobody will ever learn this handle.
        log::warn!("{} was cancelled, reclaiming {}", handle, image);
        shared.images.destroy(image);
    } else {
        log::debug!("{} was cancelled, dropping its result", handle);
    }
}

fn run_copy(
    shared: &Shared,
    handle: TaskHandle,
    ticket: TaskTicket,
    buffer: SharedBuffer,
    buffer_id: u64,
    image: ImageHandle,
    source: DecodedImage,
) {
    let result = copy_pixels(&source, buffer.lock().as_mut_slice());
    if let Err(e) = &result {
        log::warn!("Copy of {} into buffer {} failed: {}", image, buffer_id, e);
    }

    let delivered = shared.tasks.complete(handle, ticket, |handle| {
        shared.notifier.notify(CompletionEvent::BufferLoaded {
            handle,
            buffer_id,
            image,
            error: result.err(),
        });
    });

    if !delivered {
        log::debug!("{} was cancelled, dropping its result", handle);
    }
}
