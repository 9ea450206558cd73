//! lazy-image - decode images off-thread and report the completion events

use anyhow::{bail, Context, Result};
use lazy_image::{AsyncDecodeService, CompletionEvent, EventQueue, ImageCodec, SharedBuffer};
use parking_lot::Mutex;
use smol::channel::Receiver;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        bail!("usage: lazy-image <image>...");
    }

    let (sender, events) = EventQueue::unbounded();
    let service = AsyncDecodeService::new(ImageCodec, sender);

    let failures = run(&service, &events, &paths)?;

    if !service.wait_idle(Duration::from_secs(5)) {
        log::warn!("{} workers still running at exit", service.active_workers());
    }

    if failures > 0 {
        bail!("{} of {} images failed to load", failures, paths.len());
    }
    Ok(())
}

/// Load every path, copy each loaded image into a buffer and destroy it once
/// the copy lands. Events are handled in whatever order they arrive; returns
/// the number of failed loads.
fn run(service: &AsyncDecodeService, events: &Receiver<CompletionEvent>, paths: &[PathBuf]) -> Result<usize> {
    for path in paths {
        let task = service
            .load_image_async(path)
            .with_context(|| format!("Failed to queue {:?}", path))?;
        log::info!("Queued {:?} as {}", path, task);
    }

    let mut loads_pending = paths.len();
    let mut failures = 0usize;
    let mut buffers: HashMap<u64, SharedBuffer> = HashMap::new();

    while loads_pending > 0 || !buffers.is_empty() {
        match events.recv_blocking().context("Event queue closed")? {
            CompletionEvent::ImageLoaded {
                handle,
                path,
                image: Some(image),
                ..
            } => {
                loads_pending -= 1;
                let width = service.image_width(image)?;
                let height = service.image_height(image)?;
                println!("{}: {} loaded as {} ({}x{})", handle, path.display(), image, width, height);

                let buffer_id = image.index() as u64;
                let buffer: SharedBuffer = Arc::new(Mutex::new(vec![0; service.image_byte_size(image)?]));
                match service.load_image_data_async(buffer.clone(), buffer_id, image) {
                    Ok(_) => {
                        buffers.insert(buffer_id, buffer);
                    }
                    Err(e) => {
                        failures += 1;
                        log::error!("Failed to queue copy of {}: {}", image, e);
                        service.destroy_image(image);
                    }
                }
            }
            event @ CompletionEvent::ImageLoaded { .. } => {
                loads_pending -= 1;
                failures += 1;
                println!(
                    "{}: failed with error {}: {}",
                    event.handle(),
                    event.error_code(),
                    service.error_message(event.error_code())
                );
            }
            CompletionEvent::BufferLoaded {
                handle,
                buffer_id,
                image,
                error,
            } => {
                let Some(buffer) = buffers.remove(&buffer_id) else {
                    log::warn!("{}: no pending buffer {}", handle, buffer_id);
                    continue;
                };
                match error {
                    None => println!("{}: copied {} bytes of {}", handle, buffer.lock().len(), image),
                    Some(e) => println!("{}: copy of {} failed: {}", handle, image, e),
                }
                service.destroy_image(image);
            }
        }
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_image::{Codec, CodecError, DecodedImage, ErrorCode, Notify};
    use parking_lot::Condvar;
    use std::path::Path;

    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        cv: Condvar,
    }

    impl Gate {
        fn open(&self) {
            *self.open.lock() = true;
            self.cv.notify_all();
        }

        fn wait(&self) {
            let mut open = self.open.lock();
            while !*open {
                self.cv.wait(&mut open);
            }
        }
    }

    /// `slow.png` only decodes once the gate opens; `missing.png` fails.
    struct OrderedCodec(Arc<Gate>);

    impl Codec for OrderedCodec {
        fn decode(&self, path: &Path) -> Result<DecodedImage, CodecError> {
            if path.ends_with("missing.png") {
                return Err(CodecError::new(ErrorCode::Io, "missing.png"));
            }
            if path.ends_with("slow.png") {
                self.0.wait();
            }
            Ok(DecodedImage::new(2, 2, vec![0x5A; 16]))
        }
    }

    /// Service whose slow decode is released by the first finished copy, so
    /// a `BufferLoaded` always arrives before the last `ImageLoaded`.
    fn ordered_service() -> (AsyncDecodeService, Receiver<CompletionEvent>) {
        let gate = Arc::new(Gate::default());
        let (sender, events) = EventQueue::unbounded();
        let sink = {
            let gate = gate.clone();
            move |event: CompletionEvent| {
                let is_copy = matches!(event, CompletionEvent::BufferLoaded { .. });
                sender.notify(event);
                if is_copy {
                    gate.open();
                }
            }
        };
        (AsyncDecodeService::new(OrderedCodec(gate), sink), events)
    }

    #[test]
    fn test_copy_finishing_before_late_decode() {
        let (service, events) = ordered_service();
        let paths = vec![PathBuf::from("slow.png"), PathBuf::from("fast.png")];

        let failures = run(&service, &events, &paths).unwrap();

        assert_eq!(failures, 0);
        assert!(service.wait_idle(Duration::from_secs(10)));
        assert!(service.images().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_failed_loads_are_counted() {
        let (service, events) = ordered_service();
        let paths = vec![
            PathBuf::from("missing.png"),
            PathBuf::from("fast.png"),
            PathBuf::from("slow.png"),
        ];

        let failures = run(&service, &events, &paths).unwrap();

        assert_eq!(failures, 1);
        assert!(service.images().is_empty());
    }
}
