//! Latest-frame hand-off between a capture thread and the render loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbImage;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::io::load_rgb;

/// Double buffer holding the most recent frame.
///
/// The writer fills the back buffer and then flips the front index. Readers
/// only clone an `Arc`, never wait on the writer, and always see a complete
/// frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    buffers: [Mutex<Option<Arc<RgbImage>>>; 2],
    front: AtomicUsize,
    sequence: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> FrameSlot {
        FrameSlot::default()
    }

    pub fn publish(&self, frame: RgbImage) {
        let back = 1 - self.front.load(Ordering::Acquire);
        {
            let mut slot = self.buffers[back].lock();
            *slot = Some(Arc::new(frame));
        }
        self.front.store(back, Ordering::Release);
        self.sequence.fetch_add(1, Ordering::AcqRel);
    }

    /// The newest frame that is not being written right now.
    pub fn latest(&self) -> Option<Arc<RgbImage>> {
        let front = self.front.load(Ordering::Acquire);
        [front, 1 - front].into_iter().find_map(|idx| {
            self.buffers[idx]
                .try_lock()
                .and_then(|slot| slot.as_ref().map(Arc::clone))
        })
    }

    /// Number of frames published so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }
}

/// A camera-like producer of frames.
pub trait FrameSource {
    /// Most recently captured frame, if any. Never blocks.
    fn read(&self) -> Option<Arc<RgbImage>>;

    /// Stops the background capture.
    fn stop(&mut self);
}

/// Plays a list of frames on a background thread at a fixed rate.
pub struct SequenceSource {
    slot: Arc<FrameSlot>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SequenceSource {
    /// Frames are decoded on the capture thread; unreadable files are
    /// skipped with a warning.
    pub fn from_paths(paths: Vec<PathBuf>, fps: f64, looping: bool) -> SequenceSource {
        let len = paths.len();
        SequenceSource::spawn(len, fps, looping, move |i| match load_rgb(&paths[i]) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("skipping {}: {}", paths[i].display(), e);
                None
            }
        })
    }

    pub fn from_images(images: Vec<RgbImage>, fps: f64, looping: bool) -> SequenceSource {
        let len = images.len();
        SequenceSource::spawn(len, fps, looping, move |i| Some(images[i].clone()))
    }

    fn spawn(
        len: usize,
        fps: f64,
        looping: bool,
        mut load: impl FnMut(usize) -> Option<RgbImage> + Send + 'static,
    ) -> SequenceSource {
        let slot = Arc::new(FrameSlot::new());
        let stopped = Arc::new(AtomicBool::new(false));
        let period = Duration::from_secs_f64(1.0 / fps.max(1e-3));

        let handle = {
            let slot = Arc::clone(&slot);
            let stopped = Arc::clone(&stopped);
            thread::spawn(move || {
                let mut i = 0;
                while len > 0 && !stopped.load(Ordering::Acquire) {
                    if let Some(frame) = load(i) {
                        slot.publish(frame);
                    }
                    i += 1;
                    if i == len {
                        if !looping {
                            break;
                        }
                        i = 0;
                    }
                    thread::sleep(period);
                }
                debug!("capture thread done after {} frames", slot.sequence());
            })
        };

        SequenceSource {
            slot,
            stopped,
            handle: Some(handle),
        }
    }

    /// Number of frames captured so far.
    pub fn captured(&self) -> u64 {
        self.slot.sequence()
    }

    /// True once a non-looping sequence has played to the end.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl FrameSource for SequenceSource {
    fn read(&self) -> Option<Arc<RgbImage>> {
        self.slot.latest()
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

impl Drop for SequenceSource {
    fn drop(&mut self) {
        self.stop();
    }
}
