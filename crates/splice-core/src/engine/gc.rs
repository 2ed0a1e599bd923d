//! Deferred deallocation of source buffers
//!
//! A decoded soundtrack can be hundreds of megabytes. When a new video is
//! loaded, the audio thread drops its reference to the old buffer; with a
//! `basedrop::Shared` that drop only enqueues the pointer, and the memory is
//! returned on the collector thread below instead of inside the callback.

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Handle, Shared};

use crate::media::DecodedAudio;

/// How often the collector thread reclaims queued drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(250);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn spawn_collector() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("source-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created and owned by this thread
            let mut collector = basedrop::Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::debug!("source-gc: collector running");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // Without a collector thread, leak the collector so its handle
            // stays valid; buffers are then reclaimed only on explicit collect
            log::warn!("source-gc: could not start collector thread");
            let collector = Box::leak(Box::new(basedrop::Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for allocating [`Shared`] values reclaimed off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(spawn_collector).clone()
}

/// Wrap a decoded source for hand-off to the audio thread
pub fn share_source(audio: DecodedAudio) -> Shared<DecodedAudio> {
    Shared::new(&gc_handle(), audio)
}
