//! Deferred segment release worker pool.
//!
//! `Segment::release` may unmap files and tear down native index state, so
//! the registry never runs it while holding its own lock. Removed and
//! replaced segments are handed to this pool instead; shutdown drains the
//! queue before joining, so no release is lost on teardown.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

use crate::error::Result;

use super::metrics::SegmentMetrics;
use super::{ReleaseScope, Segment, SegmentRef};

/// Worker pool performing full segment releases off the registry lock.
#[derive(Debug)]
pub struct ReleasePool {
    sender: Mutex<Option<Sender<SegmentRef>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    metrics: Arc<SegmentMetrics>,
}

impl ReleasePool {
    /// Spawn `worker_threads` release workers (at least one).
    pub fn new(worker_threads: usize, metrics: Arc<SegmentMetrics>) -> Result<Self> {
        let (sender, receiver) = unbounded::<SegmentRef>();

        let mut workers = Vec::with_capacity(worker_threads.max(1));
        for worker_id in 0..worker_threads.max(1) {
            let receiver = receiver.clone();
            let metrics = Arc::clone(&metrics);
            let handle = thread::Builder::new()
                .name(format!("segment-release-{worker_id}"))
                .spawn(move || {
                    while let Ok(segment) = receiver.recv() {
                        segment.release(ReleaseScope::All);
                        metrics.record_released(segment.as_ref());
                    }
                })?;
            workers.push(handle);
        }

        Ok(ReleasePool {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            metrics,
        })
    }

    /// Queue a segment for full release.
    ///
    /// Falls back to releasing on the caller thread if the pool has
    /// already shut down, so every submitted segment is released exactly
    /// once either way.
    pub fn submit(&self, segment: SegmentRef) {
        let leftover = {
            let sender = self.sender.lock();
            match sender.as_ref() {
                Some(tx) => tx.send(segment).err().map(|err| err.into_inner()),
                None => Some(segment),
            }
        };

        if let Some(segment) = leftover {
            segment.release(ReleaseScope::All);
            self.metrics.record_released(segment.as_ref());
        }
    }

    /// Close the queue, drain pending releases and join the workers.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());

        let mut workers = self.workers.lock();
        while let Some(worker) = workers.pop() {
            let _ = worker.join();
        }
    }
}

impl Drop for ReleasePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
