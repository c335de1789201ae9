//! Frame hand-off between the camera callback and the OCR worker
//!
//! Producers never block. The worker blocks in `take_next` until a frame or
//! an interrupt arrives. Overload is handled by a burst drop: once a take
//! leaves more than `soft_limit` frames behind, every one of them is thrown
//! away so the next recognition sees a fresh view of the scene.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use tracing::debug;

use crate::capture::frame::Frame;

/// Default backlog threshold (`OCR_QUEUE_SIZE`)
pub const DEFAULT_QUEUE_SIZE: usize = 3;

/// Soft-bounded frame queue with an interruptible blocking take
pub struct FrameQueue {
    frames_tx: Sender<Frame>,
    frames_rx: Receiver<Frame>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    soft_limit: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    /// Create a queue that burst-drops once more than `soft_limit` frames are pending
    pub fn new(soft_limit: usize) -> Self {
        let (frames_tx, frames_rx) = unbounded();
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            frames_tx,
            frames_rx,
            wake_tx,
            wake_rx,
            soft_limit,
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame; never blocks and never rejects
    pub fn push(&self, frame: Frame) {
        // Both ends live in `self`, so the channel cannot be disconnected
        let _ = self.frames_tx.send(frame);
    }

    /// Block until a frame is available.
    ///
    /// Returns `None` when woken by `interrupt`. After a frame is removed,
    /// a backlog larger than the soft limit is discarded entirely.
    pub fn take_next(&self) -> Option<Frame> {
        let next = select! {
            recv(self.frames_rx) -> msg => msg.ok(),
            recv(self.wake_rx) -> _ => None,
        };
        let frame = next?;

        let pending = self.frames_rx.len();
        if pending > self.soft_limit {
            let discarded = self.frames_rx.try_iter().take(pending).count();
            self.dropped.fetch_add(discarded as u64, Ordering::Relaxed);
            debug!(
                "Frame backlog of {} exceeded limit {}, dropped {} stale frames",
                pending, self.soft_limit, discarded
            );
        }

        Some(frame)
    }

    /// Wake a blocked `take_next`; a pending wake-up is not duplicated
    pub fn interrupt(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Forget any wake-up that nobody consumed
    pub fn clear_interrupt(&self) {
        while self.wake_rx.try_recv().is_ok() {}
    }

    /// Discard every pending frame, returning how many were removed
    pub fn clear(&self) -> usize {
        self.frames_rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.frames_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames_rx.is_empty()
    }

    pub fn soft_limit(&self) -> usize {
        self.soft_limit
    }

    /// Total frames discarded by burst drops
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}
