//! Segment tables and the in-flight download counter shared between a
//! capture's driver and its download tasks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::segment::{SegmentKind, SegmentTable};

#[derive(Debug)]
pub struct CaptureProgress {
    keyframes: Mutex<SegmentTable>,
    chunks: Mutex<SegmentTable>,
    in_flight: AtomicU32,
    closed: AtomicBool,
}

impl Default for CaptureProgress {
    fn default() -> Self {
        CaptureProgress {
            keyframes: Mutex::new(SegmentTable::new(SegmentKind::Keyframe)),
            chunks: Mutex::new(SegmentTable::new(SegmentKind::Chunk)),
            in_flight: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }
}

impl CaptureProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locked table for `kind`. A poisoned lock is recovered: slot updates are
    /// single inserts, so the table is never left half-written.
    pub fn table(&self, kind: SegmentKind) -> MutexGuard<'_, SegmentTable> {
        let m = match kind {
            SegmentKind::Keyframe => &self.keyframes,
            SegmentKind::Chunk => &self.chunks,
        };
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Stops accepting segments. Downloads still running drop their payload
    /// instead of leaving it in the cache after the purge.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Clone of the table for `kind`, for finalizing or status reports.
    pub fn snapshot(&self, kind: SegmentKind) -> SegmentTable {
        self.table(kind).clone()
    }
}

/// Counts one download as in flight until dropped.
///
/// Created before the download task is spawned and moved into it, so the
/// counter is released on every exit path, panics included.
#[derive(Debug)]
pub struct InFlightGuard {
    progress: Arc<CaptureProgress>,
}

impl InFlightGuard {
    /// Marks `(kind, id)` requested and increments the in-flight counter.
    pub fn begin(progress: &Arc<CaptureProgress>, kind: SegmentKind, id: u32) -> Self {
        progress.table(kind).mark_requested(id);
        progress.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            progress: Arc::clone(progress),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let prev = self.progress.in_flight.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "in-flight counter underflow");
    }
}
