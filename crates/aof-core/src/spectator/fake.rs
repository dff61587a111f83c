//! Scripted in-memory spectator for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::{ChunkInfo, GameMetaData, SpectatorApi};
use crate::retry::FetchError;
use crate::segment::SegmentKind;

/// Replies come from queues; an empty queue answers HTTP 503.
/// Segments succeed with `"{tag}{id}"` after their configured failures.
#[derive(Default)]
pub struct ScriptedSpectator {
    meta: Mutex<VecDeque<Result<GameMetaData, FetchError>>>,
    info: Mutex<VecDeque<Result<ChunkInfo, FetchError>>>,
    failures: Mutex<HashMap<(SegmentKind, u32), u32>>,
    segment_calls: Mutex<HashMap<(SegmentKind, u32), u32>>,
    pub meta_calls: AtomicU32,
    pub info_calls: AtomicU32,
}

impl ScriptedSpectator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_meta(&self, m: GameMetaData) {
        self.meta.lock().unwrap().push_back(Ok(m));
    }

    pub fn push_meta_error(&self) {
        self.meta.lock().unwrap().push_back(Err(FetchError::Http(500)));
    }

    pub fn push_info(&self, c: ChunkInfo) {
        self.info.lock().unwrap().push_back(Ok(c));
    }

    pub fn push_info_error(&self) {
        self.info.lock().unwrap().push_back(Err(FetchError::Http(500)));
    }

    /// The next `n` requests for this segment fail.
    pub fn fail_segment(&self, kind: SegmentKind, id: u32, n: u32) {
        self.failures.lock().unwrap().insert((kind, id), n);
    }

    pub fn segment_calls(&self, kind: SegmentKind, id: u32) -> u32 {
        self.segment_calls
            .lock()
            .unwrap()
            .get(&(kind, id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        let segments: u32 = self.segment_calls.lock().unwrap().values().sum();
        segments + self.meta_calls.load(Ordering::SeqCst) + self.info_calls.load(Ordering::SeqCst)
    }

    pub fn payload(kind: SegmentKind, id: u32) -> Bytes {
        Bytes::from(format!("{}{}", kind.tag(), id))
    }
}

#[async_trait]
impl SpectatorApi for ScriptedSpectator {
    async fn version(&self) -> Result<String, FetchError> {
        Ok("1.82.102".to_string())
    }

    async fn game_meta_data(&self) -> Result<GameMetaData, FetchError> {
        self.meta_calls.fetch_add(1, Ordering::SeqCst);
        self.meta
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::Http(503)))
    }

    async fn last_chunk_info(&self) -> Result<ChunkInfo, FetchError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.info
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(FetchError::Http(503)))
    }

    async fn segment(&self, kind: SegmentKind, id: u32) -> Result<Bytes, FetchError> {
        *self
            .segment_calls
            .lock()
            .unwrap()
            .entry((kind, id))
            .or_insert(0) += 1;
        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&(kind, id)) {
            if *left > 0 {
                *left -= 1;
                return Err(FetchError::Http(404));
            }
        }
        Ok(Self::payload(kind, id))
    }
}
