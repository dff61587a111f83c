//! Live capture of one match from the spectator service.
//!
//! A [`MatchCapture`] holds everything learned about the match; the
//! [`CaptureDriver`] moves it through its states one poll at a time and
//! [`run_capture`] arms the single pending timer between polls. Captures are
//! started and tracked through a [`CaptureRegistry`].

mod error;
mod finalize;
mod machine;
pub mod progress;
mod registry;
mod run;

pub use error::CaptureError;
pub use finalize::{container_path, finalize};
pub use machine::{CaptureDriver, Step};
pub use registry::{CaptureHandle, CaptureOutcome, CaptureRegistry, CaptureSettings};
pub use run::run_capture;

use base64::Engine as _;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::container::{ClientVersion, PlayerRecord};
use crate::region::Region;
use crate::segment::SegmentKind;
use progress::CaptureProgress;

/// Lifecycle of a capture. `Done` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    AwaitingStart,
    Streaming,
    Finalizing,
    Done,
    Canceled,
}

impl CaptureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Done | CaptureState::Canceled)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::AwaitingStart => "awaiting start",
            CaptureState::Streaming => "streaming",
            CaptureState::Finalizing => "finalizing",
            CaptureState::Done => "done",
            CaptureState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// What the match detector hands over to start a capture.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub region_id: u8,
    pub match_id: u64,
    /// `major.minor.patch` of the game client.
    pub client_version: String,
    /// Base64 encryption key as reported by the service.
    pub key: String,
    pub roster: Vec<PlayerRecord>,
}

/// One in-flight or finished capture.
#[derive(Debug)]
pub struct MatchCapture {
    region: &'static Region,
    match_id: u64,
    client_version: ClientVersion,
    key: Bytes,
    roster: Vec<PlayerRecord>,

    pub(crate) state: CaptureState,
    pub(crate) last_keyframe_id: u32,
    pub(crate) last_chunk_id: u32,
    pub(crate) meta_errors: u32,
    pub(crate) stall_cycles: u32,

    pub(crate) startup_end_chunk_id: u32,
    pub(crate) match_start_chunk_id: u32,
    pub(crate) final_chunk_id: Option<u32>,
    pub(crate) featured: bool,
    pub(crate) interest_score: i64,

    progress: Arc<CaptureProgress>,
}

impl MatchCapture {
    /// Validates the request: known region, `x.y.z` client version, and a
    /// base64 key of at most 255 bytes once decoded.
    pub fn new(req: &CaptureRequest) -> Result<Self, CaptureError> {
        let region = Region::by_id(req.region_id).ok_or(CaptureError::UnknownRegion(req.region_id))?;
        let client_version: ClientVersion = req.client_version.parse()?;
        let key = base64::engine::general_purpose::STANDARD.decode(req.key.trim())?;
        if key.len() > usize::from(u8::MAX) {
            return Err(CaptureError::KeyTooLong(key.len()));
        }
        if req.roster.len() > usize::from(u8::MAX) {
            return Err(CaptureError::RosterTooLarge(req.roster.len()));
        }
        Ok(MatchCapture {
            region,
            match_id: req.match_id,
            client_version,
            key: Bytes::from(key),
            roster: req.roster.clone(),
            state: CaptureState::AwaitingStart,
            last_keyframe_id: 0,
            last_chunk_id: 0,
            meta_errors: 0,
            stall_cycles: 0,
            startup_end_chunk_id: 0,
            match_start_chunk_id: 0,
            final_chunk_id: None,
            featured: false,
            interest_score: 0,
            progress: Arc::new(CaptureProgress::new()),
        })
    }

    pub fn region(&self) -> &'static Region {
        self.region
    }

    pub fn match_id(&self) -> u64 {
        self.match_id
    }

    pub fn client_version(&self) -> ClientVersion {
        self.client_version
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn roster(&self) -> &[PlayerRecord] {
        &self.roster
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn last_seen(&self, kind: SegmentKind) -> u32 {
        match kind {
            SegmentKind::Keyframe => self.last_keyframe_id,
            SegmentKind::Chunk => self.last_chunk_id,
        }
    }

    pub fn meta_errors(&self) -> u32 {
        self.meta_errors
    }

    pub fn stall_cycles(&self) -> u32 {
        self.stall_cycles
    }

    pub fn startup_end_chunk_id(&self) -> u32 {
        self.startup_end_chunk_id
    }

    pub fn match_start_chunk_id(&self) -> u32 {
        self.match_start_chunk_id
    }

    pub fn final_chunk_id(&self) -> Option<u32> {
        self.final_chunk_id
    }

    pub fn featured(&self) -> bool {
        self.featured
    }

    pub fn interest_score(&self) -> i64 {
        self.interest_score
    }

    pub fn progress(&self) -> &Arc<CaptureProgress> {
        &self.progress
    }

    /// True iff every id up to the last seen one downloaded, for both kinds.
    pub fn is_complete(&self) -> bool {
        [SegmentKind::Keyframe, SegmentKind::Chunk]
            .into_iter()
            .all(|k| self.progress.table(k).complete_through(self.last_seen(k)))
    }

    pub fn status(&self) -> CaptureStatus {
        let keyframes = self.progress.table(SegmentKind::Keyframe);
        let chunks = self.progress.table(SegmentKind::Chunk);
        CaptureStatus {
            region_id: self.region.id,
            match_id: self.match_id,
            state: self.state,
            last_keyframe_id: self.last_keyframe_id,
            last_chunk_id: self.last_chunk_id,
            downloaded_keyframes: keyframes.downloaded_count(),
            downloaded_chunks: chunks.downloaded_count(),
            failed: keyframes.failed_count() + chunks.failed_count(),
            in_flight: self.progress.in_flight(),
            meta_errors: self.meta_errors,
        }
    }
}

/// Point-in-time progress of one capture. Serialized as one JSON line per
/// update by `aof record --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub region_id: u8,
    pub match_id: u64,
    pub state: CaptureState,
    pub last_keyframe_id: u32,
    pub last_chunk_id: u32,
    pub downloaded_keyframes: usize,
    pub downloaded_chunks: usize,
    pub failed: usize,
    pub in_flight: u32,
    pub meta_errors: u32,
}

#[cfg(test)]
pub(crate) fn test_request() -> CaptureRequest {
    CaptureRequest {
        region_id: 1,
        match_id: 3_512_345_678,
        client_version: "6.2.1".into(),
        key: "AQID".into(),
        roster: vec![PlayerRecord {
            id: 1,
            name: "Player One".into(),
            team: 100,
            ..Default::default()
        }],
    }
}
