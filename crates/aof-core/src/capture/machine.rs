//! One poll of the capture state machine at a time.

use std::sync::Arc;
use std::time::Duration;

use super::{CaptureState, MatchCapture};
use crate::config::CaptureConfig;
use crate::downloader::{spawn_download, DownloadContext};
use crate::retry::FetchError;
use crate::segment::SegmentKind;
use crate::spectator::{ChunkInfo, SpectatorApi};

/// Highest segment id a container can hold.
const MAX_SEGMENT_ID: u32 = u16::MAX as u32;

/// What the driver wants next after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Poll again after this delay.
    Rearm(Duration),
    /// The match ended; write the container.
    Finalize,
    /// Too many failed polls; stop without further requests.
    Canceled,
    /// The container is already written; nothing left to do.
    Finished,
}

/// Owns a [`MatchCapture`] and performs its polls.
pub struct CaptureDriver {
    capture: MatchCapture,
    api: Arc<dyn SpectatorApi>,
    downloads: Arc<DownloadContext>,
    cfg: CaptureConfig,
}

impl CaptureDriver {
    pub fn new(
        capture: MatchCapture,
        api: Arc<dyn SpectatorApi>,
        downloads: Arc<DownloadContext>,
        cfg: CaptureConfig,
    ) -> Self {
        CaptureDriver {
            capture,
            api,
            downloads,
            cfg,
        }
    }

    pub fn capture(&self) -> &MatchCapture {
        &self.capture
    }

    pub(crate) fn set_state(&mut self, state: CaptureState) {
        self.capture.state = state;
    }

    /// Runs the poll for the current state. Terminal and finalizing states
    /// make no requests.
    pub async fn step(&mut self) -> Step {
        match self.capture.state {
            CaptureState::AwaitingStart => self.poll_start().await,
            CaptureState::Streaming => self.poll_chunks().await,
            CaptureState::Finalizing => Step::Finalize,
            CaptureState::Done => Step::Finished,
            CaptureState::Canceled => Step::Canceled,
        }
    }

    async fn poll_start(&mut self) -> Step {
        let meta = match self.api.game_meta_data().await {
            Ok(m) => m,
            Err(e) => return self.poll_failed("game metadata", &e),
        };
        self.capture.meta_errors = 0;
        if !meta.has_started() {
            tracing::info!(match_id = self.capture.match_id(), "match hasn't started yet");
            return self.rearm(self.cfg.start_poll());
        }

        let c = &mut self.capture;
        c.startup_end_chunk_id = clamp_id(meta.end_startup_chunk_id);
        c.match_start_chunk_id = clamp_id(meta.start_game_chunk_id);
        c.featured = meta.featured_game;
        c.interest_score = meta.interest_score;
        c.state = CaptureState::Streaming;
        tracing::info!(
            match_id = c.match_id(),
            startup_end = c.startup_end_chunk_id,
            match_start = c.match_start_chunk_id,
            featured = c.featured,
            interest_score = c.interest_score,
            "match started, streaming"
        );
        self.rearm(Duration::ZERO)
    }

    async fn poll_chunks(&mut self) -> Step {
        let info = match self.api.last_chunk_info().await {
            Ok(i) => i,
            Err(e) => return self.poll_failed("last chunk info", &e),
        };
        let too_high = [info.chunk_id, info.key_frame_id]
            .into_iter()
            .find(|&id| id > i64::from(MAX_SEGMENT_ID));
        if let Some(id) = too_high {
            return self.poll_failed("last chunk info", &FetchError::IdOutOfRange(id));
        }
        self.schedule_new_segments(&info);

        let last_chunk = self.capture.last_chunk_id;
        let is_done = last_chunk != 0 && i64::from(last_chunk) == info.end_game_chunk_id;
        if !is_done {
            self.capture.meta_errors = 0;
            let wait = u64::from(info.next_available_chunk) + self.cfg.chunk_slack_ms;
            return self.rearm(Duration::from_millis(wait));
        }
        self.capture.final_chunk_id = Some(last_chunk);

        let in_flight = self.downloads.progress.in_flight();
        if in_flight > 0 {
            if self.capture.stall_cycles < self.cfg.max_drain_waits {
                self.capture.stall_cycles += 1;
                tracing::info!(
                    match_id = self.capture.match_id(),
                    in_flight,
                    stall_cycles = self.capture.stall_cycles,
                    "waiting for downloads to drain"
                );
                return self.rearm(self.cfg.drain_wait());
            }
            tracing::warn!(
                match_id = self.capture.match_id(),
                in_flight,
                "continuing after {} drain waits",
                self.capture.stall_cycles
            );
        }

        match self.api.game_meta_data().await {
            Ok(meta) if meta.game_ended => {
                self.capture.meta_errors = 0;
                self.capture.state = CaptureState::Finalizing;
                tracing::info!(match_id = self.capture.match_id(), "match ended, finalizing");
                Step::Finalize
            }
            Ok(_) => {
                self.capture.meta_errors = 0;
                tracing::warn!(
                    match_id = self.capture.match_id(),
                    "last chunk available but match not ended"
                );
                self.rearm(self.cfg.error_retry())
            }
            Err(e) => self.poll_failed("game metadata", &e),
        }
    }

    /// Advances the last-seen ids and starts one download per newly seen id.
    fn schedule_new_segments(&mut self, info: &ChunkInfo) {
        for (kind, reported) in [
            (SegmentKind::Keyframe, info.key_frame_id),
            (SegmentKind::Chunk, info.chunk_id),
        ] {
            let prev = self.capture.last_seen(kind);
            let next = prev.max(clamp_id(reported));
            for id in prev + 1..=next {
                spawn_download(&self.downloads, kind, id);
            }
            match kind {
                SegmentKind::Keyframe => self.capture.last_keyframe_id = next,
                SegmentKind::Chunk => self.capture.last_chunk_id = next,
            }
            if next > prev {
                tracing::debug!(%kind, from = prev + 1, to = next, "scheduled downloads");
            }
        }
    }

    fn poll_failed(&mut self, what: &str, e: &FetchError) -> Step {
        self.capture.meta_errors += 1;
        tracing::warn!(
            match_id = self.capture.match_id(),
            meta_errors = self.capture.meta_errors,
            kind = ?crate::retry::classify(e),
            "{} request failed: {}",
            what,
            e
        );
        self.rearm(self.cfg.error_retry())
    }

    /// Arms the next poll unless the error budget is spent.
    fn rearm(&mut self, delay: Duration) -> Step {
        if self.capture.meta_errors > self.cfg.max_meta_errors {
            self.capture.state = CaptureState::Canceled;
            tracing::warn!(
                match_id = self.capture.match_id(),
                meta_errors = self.capture.meta_errors,
                "capture canceled"
            );
            return Step::Canceled;
        }
        Step::Rearm(delay)
    }
}

fn clamp_id(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}
