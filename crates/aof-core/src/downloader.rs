//! Segment downloader: one keyframe or chunk, retried with linear backoff,
//! stored in the segment cache and recorded in the capture's tables.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::capture::progress::{CaptureProgress, InFlightGuard};
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::segment::{SegmentKind, SlotState};
use crate::spectator::SpectatorApi;
use crate::storage::{CacheKey, SegmentCache};

/// Everything a download task needs; shared by all downloads of one capture.
pub struct DownloadContext {
    pub api: Arc<dyn SpectatorApi>,
    pub cache: SegmentCache,
    pub policy: RetryPolicy,
    pub region_id: u8,
    pub match_id: u64,
    pub progress: Arc<CaptureProgress>,
}

impl DownloadContext {
    fn key(&self, kind: SegmentKind, id: u32) -> CacheKey {
        CacheKey {
            region_id: self.region_id,
            match_id: self.match_id,
            kind,
            id,
        }
    }
}

/// Counts `(kind, id)` as in flight and downloads it on a new task.
///
/// The in-flight counter is incremented before this returns and decremented
/// when the task ends, whatever the outcome.
pub fn spawn_download(ctx: &Arc<DownloadContext>, kind: SegmentKind, id: u32) -> JoinHandle<SlotState> {
    let guard = InFlightGuard::begin(&ctx.progress, kind, id);
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let _guard = guard;
        download_segment(&ctx, kind, id).await
    })
}

/// Fetches one segment until it succeeds or the retry budget is spent.
///
/// On success the payload is cached and the slot marked downloaded; otherwise
/// the slot is marked failed for good. Never returns an error: a lost segment
/// only clears the container's `complete` flag. Once the capture is closed no
/// further request is made and nothing is left in the cache.
pub async fn download_segment(ctx: &DownloadContext, kind: SegmentKind, id: u32) -> SlotState {
    let key = ctx.key(kind, id);
    let outcome = run_with_retry(&ctx.policy, |attempt| {
        let key = &key;
        async move {
            if ctx.progress.is_closed() {
                return Err(FetchError::Closed);
            }
            tracing::debug!(
                region = ctx.region_id,
                match_id = ctx.match_id,
                %kind,
                id,
                attempt,
                "downloading segment"
            );
            let data = ctx.api.segment(kind, id).await?;
            let len = data.len();
            if ctx.progress.is_closed() {
                return Err(FetchError::Closed);
            }
            ctx.cache.put(key, data).await.map_err(FetchError::Storage)?;
            // finalize may have purged between the check and the write
            if ctx.progress.is_closed() {
                ctx.cache.remove(key).await.map_err(FetchError::Storage)?;
                return Err(FetchError::Closed);
            }
            Ok(len)
        }
    })
    .await;

    let mut table = ctx.progress.table(kind);
    match outcome.result {
        Ok(len) => {
            let len = u32::try_from(len).unwrap_or(u32::MAX);
            table.mark_downloaded(id, len);
            tracing::info!(
                "downloaded {} after {} attempt(s), {} bytes",
                key.file_name(),
                outcome.attempts,
                len
            );
        }
        Err(e) => {
            table.mark_failed(id);
            tracing::warn!(
                attempts = outcome.attempts,
                "giving up on {}: {}",
                key.file_name(),
                e
            );
        }
    }
    table.state(id).unwrap_or(SlotState::Failed)
}
