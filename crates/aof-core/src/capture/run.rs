//! Timer loop around [`CaptureDriver::step`].

use anyhow::Result;
use std::path::Path;
use tokio::sync::watch;

use super::machine::{CaptureDriver, Step};
use super::registry::CaptureOutcome;
use super::{container_path, finalize, CaptureState, CaptureStatus};
use crate::storage::SegmentCache;

/// Drives a capture to a terminal state.
///
/// Exactly one poll is pending at a time; downloads started by a poll run on
/// their own tasks. After every poll the current status is published on
/// `status` when given. Finalize errors are returned and leave the capture in
/// `Finalizing`.
pub async fn run_capture(
    driver: &mut CaptureDriver,
    cache: &SegmentCache,
    replay_dir: &Path,
    status: Option<&watch::Sender<CaptureStatus>>,
) -> Result<CaptureOutcome> {
    let publish = |d: &CaptureDriver| {
        if let Some(tx) = status {
            tx.send_replace(d.capture().status());
        }
    };
    loop {
        let step = driver.step().await;
        publish(driver);
        match step {
            Step::Rearm(delay) => tokio::time::sleep(delay).await,
            Step::Canceled => {
                return Ok(CaptureOutcome::Canceled {
                    meta_errors: driver.capture().meta_errors(),
                })
            }
            Step::Finished => {
                let capture = driver.capture();
                return Ok(CaptureOutcome::Done {
                    path: container_path(replay_dir, capture),
                    complete: capture.is_complete(),
                });
            }
            Step::Finalize => {
                let (path, complete) = finalize(driver.capture(), cache, replay_dir).await?;
                driver.set_state(CaptureState::Done);
                publish(driver);
                return Ok(CaptureOutcome::Done { path, complete });
            }
        }
    }
}
