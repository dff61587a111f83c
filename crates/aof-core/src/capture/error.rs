use thiserror::Error;

use crate::container::ContainerError;

/// Reasons a capture cannot be started.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("unknown region id {0}")]
    UnknownRegion(u8),

    #[error(transparent)]
    ClientVersion(#[from] ContainerError),

    #[error("encryption key is not valid base64: {0}")]
    Key(#[from] base64::DecodeError),

    #[error("encryption key is {0} bytes, at most 255 allowed")]
    KeyTooLong(usize),

    #[error("roster has {0} players, at most 255 allowed")]
    RosterTooLarge(usize),

    #[error("match {region_id}-{match_id} is already being captured")]
    AlreadyRunning { region_id: u8, match_id: u64 },
}
