use thiserror::Error;

use crate::segment::SegmentKind;

/// Errors produced while encoding or decoding a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Version byte this crate cannot read or write.
    #[error("unsupported container version {version}")]
    UnsupportedVersion { version: u8 },

    /// Input ended before `field` could be read.
    #[error("truncated container: {field} needs {needed} bytes at offset {offset}, {available} left")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A container must hold at least one chunk; the last chunk id marks the end of the match.
    #[error("container has no chunks")]
    NoChunks,

    #[error("duplicate {kind} id {id}")]
    DuplicateSegment { kind: SegmentKind, id: u16 },

    #[error("{kind} {id} has negative length {length}")]
    NegativeLength { kind: SegmentKind, id: u16, length: i32 },

    /// A value does not fit the width of its on-disk field.
    #[error("{field} value {value} exceeds format limit {max}")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Version 11 does not store ids, so only `1..=n` can be written.
    #[error("version 11 cannot store non-sequential {kind} ids")]
    NonSequentialIds { kind: SegmentKind },

    #[error("invalid client version {0:?}, expected major.minor.patch")]
    InvalidClientVersion(String),
}
