//! Versioned binary replay container (`.aof`).
//!
//! A container holds everything needed to impersonate the spectator service
//! for one match: header fields, the player roster and the captured keyframes
//! and chunks. All integers are big-endian. The current layout is version 12;
//! older layouts are still readable (see [`decode`]).

mod decode;
mod encode;
mod error;
mod layout;

pub use decode::{decode, DecodeWarning, Decoded};
pub use encode::{encode, encode_as, encoded_len};
pub use error::ContainerError;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::segment::SegmentKind;
use crate::storage;

/// Format version written by this crate.
pub const CURRENT_VERSION: u8 = 12;

/// Container file extension.
pub const EXTENSION: &str = "aof";

/// Game client version the match was played on (`major.minor.patch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl ClientVersion {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        ClientVersion {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ClientVersion {
    type Err = ContainerError;

    /// Parses `"6.2.1"`; trailing parts (`"6.2.1.33"`) are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContainerError::InvalidClientVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u8, ContainerError> {
            parts
                .next()
                .and_then(|p| p.trim().parse::<u8>().ok())
                .ok_or_else(invalid)
        };
        Ok(ClientVersion {
            major: next()?,
            minor: next()?,
            patch: next()?,
        })
    }
}

/// One participant of the captured match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: i32,
    /// Display name, at most 255 bytes of UTF-8.
    pub name: String,
    pub team: u8,
    pub league_id: u8,
    pub league_rank: u8,
    pub champion_id: i32,
    pub ability_d_id: i32,
    pub ability_f_id: i32,
}

/// Ordered, sparse set of segments of one kind. Ids are unique; gaps mean the
/// segment was lost during capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentCollection {
    entries: BTreeMap<u16, Bytes>,
}

impl SegmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a segment, returning the previous payload for that id if any.
    pub fn insert(&mut self, id: u16, data: Bytes) -> Option<Bytes> {
        self.entries.insert(id, data)
    }

    pub fn get(&self, id: u16) -> Option<&Bytes> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(id, payload)` in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Bytes)> + '_ {
        self.entries.iter().map(|(id, b)| (*id, b))
    }

    pub fn first_id(&self) -> Option<u16> {
        self.entries.keys().next().copied()
    }

    pub fn last_id(&self) -> Option<u16> {
        self.entries.keys().next_back().copied()
    }

    /// Sum of payload lengths.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(Bytes::len).sum()
    }

    /// True when ids are exactly `1..=len`.
    pub fn is_sequential(&self) -> bool {
        self.entries
            .keys()
            .enumerate()
            .all(|(i, id)| usize::from(*id) == i + 1)
    }
}

impl FromIterator<(u16, Bytes)> for SegmentCollection {
    fn from_iter<I: IntoIterator<Item = (u16, Bytes)>>(iter: I) -> Self {
        SegmentCollection {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A finalized capture: what the codec writes and the playback server serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchContainer {
    pub version: u8,
    pub region_id: u8,
    pub match_id: u64,
    pub client_version: ClientVersion,
    /// Decoded key material (not the base64 text the service hands out).
    pub key: Bytes,
    /// No keyframe or chunk was lost during capture.
    pub complete: bool,
    pub startup_end_chunk_id: u8,
    pub match_start_chunk_id: u8,
    pub players: Vec<PlayerRecord>,
    pub keyframes: SegmentCollection,
    pub chunks: SegmentCollection,
}

impl MatchContainer {
    pub fn segments(&self, kind: SegmentKind) -> &SegmentCollection {
        match kind {
            SegmentKind::Keyframe => &self.keyframes,
            SegmentKind::Chunk => &self.chunks,
        }
    }

    /// Highest chunk id present; the chunk the match ended on.
    pub fn final_chunk_id(&self) -> Option<u16> {
        self.chunks.last_id()
    }

    /// Key material in the base64 form the game client expects on its command line.
    pub fn key_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.key)
    }
}

/// Encode `container` in its own format version and write it atomically to `path`.
pub fn save(path: &Path, container: &MatchContainer) -> Result<()> {
    let data = encode(container)
        .with_context(|| format!("encoding container for {}", path.display()))?;
    storage::write_atomic(path, &data)
        .with_context(|| format!("failed to write container {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        bytes = data.len(),
        version = container.version,
        sha256 = %crate::checksum::sha256_bytes(&data),
        "container written"
    );
    Ok(())
}

/// Read and decode the container at `path`. Warnings are logged and returned.
pub fn load(path: &Path) -> Result<Decoded> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read container {}", path.display()))?;
    let decoded = decode(Bytes::from(data))
        .with_context(|| format!("failed to decode container {}", path.display()))?;
    for w in &decoded.warnings {
        tracing::warn!(path = %path.display(), "{}", w);
    }
    let c = &decoded.container;
    tracing::info!(
        "opened container {} containing {}-{} @ {}",
        path.display(),
        c.region_id,
        c.match_id,
        c.client_version
    );
    Ok(decoded)
}
