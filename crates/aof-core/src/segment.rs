//! Keyframe / chunk identities and the per-capture segment tables.

use std::collections::BTreeMap;
use std::fmt;

/// The two kinds of opaque segments the spectator service publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    /// Periodic full-state snapshot.
    Keyframe,
    /// Incremental update between keyframes.
    Chunk,
}

impl SegmentKind {
    /// Spectator endpoint serving this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            SegmentKind::Keyframe => "getKeyFrame",
            SegmentKind::Chunk => "getGameDataChunk",
        }
    }

    /// One-letter tag used in cache file names.
    pub fn tag(self) -> char {
        match self {
            SegmentKind::Keyframe => 'K',
            SegmentKind::Chunk => 'C',
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Keyframe => f.write_str("keyframe"),
            SegmentKind::Chunk => f.write_str("chunk"),
        }
    }
}

/// State of one requested segment. Ids that were never requested have no slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Requested, download still running.
    Requested,
    /// Stored in the segment cache with this many bytes.
    Downloaded { len: u32 },
    /// Gave up after exhausting the retry budget.
    Failed,
}

/// Sparse table of segment ids (1..N) for one kind.
#[derive(Debug, Clone)]
pub struct SegmentTable {
    kind: SegmentKind,
    slots: BTreeMap<u32, SlotState>,
}

impl SegmentTable {
    pub fn new(kind: SegmentKind) -> Self {
        SegmentTable {
            kind,
            slots: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn mark_requested(&mut self, id: u32) {
        self.slots.insert(id, SlotState::Requested);
    }

    pub fn mark_downloaded(&mut self, id: u32, len: u32) {
        self.slots.insert(id, SlotState::Downloaded { len });
    }

    /// Marks `id` failed unless it already downloaded.
    pub fn mark_failed(&mut self, id: u32) {
        let slot = self.slots.entry(id).or_insert(SlotState::Failed);
        if !matches!(slot, SlotState::Downloaded { .. }) {
            *slot = SlotState::Failed;
        }
    }

    pub fn state(&self, id: u32) -> Option<SlotState> {
        self.slots.get(&id).copied()
    }

    /// Downloaded ids with their lengths, ascending.
    pub fn downloaded(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.slots.iter().filter_map(|(&id, s)| match s {
            SlotState::Downloaded { len } => Some((id, *len)),
            _ => None,
        })
    }

    pub fn downloaded_count(&self) -> usize {
        self.downloaded().count()
    }

    pub fn failed_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, SlotState::Failed))
            .count()
    }

    /// True if every id in `[1, last_seen]` is downloaded (vacuously true for 0).
    pub fn complete_through(&self, last_seen: u32) -> bool {
        let present = self
            .slots
            .range(1..=last_seen.max(1))
            .filter(|(_, s)| matches!(s, SlotState::Downloaded { .. }))
            .count();
        last_seen == 0 || present == last_seen as usize
    }
}
