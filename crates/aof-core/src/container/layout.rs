//! Per-version field widths.

use super::error::ContainerError;
use super::CURRENT_VERSION;

/// How segment ids are stored in the keyframe / chunk sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IdField {
    /// `u8` per entry (before version 11).
    Narrow,
    /// Not stored; ids are `1..=count` in file order (version 11).
    Elided,
    /// `u16` per entry (version 12).
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Layout {
    /// Match id stored as two `u32` halves instead of one `u32`.
    pub split_match_id: bool,
    /// Segment counts are `u16` instead of `u8`.
    pub wide_counts: bool,
    pub ids: IdField,
}

impl Layout {
    pub fn for_version(version: u8) -> Result<Layout, ContainerError> {
        let layout = match version {
            0..=8 => Layout {
                split_match_id: false,
                wide_counts: false,
                ids: IdField::Narrow,
            },
            9 | 10 => Layout {
                split_match_id: true,
                wide_counts: false,
                ids: IdField::Narrow,
            },
            11 => Layout {
                split_match_id: true,
                wide_counts: true,
                ids: IdField::Elided,
            },
            CURRENT_VERSION => Layout {
                split_match_id: true,
                wide_counts: true,
                ids: IdField::Wide,
            },
            _ => return Err(ContainerError::UnsupportedVersion { version }),
        };
        Ok(layout)
    }

    pub fn match_id_len(&self) -> usize {
        if self.split_match_id {
            8
        } else {
            4
        }
    }

    pub fn count_len(&self) -> usize {
        if self.wide_counts {
            2
        } else {
            1
        }
    }

    pub fn max_count(&self) -> u64 {
        if self.wide_counts {
            u64::from(u16::MAX)
        } else {
            u64::from(u8::MAX)
        }
    }

    pub fn id_len(&self) -> usize {
        match self.ids {
            IdField::Narrow => 1,
            IdField::Elided => 0,
            IdField::Wide => 2,
        }
    }

    pub fn max_match_id(&self) -> u64 {
        if self.split_match_id {
            u64::MAX
        } else {
            u64::from(u32::MAX)
        }
    }
}
