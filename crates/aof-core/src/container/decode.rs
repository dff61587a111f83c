//! Container reader for every known format version.

use bytes::Bytes;
use std::fmt;

use super::error::ContainerError;
use super::layout::{IdField, Layout};
use super::{ClientVersion, MatchContainer, PlayerRecord, SegmentCollection};
use crate::segment::SegmentKind;

/// Something odd about a container that still decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// Written before version 8; read with the version 8 layout.
    Legacy { version: u8 },
    /// Version 9 was written by a broken build; fields may be wrong.
    Corrupt { version: u8 },
    /// Bytes left over after the chunk section.
    TrailingBytes { count: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::Legacy { version } => {
                write!(f, "legacy container version {version}, read as version 8")
            }
            DecodeWarning::Corrupt { version } => {
                write!(f, "container version {version} is known to be corrupt, best-effort read")
            }
            DecodeWarning::TrailingBytes { count } => {
                write!(f, "{count} trailing bytes after chunk section ignored")
            }
        }
    }
}

/// Result of a successful decode.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub container: MatchContainer,
    pub warnings: Vec<DecodeWarning>,
}

/// Bounds-checked big-endian cursor. Payload slices share `data`'s buffer.
struct Reader {
    data: Bytes,
    pos: usize,
}

impl Reader {
    fn new(data: Bytes) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<Bytes, ContainerError> {
        if self.remaining() < n {
            return Err(ContainerError::Truncated {
                field,
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let out = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ContainerError> {
        let b = self.take(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&b);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, ContainerError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, ContainerError> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ContainerError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, ContainerError> {
        Ok(i32::from_be_bytes(self.array(field)?))
    }
}

/// Decode a container of any supported version.
///
/// Versions above 12 are rejected. A container without chunks is rejected
/// because the last chunk id is what playback treats as the end of the match.
pub fn decode(data: Bytes) -> Result<Decoded, ContainerError> {
    let mut r = Reader::new(data);
    let mut warnings = Vec::new();

    let version = r.u8("version")?;
    let layout = Layout::for_version(version)?;
    match version {
        0..=7 => warnings.push(DecodeWarning::Legacy { version }),
        9 => warnings.push(DecodeWarning::Corrupt { version }),
        _ => {}
    }

    let region_id = r.u8("region id")?;
    let match_id = if layout.split_match_id {
        let high = r.u32("match id high")?;
        let low = r.u32("match id low")?;
        (u64::from(high) << 32) | u64::from(low)
    } else {
        u64::from(r.u32("match id")?)
    };
    let client_version = ClientVersion::new(
        r.u8("client major")?,
        r.u8("client minor")?,
        r.u8("client patch")?,
    );
    let key_len = r.u8("key length")?;
    let key = r.take("key", usize::from(key_len))?;
    let complete = r.u8("complete flag")? != 0;
    let startup_end_chunk_id = r.u8("startup end chunk id")?;
    let match_start_chunk_id = r.u8("match start chunk id")?;

    let player_count = r.u8("player count")?;
    let mut players = Vec::with_capacity(usize::from(player_count));
    for _ in 0..player_count {
        players.push(read_player(&mut r)?);
    }

    let keyframes = read_segments(&mut r, &layout, SegmentKind::Keyframe)?;
    let chunks = read_segments(&mut r, &layout, SegmentKind::Chunk)?;
    if chunks.is_empty() {
        return Err(ContainerError::NoChunks);
    }

    if r.remaining() > 0 {
        warnings.push(DecodeWarning::TrailingBytes {
            count: r.remaining(),
        });
    }

    Ok(Decoded {
        container: MatchContainer {
            version,
            region_id,
            match_id,
            client_version,
            key,
            complete,
            startup_end_chunk_id,
            match_start_chunk_id,
            players,
            keyframes,
            chunks,
        },
        warnings,
    })
}

fn read_player(r: &mut Reader) -> Result<PlayerRecord, ContainerError> {
    let id = r.i32("player id")?;
    let name_len = r.u8("player name length")?;
    let name = r.take("player name", usize::from(name_len))?;
    Ok(PlayerRecord {
        id,
        name: String::from_utf8_lossy(&name).into_owned(),
        team: r.u8("player team")?,
        league_id: r.u8("player league id")?,
        league_rank: r.u8("player league rank")?,
        champion_id: r.i32("player champion id")?,
        ability_d_id: r.i32("player ability d")?,
        ability_f_id: r.i32("player ability f")?,
    })
}

fn read_segments(
    r: &mut Reader,
    layout: &Layout,
    kind: SegmentKind,
) -> Result<SegmentCollection, ContainerError> {
    let count = if layout.wide_counts {
        r.u16("segment count")?
    } else {
        u16::from(r.u8("segment count")?)
    };
    let mut out = SegmentCollection::new();
    for n in 1..=count {
        let id = match layout.ids {
            IdField::Narrow => u16::from(r.u8("segment id")?),
            IdField::Elided => n,
            IdField::Wide => r.u16("segment id")?,
        };
        let length = r.i32("segment length")?;
        if length < 0 {
            return Err(ContainerError::NegativeLength { kind, id, length });
        }
        let data = r.take("segment data", length as usize)?;
        if out.insert(id, data).is_some() {
            return Err(ContainerError::DuplicateSegment { kind, id });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{encode, encode_as, CURRENT_VERSION};

    fn container(version: u8) -> MatchContainer {
        MatchContainer {
            version,
            region_id: 3,
            match_id: 2_000_000_001,
            client_version: ClientVersion::new(6, 3, 2),
            key: Bytes::from_static(&[9; 32]),
            complete: false,
            startup_end_chunk_id: 2,
            match_start_chunk_id: 4,
            players: vec![PlayerRecord {
                id: 42,
                name: "Zoë".into(),
                team: 200,
                league_id: 5,
                league_rank: 1,
                champion_id: 103,
                ability_d_id: 4,
                ability_f_id: 7,
            }],
            keyframes: [(1, Bytes::from_static(b"kf1")), (2, Bytes::from_static(b"kf2"))]
                .into_iter()
                .collect(),
            chunks: [
                (1, Bytes::from_static(b"c1")),
                (2, Bytes::from_static(b"")),
                (3, Bytes::from_static(b"c3")),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn current_version_with_gaps_and_wide_match_id() {
        let mut c = container(CURRENT_VERSION);
        c.match_id = u64::MAX - 7;
        c.chunks.insert(900, Bytes::from_static(b"late"));
        let d = decode(encode(&c).unwrap()).unwrap();
        assert_eq!(d.container, c);
        assert!(d.warnings.is_empty());
        assert_eq!(d.container.final_chunk_id(), Some(900));
    }

    #[test]
    fn every_readable_version_decodes() {
        for version in [0u8, 7, 8, 10, 11, 12] {
            let c = container(version);
            let d = decode(encode_as(&c, version).unwrap()).unwrap();
            assert_eq!(d.container, c, "version {version}");
        }
    }

    #[test]
    fn legacy_versions_warn() {
        let d = decode(encode_as(&container(5), 5).unwrap()).unwrap();
        assert_eq!(d.warnings, vec![DecodeWarning::Legacy { version: 5 }]);
        let d = decode(encode_as(&container(8), 8).unwrap()).unwrap();
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn version_9_is_read_best_effort_with_warning() {
        // same field widths as version 10
        let mut bytes = encode_as(&container(10), 10).unwrap().to_vec();
        bytes[0] = 9;
        let d = decode(Bytes::from(bytes)).unwrap();
        assert_eq!(d.warnings, vec![DecodeWarning::Corrupt { version: 9 }]);
        assert_eq!(d.container.version, 9);
        assert_eq!(d.container.match_id, 2_000_000_001);
        assert_eq!(d.container.chunks.len(), 3);
    }

    #[test]
    fn version_11_does_not_consume_an_id_byte() {
        let c = container(11);
        let bytes = encode_as(&c, 11).unwrap();
        assert_eq!(decode(bytes.clone()).unwrap().container, c);

        // A file carrying one stray byte before each entry's length would
        // misalign here; it must not decode to the same container.
        let mut padded = Vec::new();
        let segments_at = bytes.len()
            - (2 + c.keyframes.len() * 4 + c.keyframes.total_bytes())
            - (2 + c.chunks.len() * 4 + c.chunks.total_bytes());
        padded.extend_from_slice(&bytes[..segments_at]);
        for coll in [&c.keyframes, &c.chunks] {
            padded.extend_from_slice(&(coll.len() as u16).to_be_bytes());
            for (id, data) in coll.iter() {
                padded.push(id as u8);
                padded.extend_from_slice(&(data.len() as i32).to_be_bytes());
                padded.extend_from_slice(data);
            }
        }
        match decode(Bytes::from(padded)) {
            Ok(d) => assert_ne!(d.container, c),
            Err(_) => {}
        }
    }

    #[test]
    fn unsupported_version_reports_number() {
        let mut bytes = encode(&container(12)).unwrap().to_vec();
        bytes[0] = 13;
        assert!(matches!(
            decode(Bytes::from(bytes)),
            Err(ContainerError::UnsupportedVersion { version: 13 })
        ));
    }

    #[test]
    fn truncation_names_the_field() {
        let bytes = encode(&container(12)).unwrap();
        let cut = bytes.slice(..bytes.len() - 1);
        assert!(matches!(
            decode(cut),
            Err(ContainerError::Truncated { field: "segment data", .. })
        ));
        assert!(matches!(
            decode(Bytes::new()),
            Err(ContainerError::Truncated { field: "version", offset: 0, .. })
        ));
    }

    #[test]
    fn no_chunks_encodes_but_does_not_decode() {
        let mut c = container(12);
        c.chunks = SegmentCollection::new();
        let bytes = encode(&c).unwrap();
        assert!(matches!(decode(bytes), Err(ContainerError::NoChunks)));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let c = container(12);
        let mut bytes = encode(&c).unwrap().to_vec();
        // rewrite the last chunk's id (3) to 1
        let last = bytes.len() - (2 + 4 + 2);
        assert_eq!(&bytes[last..last + 2], &[0, 3]);
        bytes[last + 1] = 1;
        assert!(matches!(
            decode(Bytes::from(bytes)),
            Err(ContainerError::DuplicateSegment { kind: SegmentKind::Chunk, id: 1 })
        ));
    }

    #[test]
    fn negative_length_rejected() {
        let c = container(12);
        let mut bytes = encode(&c).unwrap().to_vec();
        let len_at = bytes.len() - (4 + 2);
        bytes[len_at..len_at + 4].copy_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            decode(Bytes::from(bytes)),
            Err(ContainerError::NegativeLength { length: -1, .. })
        ));
    }

    #[test]
    fn trailing_bytes_warn() {
        let mut bytes = encode(&container(12)).unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0]);
        let d = decode(Bytes::from(bytes)).unwrap();
        assert_eq!(d.warnings, vec![DecodeWarning::TrailingBytes { count: 2 }]);
    }

    #[test]
    fn invalid_utf8_name_is_replaced() {
        let mut c = container(12);
        c.players[0].name = "ab".into();
        let mut bytes = encode(&c).unwrap().to_vec();
        let at = bytes.windows(2).position(|w| w == b"ab").unwrap();
        bytes[at] = 0xFF;
        let d = decode(Bytes::from(bytes)).unwrap();
        assert_eq!(d.container.players[0].name, "\u{FFFD}b");
    }
}
