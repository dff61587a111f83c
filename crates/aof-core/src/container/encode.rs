//! Container writer. The full output size is computed up front and the bytes
//! are written into one pre-sized buffer.

use bytes::{BufMut, Bytes, BytesMut};

use super::error::ContainerError;
use super::layout::{IdField, Layout};
use super::{MatchContainer, PlayerRecord, SegmentCollection};
use crate::segment::SegmentKind;

/// Fixed bytes per player besides the name: id, name length, team, league id,
/// league rank, champion, two abilities.
const PLAYER_FIXED_LEN: usize = 4 + 1 + 3 + 4 * 3;

/// Encode `container` in its own `version` field's layout.
pub fn encode(container: &MatchContainer) -> Result<Bytes, ContainerError> {
    encode_as(container, container.version)
}

/// Encode `container` using the layout of `version`.
///
/// Version 9 is a known-corrupt layout and is never written. Version 8 and
/// older cannot hold match ids above `u32::MAX`; version 11 cannot hold gaps.
pub fn encode_as(container: &MatchContainer, version: u8) -> Result<Bytes, ContainerError> {
    if version == 9 {
        return Err(ContainerError::UnsupportedVersion { version });
    }
    let layout = Layout::for_version(version)?;
    validate(container, &layout)?;

    let len = encoded_len_with(container, &layout);
    let mut buf = BytesMut::with_capacity(len);

    buf.put_u8(version);
    buf.put_u8(container.region_id);
    if layout.split_match_id {
        buf.put_u32((container.match_id >> 32) as u32);
        buf.put_u32(container.match_id as u32);
    } else {
        buf.put_u32(container.match_id as u32);
    }
    buf.put_u8(container.client_version.major);
    buf.put_u8(container.client_version.minor);
    buf.put_u8(container.client_version.patch);
    buf.put_u8(container.key.len() as u8);
    buf.put_slice(&container.key);
    buf.put_u8(u8::from(container.complete));
    buf.put_u8(container.startup_end_chunk_id);
    buf.put_u8(container.match_start_chunk_id);

    buf.put_u8(container.players.len() as u8);
    for p in &container.players {
        put_player(&mut buf, p);
    }

    put_segments(&mut buf, &layout, &container.keyframes);
    put_segments(&mut buf, &layout, &container.chunks);

    debug_assert_eq!(buf.len(), len);
    Ok(buf.freeze())
}

/// Exact size of `encode(container)`.
pub fn encoded_len(container: &MatchContainer) -> Result<usize, ContainerError> {
    let layout = Layout::for_version(container.version)?;
    Ok(encoded_len_with(container, &layout))
}

fn encoded_len_with(container: &MatchContainer, layout: &Layout) -> usize {
    let header = 1 + 1 + layout.match_id_len() + 3 + 1 + container.key.len() + 3;
    let players: usize = 1 + container
        .players
        .iter()
        .map(|p| PLAYER_FIXED_LEN + p.name.len())
        .sum::<usize>();
    let section = |c: &SegmentCollection| {
        layout.count_len() + c.len() * (layout.id_len() + 4) + c.total_bytes()
    };
    header + players + section(&container.keyframes) + section(&container.chunks)
}

fn validate(container: &MatchContainer, layout: &Layout) -> Result<(), ContainerError> {
    check("match id", container.match_id, layout.max_match_id())?;
    check("key length", container.key.len() as u64, u64::from(u8::MAX))?;
    check("player count", container.players.len() as u64, u64::from(u8::MAX))?;
    for p in &container.players {
        check("player name length", p.name.len() as u64, u64::from(u8::MAX))?;
    }
    for kind in [SegmentKind::Keyframe, SegmentKind::Chunk] {
        let segments = container.segments(kind);
        check(count_field(kind), segments.len() as u64, layout.max_count())?;
        for (id, data) in segments.iter() {
            if layout.ids == IdField::Narrow {
                check(id_field(kind), u64::from(id), u64::from(u8::MAX))?;
            }
            check(length_field(kind), data.len() as u64, i32::MAX as u64)?;
        }
        if layout.ids == IdField::Elided && !segments.is_sequential() {
            return Err(ContainerError::NonSequentialIds { kind });
        }
    }
    Ok(())
}

fn check(field: &'static str, value: u64, max: u64) -> Result<(), ContainerError> {
    if value > max {
        return Err(ContainerError::FieldOverflow { field, value, max });
    }
    Ok(())
}

fn count_field(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Keyframe => "keyframe count",
        SegmentKind::Chunk => "chunk count",
    }
}

fn id_field(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Keyframe => "keyframe id",
        SegmentKind::Chunk => "chunk id",
    }
}

fn length_field(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Keyframe => "keyframe length",
        SegmentKind::Chunk => "chunk length",
    }
}

fn put_player(buf: &mut BytesMut, p: &PlayerRecord) {
    buf.put_i32(p.id);
    buf.put_u8(p.name.len() as u8);
    buf.put_slice(p.name.as_bytes());
    buf.put_u8(p.team);
    buf.put_u8(p.league_id);
    buf.put_u8(p.league_rank);
    buf.put_i32(p.champion_id);
    buf.put_i32(p.ability_d_id);
    buf.put_i32(p.ability_f_id);
}

fn put_segments(buf: &mut BytesMut, layout: &Layout, segments: &SegmentCollection) {
    if layout.wide_counts {
        buf.put_u16(segments.len() as u16);
    } else {
        buf.put_u8(segments.len() as u8);
    }
    for (id, data) in segments.iter() {
        match layout.ids {
            IdField::Narrow => buf.put_u8(id as u8),
            IdField::Elided => {}
            IdField::Wide => buf.put_u16(id),
        }
        buf.put_i32(data.len() as i32);
        buf.put_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ClientVersion, CURRENT_VERSION};

    fn sample() -> MatchContainer {
        MatchContainer {
            version: CURRENT_VERSION,
            region_id: 1,
            match_id: 0x0000_0001_0000_0002,
            client_version: ClientVersion::new(6, 2, 1),
            key: Bytes::from_static(&[0xAA, 0xBB]),
            complete: true,
            startup_end_chunk_id: 2,
            match_start_chunk_id: 4,
            players: vec![PlayerRecord {
                id: -1,
                name: "ab".into(),
                team: 100,
                league_id: 3,
                league_rank: 2,
                champion_id: 61,
                ability_d_id: 4,
                ability_f_id: 14,
            }],
            keyframes: [(1, Bytes::from_static(b"K"))].into_iter().collect(),
            chunks: [(2, Bytes::from_static(b"CC"))].into_iter().collect(),
        }
    }

    #[test]
    fn v12_byte_layout() {
        let bytes = encode(&sample()).unwrap();
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            12, 1,
            0, 0, 0, 1, 0, 0, 0, 2,
            6, 2, 1,
            2, 0xAA, 0xBB,
            1, 2, 4,
            1,
            0xFF, 0xFF, 0xFF, 0xFF, 2, b'a', b'b', 100, 3, 2,
            0, 0, 0, 61, 0, 0, 0, 4, 0, 0, 0, 14,
            0, 1, 0, 1, 0, 0, 0, 1, b'K',
            0, 1, 0, 2, 0, 0, 0, 2, b'C', b'C',
        ];
        assert_eq!(bytes.as_ref(), expected.as_slice());
        assert_eq!(encoded_len(&sample()).unwrap(), expected.len());
    }

    #[test]
    fn v8_rejects_wide_match_id() {
        let err = encode_as(&sample(), 8).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::FieldOverflow { field: "match id", .. }
        ));
        let mut narrow = sample();
        narrow.match_id = u64::from(u32::MAX);
        assert_eq!(encode_as(&narrow, 8).unwrap()[2..6], [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn v9_is_never_written() {
        assert!(matches!(
            encode_as(&sample(), 9),
            Err(ContainerError::UnsupportedVersion { version: 9 })
        ));
    }

    #[test]
    fn v11_requires_sequential_ids() {
        // chunks start at id 2
        assert!(matches!(
            encode_as(&sample(), 11),
            Err(ContainerError::NonSequentialIds { kind: SegmentKind::Chunk })
        ));
    }

    #[test]
    fn narrow_layout_rejects_large_ids() {
        let mut c = sample();
        c.chunks.insert(300, Bytes::from_static(b"x"));
        assert!(matches!(
            encode_as(&c, 10),
            Err(ContainerError::FieldOverflow { field: "chunk id", value: 300, .. })
        ));
        assert!(encode_as(&c, 12).is_ok());
    }

    #[test]
    fn long_player_name_rejected() {
        let mut c = sample();
        c.players[0].name = "x".repeat(256);
        assert!(matches!(
            encode(&c),
            Err(ContainerError::FieldOverflow { field: "player name length", .. })
        ));
    }
}
