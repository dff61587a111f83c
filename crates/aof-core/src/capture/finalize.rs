//! Turn a finished capture into a container file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::MatchCapture;
use crate::container::{self, ContainerError, MatchContainer, SegmentCollection, CURRENT_VERSION};
use crate::segment::SegmentKind;
use crate::storage::{CacheKey, SegmentCache};

/// `{replay_dir}/{SHORT}-{matchId}.aof`
pub fn container_path(replay_dir: &Path, capture: &MatchCapture) -> PathBuf {
    replay_dir.join(format!(
        "{}-{}.{}",
        capture.region().short_name,
        capture.match_id(),
        container::EXTENSION
    ))
}

/// Build the container from the cached segments, write it, then purge the
/// cache for this match. Returns the written path and the `complete` flag.
///
/// Any read or write failure is returned; no partial container is left behind.
pub async fn finalize(
    capture: &MatchCapture,
    cache: &SegmentCache,
    replay_dir: &Path,
) -> Result<(PathBuf, bool)> {
    let container = build_container(capture, cache).await?;
    let complete = container.complete;

    tokio::fs::create_dir_all(replay_dir)
        .await
        .with_context(|| format!("failed to create replay dir {}", replay_dir.display()))?;
    let path = container_path(replay_dir, capture);
    let write_path = path.clone();
    tokio::task::spawn_blocking(move || container::save(&write_path, &container))
        .await
        .context("container write task failed")??;

    capture.progress().close();
    let region_id = capture.region().id;
    match cache.purge(region_id, capture.match_id()).await {
        Ok(n) => tracing::debug!(removed = n, "purged segment cache"),
        Err(e) => tracing::warn!("failed to purge segment cache: {}", e),
    }
    tracing::info!(
        path = %path.display(),
        complete,
        "capture of {}-{} finished",
        capture.region().short_name,
        capture.match_id()
    );
    Ok((path, complete))
}

async fn build_container(capture: &MatchCapture, cache: &SegmentCache) -> Result<MatchContainer> {
    let keyframes = collect(capture, cache, SegmentKind::Keyframe).await?;
    let chunks = collect(capture, cache, SegmentKind::Chunk).await?;
    Ok(MatchContainer {
        version: CURRENT_VERSION,
        region_id: capture.region().id,
        match_id: capture.match_id(),
        client_version: capture.client_version(),
        key: capture.key().clone(),
        complete: capture.is_complete(),
        startup_end_chunk_id: narrow("startup end chunk id", capture.startup_end_chunk_id())?,
        match_start_chunk_id: narrow("match start chunk id", capture.match_start_chunk_id())?,
        players: capture.roster().to_vec(),
        keyframes,
        chunks,
    })
}

async fn collect(
    capture: &MatchCapture,
    cache: &SegmentCache,
    kind: SegmentKind,
) -> Result<SegmentCollection> {
    let downloaded: Vec<(u32, u32)> = capture.progress().snapshot(kind).downloaded().collect();
    let mut out = SegmentCollection::new();
    for (id, len) in downloaded {
        let key = CacheKey {
            region_id: capture.region().id,
            match_id: capture.match_id(),
            kind,
            id,
        };
        let data = cache
            .get(&key)
            .await
            .with_context(|| format!("failed to read cached {}", key.file_name()))?;
        if data.len() != len as usize {
            tracing::warn!(
                "cached {} is {} bytes, expected {}",
                key.file_name(),
                data.len(),
                len
            );
        }
        let id = u16::try_from(id).map_err(|_| ContainerError::FieldOverflow {
            field: "segment id",
            value: u64::from(id),
            max: u64::from(u16::MAX),
        })?;
        out.insert(id, data);
    }
    Ok(out)
}

fn narrow(field: &'static str, v: u32) -> Result<u8, ContainerError> {
    u8::try_from(v).map_err(|_| ContainerError::FieldOverflow {
        field,
        value: u64::from(v),
        max: u64::from(u8::MAX),
    })
}
