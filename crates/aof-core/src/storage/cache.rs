//! Write-once segment cache keyed by `(region, match, kind, id)`.

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};

use crate::segment::SegmentKind;

/// Identity of one cached segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub region_id: u8,
    pub match_id: u64,
    pub kind: SegmentKind,
    pub id: u32,
}

impl CacheKey {
    /// File name inside the cache dir, e.g. `1-4242-C-7`.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.region_id,
            self.match_id,
            self.kind.tag(),
            self.id
        )
    }
}

/// Directory of downloaded segments. Each key is written at most once per
/// capture, so no locking is needed beyond the atomic rename.
#[derive(Debug, Clone)]
pub struct SegmentCache {
    dir: PathBuf,
}

impl SegmentCache {
    /// Open (and create if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(SegmentCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub async fn put(&self, key: &CacheKey, data: Bytes) -> io::Result<()> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || super::write_atomic(&path, &data))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
    }

    pub async fn get(&self, key: &CacheKey) -> io::Result<Bytes> {
        let data = tokio::fs::read(self.path_for(key)).await?;
        Ok(Bytes::from(data))
    }

    /// Remove one segment. A missing file is not an error.
    pub async fn remove(&self, key: &CacheKey) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Remove every cached segment of one match. Missing files are ignored.
    pub async fn purge(&self, region_id: u8, match_id: u64) -> io::Result<usize> {
        let prefix = format!("{}-{}-", region_id, match_id);
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kind: SegmentKind, id: u32) -> CacheKey {
        CacheKey {
            region_id: 1,
            match_id: 4242,
            kind,
            id,
        }
    }

    #[test]
    fn file_name_layout() {
        assert_eq!(key(SegmentKind::Chunk, 7).file_name(), "1-4242-C-7");
        assert_eq!(key(SegmentKind::Keyframe, 2).file_name(), "1-4242-K-2");
    }

    #[tokio::test]
    async fn put_get_purge() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SegmentCache::open(dir.path().join("segments")).unwrap();
        cache
            .put(&key(SegmentKind::Chunk, 1), Bytes::from_static(b"chunk-1"))
            .await
            .unwrap();
        cache
            .put(&key(SegmentKind::Keyframe, 1), Bytes::from_static(b"kf-1"))
            .await
            .unwrap();
        let other = CacheKey {
            match_id: 9,
            ..key(SegmentKind::Chunk, 1)
        };
        cache.put(&other, Bytes::from_static(b"other")).await.unwrap();

        assert_eq!(
            cache.get(&key(SegmentKind::Chunk, 1)).await.unwrap(),
            Bytes::from_static(b"chunk-1")
        );
        cache.remove(&key(SegmentKind::Keyframe, 1)).await.unwrap();
        // already gone
        cache.remove(&key(SegmentKind::Keyframe, 1)).await.unwrap();
        assert_eq!(cache.purge(1, 4242).await.unwrap(), 1);
        assert!(cache.get(&key(SegmentKind::Chunk, 1)).await.is_err());
        assert_eq!(cache.get(&other).await.unwrap(), Bytes::from_static(b"other"));
    }
}
