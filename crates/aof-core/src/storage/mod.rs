//! Disk I/O and file lifecycle.
//!
//! Containers and cached segments are written to a `.part` temp file, synced,
//! then renamed into place so readers never observe a truncated file.

mod cache;

pub use cache::{CacheKey, SegmentCache};

use std::io::Write;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `EUW-1.aof` → `EUW-1.aof.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Write `data` to `final_path` atomically: temp file, fsync, rename.
/// On error the temp file is removed and the final path is left untouched.
pub fn write_atomic(final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tp = temp_path(final_path);
    let result = (|| {
        let mut f = std::fs::File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tp)?;
        f.write_all(data)?;
        f.sync_all()?;
        drop(f);
        std::fs::rename(&tp, final_path)
    })();
    if result.is_err() {
        let _ = std::fs::remove_file(&tp);
    }
    result
}
