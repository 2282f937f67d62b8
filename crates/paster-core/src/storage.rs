//! Output file lifecycle: write to `<path>.part`, sync, then rename into place.
//!
//! A failed write never leaves a half-written image under the final name; the
//! temp file is removed and any previous output is kept.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `all.png` → `all.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

fn write_and_sync(temp: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp)
        .with_context(|| format!("failed to create temp file: {}", temp.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("failed to write {}", temp.display()))?;
    file.sync_all().context("storage sync failed")?;
    Ok(())
}

/// Write `bytes` to `final_path` atomically. Fails if the parent directory is missing.
pub fn write_atomic(final_path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = temp_path(final_path);
    let res = write_and_sync(&temp, bytes).and_then(|()| {
        std::fs::rename(&temp, final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp.display(),
                final_path.display()
            )
        })
    });
    if res.is_err() {
        if let Err(e) = std::fs::remove_file(&temp) {
            tracing::debug!("could not remove {}: {}", temp.display(), e);
        }
    }
    res
}
