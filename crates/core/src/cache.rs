//! Versioned overlay cache.
//!
//! Originals are never written. Each [`OverlayCache::materialize`] call
//! produces a fresh copy named `{name}-{timestamp}{ext}` in the cache root
//! and deletes the copies it supersedes. Deletion is best-effort, since an
//! older copy may still be held open by a running process.
//!
//! Two processes sharing a cache root may race on pruning; nothing locks
//! the directory.

use crate::error::{EnhanceError, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{debug, info};

/// Overlay timestamps have at least this many digits (`yyyyMMddHHmmss`).
const MIN_TIMESTAMP_DIGITS: usize = 14;

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct OverlayCache {
    root: PathBuf,
}

impl OverlayCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `original` into the cache under a new timestamped name and
    /// returns the copy's path.
    pub fn materialize(&self, original: &Path) -> Result<PathBuf> {
        let write_error = |cause: io::Error| EnhanceError::CacheWrite {
            original: original.to_path_buf(),
            cause,
        };

        let (name, ext) = overlay_name(original).ok_or_else(|| {
            write_error(io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))
        })?;
        fs::create_dir_all(&self.root).map_err(write_error)?;

        self.prune(original, &name, &ext).map_err(write_error)?;

        let target = self.fresh_path(&name, &ext).map_err(write_error)?;
        copy_atomically(original, &self.root, &target).map_err(write_error)?;
        debug!("Materialized {} as {}", original.display(), target.display());
        Ok(target)
    }

    /// File name shared by every copy of `original`, without the timestamp.
    ///
    /// Two originals with the same overlay name would prune each other's copies.
    pub fn overlay_name(original: &Path) -> Option<String> {
        overlay_name(original).map(|(name, ext)| format!("{name}{ext}"))
    }

    /// The newest cached copy of `original`, if any.
    pub fn current(&self, original: &Path) -> Option<PathBuf> {
        let (name, ext) = overlay_name(original)?;
        fs::read_dir(&self.root)
            .ok()?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let file_name = e.file_name();
                let stamp = copy_stamp(file_name.to_str()?, &name, &ext)?.to_string();
                Some((stamp, e.path()))
            })
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(|(_, path)| path)
    }

    /// Deletes every existing copy of `name`. Failures are logged and ignored.
    fn prune(&self, original: &Path, name: &str, ext: &str) -> io::Result<()> {
        let original = fs::canonicalize(original).unwrap_or_else(|_| original.to_path_buf());
        for entry in fs::read_dir(&self.root)? {
            let Ok(entry) = entry else { continue };
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if copy_stamp(file_name, name, ext).is_none() {
                continue;
            }

            let path = entry.path();
            if fs::canonicalize(&path).is_ok_and(|p| p == original) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => debug!("Pruned stale overlay {}", path.display()),
                Err(e) => info!("Could not delete stale overlay {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    fn fresh_path(&self, name: &str, ext: &str) -> io::Result<PathBuf> {
        loop {
            let path = self.root.join(format!("{name}-{}{ext}", next_timestamp()?));
            if !path.exists() {
                return Ok(path);
            }
        }
    }
}

/// Splits an archive path into its overlay name and extension (with the dot).
///
/// `lib.jar` and `lib-20240101120000000.jar` both yield `("lib", ".jar")`.
fn overlay_name(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let name = match stem.rsplit_once('-') {
        Some((base, stamp))
            if !base.is_empty()
                && stamp.len() >= MIN_TIMESTAMP_DIGITS
                && stamp.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => stem,
    };
    Some((name.to_string(), ext))
}

/// The digits of `file_name` when it is a copy `{name}-{digits}{ext}`.
fn copy_stamp<'a>(file_name: &'a str, name: &str, ext: &str) -> Option<&'a str> {
    let stamp = file_name
        .strip_prefix(name)?
        .strip_prefix('-')?
        .strip_suffix(ext)?;
    (!stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit())).then_some(stamp)
}

/// UTC `yyyyMMddHHmmssSSS`, strictly increasing within the process.
fn next_timestamp() -> io::Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    let millis = loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break next,
            Err(actual) => last = actual,
        }
    };
    format_timestamp(millis)
}

fn format_timestamp(millis: u64) -> io::Result<String> {
    let format = time::format_description::parse(
        "[year][month][day][hour][minute][second][subsecond digits:3]",
    )
    .map_err(io::Error::other)?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(io::Error::other)?
        .format(&format)
        .map_err(io::Error::other)
}

/// Writes `original` into a temporary file in `dir` and renames it to `target`.
fn copy_atomically(original: &Path, dir: &Path, target: &Path) -> io::Result<()> {
    let metadata = fs::metadata(original)?;
    let mut source = File::open(original)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    io::copy(&mut source, temp.as_file_mut())?;
    temp.as_file_mut().flush()?;

    if let Ok(modified) = metadata.modified() {
        temp.as_file().set_modified(modified)?;
    }
    fs::set_permissions(temp.path(), metadata.permissions())?;
    temp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_name() {
        let split = |p: &str| overlay_name(Path::new(p)).unwrap();
        assert_eq!(split("lib.jar"), ("lib".into(), ".jar".into()));
        assert_eq!(split("/a/b/lib-1.2.jar"), ("lib-1.2".into(), ".jar".into()));
        assert_eq!(split("lib-20240101120000123.jar"), ("lib".into(), ".jar".into()));
        assert_eq!(split("lib-20200101.jar"), ("lib-20200101".into(), ".jar".into()));
        assert_eq!(split("rt"), ("rt".into(), "".into()));
        assert_eq!(
            OverlayCache::overlay_name(Path::new("x/lib.jar")),
            OverlayCache::overlay_name(Path::new("y/lib-20240101120000000.jar"))
        );
    }

    #[test]
    fn test_copy_stamp() {
        assert_eq!(copy_stamp("lib-20200101.jar", "lib", ".jar"), Some("20200101"));
        assert_eq!(copy_stamp("lib-sources-1.jar", "lib", ".jar"), None);
        assert_eq!(copy_stamp("lib.jar", "lib", ".jar"), None);
        assert_eq!(copy_stamp("lib-.jar", "lib", ".jar"), None);
        assert_eq!(copy_stamp("lib-1.zip", "lib", ".jar"), None);
    }

    #[test]
    fn test_timestamp_format() {
        // 2024-01-02T03:04:05.006Z
        assert_eq!(format_timestamp(1_704_164_645_006).unwrap(), "20240102030405006");
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let stamps: Vec<String> = (0..50).map(|_| next_timestamp().unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
