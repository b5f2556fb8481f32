//! Startup scan of a session directory
//!
//! Before a session opens its first volume it looks at what earlier runs left
//! behind: it finishes interrupted `.active` files, optionally deletes empty
//! leftovers and works out the next free volume number.
//!
//! An `.active` file whose exclusive lock is still held belongs to a live
//! writer (another session sharing the stem, or another process) and is left
//! alone.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};
use crate::volume;

/// Outcome of scanning a session directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number the next volume gets
    pub next_number: u64,
    /// Files belonging to the session that were kept
    pub files_found: usize,
    /// `.active` files renamed to their finished name
    pub renamed: Vec<PathBuf>,
    /// Empty files deleted
    pub removed: Vec<PathBuf>,
    /// `.active` files still locked by a writer
    pub in_use: Vec<PathBuf>,
}

/// Whether another handle holds the exclusive lock on `path`
fn held_by_writer(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|e| Error::file(path, e))?;

    match file.try_lock_exclusive() {
        // dropping the handle releases the lock
        Ok(()) => Ok(false),
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(true),
        Err(e) => Err(Error::file(path, e)),
    }
}

/// Extract the volume number from `<stem>-<digits>-...`
///
/// Returns `Ok(None)` when the file does not belong to the session.
pub fn parse_volume_number(file_name: &str, stem: &str) -> std::result::Result<Option<u64>, String> {
    let rest = match file_name
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('-'))
    {
        Some(rest) => rest,
        None => return Ok(None),
    };

    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return Ok(None);
    }

    rest[..digits_end]
        .parse::<u64>()
        .map(Some)
        .map_err(|e| format!("volume number of {:?} is unusable: {}", file_name, e))
}

/// Scan `dir` for volumes of `stem`
///
/// Every `.active` file nobody holds is renamed to its finished form. With
/// `remove_empty`, zero-length files are deleted and not counted. Locked
/// `.active` files are counted but neither renamed nor deleted. The next volume number is the
/// largest number seen plus one, or 0 for an empty directory.
pub fn recover(dir: &Path, stem: &str, remove_empty: bool) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();
    let mut max_number: Option<u64> = None;

    let entries = fs::read_dir(dir)
        .map_err(|e| Error::recovery(dir, format!("cannot list directory: {}", e)))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::recovery(dir, format!("cannot read directory entry: {}", e)))?;
        let path = entry.path();

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        let number = match parse_volume_number(&file_name, stem) {
            Ok(Some(number)) => number,
            Ok(None) => continue,
            Err(message) => return Err(Error::recovery(&path, message)),
        };

        let metadata = entry
            .metadata()
            .map_err(|e| Error::recovery(&path, format!("cannot stat file: {}", e)))?;
        if !metadata.is_file() {
            continue;
        }

        let finished = volume::finished_path(&path);
        if finished.is_some() && held_by_writer(&path)? {
            tracing::debug!(file = %path.display(), "volume still being written, left in place");
            report.in_use.push(path);
            report.files_found += 1;
            max_number = Some(max_number.map_or(number, |max| max.max(number)));
            continue;
        }

        if remove_empty && metadata.len() == 0 {
            fs::remove_file(&path).map_err(|e| Error::file(&path, e))?;
            tracing::info!(file = %path.display(), "removed empty volume");
            report.removed.push(path);
            continue;
        }

        if let Some(finished) = finished {
            fs::rename(&path, &finished).map_err(|e| Error::file(&path, e))?;
            tracing::info!(from = %path.display(), to = %finished.display(), "finished interrupted volume");
            report.renamed.push(finished);
        }

        report.files_found += 1;
        max_number = Some(max_number.map_or(number, |max| max.max(number)));
    }

    report.next_number = match max_number {
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| Error::recovery(dir, "volume numbers exhausted"))?,
        None => 0,
    };

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{VolumeFile, VolumeSpec};
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_volume_number() {
        assert_eq!(parse_volume_number("s-00042-2018.12.11-13.58.59", "s"), Ok(Some(42)));
        assert_eq!(parse_volume_number("s-7-t.log.zst", "s"), Ok(Some(7)));
        assert_eq!(parse_volume_number("s-0", "s"), Ok(Some(0)));
        assert_eq!(parse_volume_number("s-x-t", "s"), Ok(None));
        assert_eq!(parse_volume_number("other-1-t", "s"), Ok(None));
        assert_eq!(parse_volume_number("s1-1-t", "s"), Ok(None));
        assert!(parse_volume_number("s-99999999999999999999999-t", "s").is_err());
    }

    #[test]
    fn test_empty_directory_starts_at_zero() {
        let dir = tempdir().unwrap();
        let report = recover(dir.path(), "s", false).unwrap();
        assert_eq!(report.next_number, 0);
        assert_eq!(report.files_found, 0);
    }

    #[test]
    fn test_next_number_follows_largest() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "s-00000-t0", b"x");
        touch(dir.path(), "s-00001-t1", b"x");
        touch(dir.path(), "s-00004-t4.log.zst", b"x");
        touch(dir.path(), "other-00009-t", b"x");

        let report = recover(dir.path(), "s", false).unwrap();
        assert_eq!(report.next_number, 5);
        assert_eq!(report.files_found, 3);
    }

    #[test]
    fn test_active_files_are_finished() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "s-00000-t0", b"x");
        let active = touch(dir.path(), "s-00001-t1.active", b"crashed");

        let report = recover(dir.path(), "s", true).unwrap();
        assert_eq!(report.next_number, 2);
        assert_eq!(report.renamed, vec![dir.path().join("s-00001-t1")]);
        assert!(!active.exists());
        assert_eq!(fs::read(dir.path().join("s-00001-t1")).unwrap(), b"crashed");
    }

    #[test]
    fn test_empty_files_removed_and_not_counted() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "s-00000-t0", b"x");
        let empty = touch(dir.path(), "s-00001-t1", b"");
        let empty_active = touch(dir.path(), "s-00002-t2.active", b"");

        let report = recover(dir.path(), "s", true).unwrap();
        assert_eq!(report.next_number, 1);
        assert_eq!(report.removed.len(), 2);
        assert!(!empty.exists());
        assert!(!empty_active.exists());
    }

    #[test]
    fn test_empty_files_kept_without_option() {
        let dir = tempdir().unwrap();
        let empty = touch(dir.path(), "s-00003-t3", b"");

        let report = recover(dir.path(), "s", false).unwrap();
        assert_eq!(report.next_number, 4);
        assert!(empty.exists());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_locked_active_file_left_in_place() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "s-00000-t0", b"x");
        let live = VolumeFile::create(&dir.path().join("s-00001-t1.log"), VolumeSpec::plain()).unwrap();
        let active = live.active_path().to_path_buf();

        let report = recover(dir.path(), "s", true).unwrap();
        assert_eq!(report.next_number, 2);
        assert_eq!(report.files_found, 2);
        assert_eq!(report.in_use, vec![active.clone()]);
        assert!(report.renamed.is_empty());
        // empty, but held by its writer
        assert!(report.removed.is_empty());
        assert!(active.exists());

        live.close().unwrap();
        assert!(dir.path().join("s-00001-t1.log").exists());
    }

    #[test]
    fn test_released_active_file_is_finished() {
        let dir = tempdir().unwrap();
        let live = VolumeFile::create(&dir.path().join("s-00000-t0"), VolumeSpec::plain()).unwrap();
        let active = live.active_path().to_path_buf();
        drop(live);

        let report = recover(dir.path(), "s", false).unwrap();
        assert!(report.in_use.is_empty());
        assert_eq!(report.renamed, vec![dir.path().join("s-00000-t0")]);
        assert!(!active.exists());
    }

    #[test]
    fn test_missing_directory_is_recovery_error() {
        let dir = tempdir().unwrap();
        let err = recover(&dir.path().join("nope"), "s", false).unwrap_err();
        assert!(err.is_recovery_error());
    }
}
