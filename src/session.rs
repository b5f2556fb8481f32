//! Sessions: named log streams writing rotating volumes
//!
//! A [`Session`] owns the volume it currently writes (and the paired index
//! file when indexing is enabled). Every accepted record is rendered as
//!
//! ```text
//! [<timestamp>][<level char>][<file:line>][<function>]: <message>\n
//! ```
//!
//! and appended to the volume. Once the bytes written to a volume reach the
//! configured volume size, the volume is closed (renamed off `.active`) and
//! the next number is opened.
//!
//! All mutable state sits behind a per-session lock, so a handle can be shared
//! between threads and written concurrently.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use crate::config::{Options, SessionConfig};
use crate::datetime::{TimestampFormat, TIMESTAMP_BUF_LEN};
use crate::error::{Error, Result};
use crate::index::{IndexRecord, MAX_FIELD_LEN};
use crate::level::Level;
use crate::lock::Lock;
use crate::recovery;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::volume::{self, VolumeFile, VolumeNamer, VolumeSpec};

/// Session name that creates a session which never writes
pub const DISABLED_SESSION_NAME: &str = "disable";

/// Hook rewriting a rendered record before it reaches the volume
pub type BufferTransform = Box<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Origin of a record
///
/// Carries both the full and the short rendering of the source location and
/// the function name; the session options pick which one is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallSite<'a> {
    /// `path/to/file.rs:line`
    pub file_line: &'a str,
    /// `file.rs:line`
    pub short_file_line: &'a str,
    /// Fully qualified function path
    pub func: &'a str,
    /// Last segment of the function path
    pub short_func: &'a str,
}

impl<'a> CallSite<'a> {
    /// Build a call site from the full forms, deriving the short ones
    pub fn new(file_line: &'a str, func: &'a str) -> Self {
        let short_file_line = file_line
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(file_line);
        let short_func = func.rsplit("::").next().unwrap_or(func);

        Self {
            file_line,
            short_file_line,
            func,
            short_func,
        }
    }

    fn location(&self, options: Options) -> &'a str {
        if options.contains(Options::FULL_SOURCE_NAME) {
            self.file_line
        } else {
            self.short_file_line
        }
    }

    fn function(&self, options: Options) -> &'a str {
        if options.contains(Options::FULL_FUNC_NAME) {
            self.func
        } else {
            self.short_func
        }
    }
}

/// Cut `field` to what an index record can describe, on a char boundary
fn clip_field(field: &str) -> &str {
    if field.len() <= MAX_FIELD_LEN {
        return field;
    }
    let mut end = MAX_FIELD_LEN;
    while !field.is_char_boundary(end) {
        end -= 1;
    }
    &field[..end]
}

/// Reject names that would escape the root directory
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::config("session name can't be empty"));
    }

    let path = Path::new(name);
    if path.has_root() || path.is_absolute() {
        return Err(Error::config(format!("session name can't be an absolute path: {}", name)));
    }

    if path.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(Error::config(format!(
            "session name may only hold plain path components: {}",
            name
        )));
    }

    Ok(())
}

/// Echo a rendered record to stdout or stderr
fn echo(prefix: &str, level: Level, record: &[u8]) {
    fn put<W: Write>(out: &mut W, prefix: &str, record: &[u8]) -> io::Result<()> {
        if !prefix.is_empty() {
            write!(out, "<{}>", prefix)?;
        }
        out.write_all(record)?;
        out.flush()
    }

    let result = if level.is_stderr() {
        put(&mut io::stderr().lock(), prefix, record)
    } else {
        put(&mut io::stdout().lock(), prefix, record)
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "terminal echo failed");
    }
}

struct SessionState {
    namer: VolumeNamer,
    volume_number: u64,
    /// Bytes written into the current volume
    written: u64,
    volume: Option<VolumeFile>,
    index: Option<VolumeFile>,
    /// Prefix for terminal echo, `None` when echo is off
    term: Option<String>,
    /// Reused render buffer
    record: Vec<u8>,
}

/// A named log stream
pub struct Session {
    name: String,
    config: SessionConfig,
    disabled: bool,
    level: AtomicU8,
    record_format: TimestampFormat,
    volume_format: TimestampFormat,
    transform: Option<BufferTransform>,
    state: Lock<SessionState>,
    stats: SessionStats,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("disabled", &self.disabled)
            .field("transform", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create the session `name` under `root`
    ///
    /// Scans the session directory for volumes of earlier runs, then opens the
    /// first volume. The name `"disable"` creates a session at `Level::Disable`
    /// that opens nothing.
    pub(crate) fn create(
        root: &Path,
        name: &str,
        config: SessionConfig,
        transform: Option<BufferTransform>,
    ) -> Result<Self> {
        config.validate()?;
        validate_name(name)?;

        let path = root.join(name);
        let dir = path.parent().unwrap_or(root).to_path_buf();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::config(format!("session name has no file name: {}", name)))?
            .to_string();

        let namer = VolumeNamer::new(&dir, &file_name, config.max_volume_number);
        let disabled = name == DISABLED_SESSION_NAME;
        let level = if disabled { Level::Disable } else { config.level };

        let session = Self {
            name: name.to_string(),
            disabled,
            level: AtomicU8::new(level as u8),
            record_format: config.record_timestamp_format(),
            volume_format: config.volume_timestamp_format(),
            transform,
            state: Lock::new(SessionState {
                namer,
                volume_number: 0,
                written: 0,
                volume: None,
                index: None,
                term: None,
                record: Vec::with_capacity(256),
            }),
            stats: SessionStats::new(),
            config,
        };

        if disabled {
            tracing::debug!(session = %session.name, "created disabled session");
            return Ok(session);
        }

        fs::create_dir_all(&dir).map_err(|e| Error::file(&dir, e))?;

        let report = recovery::recover(
            &dir,
            volume::split_name(&file_name).0,
            session.config.options.contains(Options::REMOVE_EMPTY_LOGS),
        )?;

        {
            let mut state = session.state.lock();
            state.volume_number = report.next_number;
            session.open_volume(&mut state)?;
        }

        tracing::debug!(
            session = %session.name,
            next_number = report.next_number,
            renamed = report.renamed.len(),
            removed = report.removed.len(),
            "session created"
        );

        Ok(session)
    }

    fn volume_spec(&self) -> VolumeSpec {
        let options = self.config.options;
        VolumeSpec {
            compression: options
                .contains(Options::COMPRESS)
                .then_some(self.config.compression_algorithm),
            level: self.config.compression_level,
            buffer_size: if options.contains(Options::UNBUFFERED) {
                0
            } else {
                self.config.buffer_size
            },
        }
    }

    /// Open volume `state.volume_number` and its index
    fn open_volume(&self, state: &mut SessionState) -> Result<()> {
        let mut ts = [0u8; TIMESTAMP_BUF_LEN];
        let len = self.volume_format.format_now(self.config.utc, &mut ts);
        let ts = String::from_utf8_lossy(&ts[..len]);

        let path = state.namer.volume_path(state.volume_number, &ts);
        let spec = self.volume_spec();

        let volume = VolumeFile::create(&path, spec)?;
        let index = if self.config.options.contains(Options::CREATE_INDEX_FILE) {
            let index_spec = VolumeSpec {
                compression: None,
                ..spec
            };
            Some(VolumeFile::create(&volume::index_path(&path), index_spec)?)
        } else {
            None
        };

        tracing::debug!(session = %self.name, volume = %volume.active_path().display(), "volume opened");

        state.volume = Some(volume);
        state.index = index;
        state.written = 0;
        self.stats.volume_opened();

        Ok(())
    }

    /// Close the current volume and its index
    fn close_volume(state: &mut SessionState) -> Result<()> {
        if let Some(volume) = state.volume.take() {
            volume.close()?;
        }
        if let Some(index) = state.index.take() {
            index.close()?;
        }
        Ok(())
    }

    /// Write one record
    ///
    /// The record is dropped when `level` is not permitted by the session's
    /// threshold, and always on the `"disable"` session. With
    /// `FSYNC_EACH_RECORD` or `FLUSH_EACH_RECORD` the volume is synced before
    /// returning. Reaching the volume size rotates to the next volume.
    ///
    /// Index records describe the record as rendered, before any buffer
    /// transform, while their start offset is the volume position after the
    /// transformed bytes of earlier records. With a transform that changes
    /// the record length the index no longer locates the fields.
    pub fn write(&self, site: &CallSite<'_>, message: &str, level: Level) -> Result<()> {
        if self.disabled || !self.level().permits(level) {
            self.stats.record_filtered();
            return Ok(());
        }

        let started = Instant::now();
        let options = self.config.options;
        let indexed = options.contains(Options::CREATE_INDEX_FILE);

        let mut location = site.location(options);
        let mut function = site.function(options);
        if indexed {
            location = clip_field(location);
            function = clip_field(function);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let volume = state
            .volume
            .as_mut()
            .ok_or_else(|| Error::other(format!("session {} has no open volume", self.name)))?;

        let mut ts = [0u8; TIMESTAMP_BUF_LEN];
        let ts_len = self.record_format.format_now(self.config.utc, &mut ts);

        let record = &mut state.record;
        record.clear();
        record.push(b'[');
        record.extend_from_slice(&ts[..ts_len]);
        record.extend_from_slice(b"][");
        record.push(level.as_char() as u8);
        record.extend_from_slice(b"][");
        record.extend_from_slice(location.as_bytes());
        record.extend_from_slice(b"][");
        record.extend_from_slice(function.as_bytes());
        record.extend_from_slice(b"]: ");
        record.extend_from_slice(message.as_bytes());
        record.push(b'\n');

        if let Some(prefix) = &state.term {
            echo(prefix, level, record.as_slice());
        }

        let index_record = if indexed {
            Some(IndexRecord::for_record(
                volume.fpos(),
                ts_len,
                location.len(),
                function.len(),
                message.len(),
            )?)
        } else {
            None
        };

        let bytes: Cow<'_, [u8]> = match &self.transform {
            Some(transform) => Cow::Owned(transform(record.as_slice())),
            None => Cow::Borrowed(record.as_slice()),
        };

        volume.write(&bytes)?;

        if let (Some(index), Some(index_record)) = (state.index.as_mut(), index_record) {
            index.write(&index_record.to_bytes())?;
            self.stats.index_record_written();
        }

        if options.sync_each_record() {
            volume.fsync()?;
            if let Some(index) = state.index.as_mut() {
                index.fsync()?;
            }
            self.stats.synced();
        }

        let written = bytes.len() as u64;
        state.written += written;
        self.stats.record_written(written, started.elapsed());

        if state.written >= self.config.volume_size {
            tracing::debug!(
                session = %self.name,
                volume_number = state.volume_number,
                written = state.written,
                "rotating volume"
            );
            state.written = 0;
            Self::close_volume(state)?;
            state.volume_number += 1;
            self.open_volume(state)?;
        }

        Ok(())
    }

    /// Sync the current volume and its index without rotating
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut synced = false;
        if let Some(volume) = state.volume.as_mut() {
            volume.fsync()?;
            synced = true;
        }
        if let Some(index) = state.index.as_mut() {
            index.fsync()?;
        }
        if synced {
            self.stats.synced();
        }

        Ok(())
    }

    /// Echo every accepted record to the terminal, wrapped in `<prefix>` when non-empty
    ///
    /// Info and debug records go to stdout, warnings and errors to stderr.
    pub fn to_term(&self, enabled: bool, prefix: &str) {
        self.state.lock().term = enabled.then(|| prefix.to_string());
    }

    /// Change the threshold level
    ///
    /// The `"disable"` session stays at `Level::Disable`.
    pub fn set_level(&self, level: Level) {
        if self.disabled {
            tracing::trace!(session = %self.name, %level, "level change ignored on disabled session");
            return;
        }
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Current threshold level
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Level::Disable)
    }

    /// Name of the current threshold level
    pub fn level_str(&self) -> &'static str {
        self.level().as_str()
    }

    /// Session name as given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether this is the no-op `"disable"` session
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Final path of the volume being written
    pub fn volume_path(&self) -> Option<PathBuf> {
        self.state.lock().volume.as_ref().map(|v| v.path().to_path_buf())
    }

    /// Final path of the index being written
    pub fn index_path(&self) -> Option<PathBuf> {
        self.state.lock().index.as_ref().map(|v| v.path().to_path_buf())
    }

    /// Number of the volume being written
    pub fn volume_number(&self) -> u64 {
        self.state.lock().volume_number
    }

    /// Snapshot of the write counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        if let Some(volume) = state.volume.as_mut() {
            if let Err(e) = volume.fsync() {
                tracing::warn!(session = %self.name, error = %e, "failed to flush volume on drop");
            }
        }

        if let Err(e) = Self::close_volume(state) {
            tracing::warn!(session = %self.name, error = %e, "failed to close volume on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgorithm;
    use crate::index::IndexReader;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn site() -> CallSite<'static> {
        CallSite::new("src/app/main.rs:42", "app::main::run")
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_call_site_short_forms() {
        let site = CallSite::new("src/app/main.rs:42", "app::main::run");
        assert_eq!(site.short_file_line, "main.rs:42");
        assert_eq!(site.short_func, "run");

        let site = CallSite::new("main.rs:1", "run");
        assert_eq!(site.short_file_line, "main.rs:1");
        assert_eq!(site.short_func, "run");
    }

    #[test]
    fn test_clip_field_respects_char_boundary() {
        let ascii = "a".repeat(300);
        assert_eq!(clip_field(&ascii).len(), 255);

        let wide = "é".repeat(200);
        let clipped = clip_field(&wide);
        assert_eq!(clipped.len(), 254);
        assert!(clipped.chars().all(|c| c == 'é'));

        assert_eq!(clip_field("short"), "short");
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempdir().unwrap();
        for name in ["", "/abs/path", "../escape", "a/../b", "./a"] {
            let err = Session::create(dir.path(), name, SessionConfig::default(), None).unwrap_err();
            assert!(err.is_config_error(), "{:?} should be rejected", name);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new().with_volume_size(0);
        let err = Session::create(dir.path(), "s", config, None).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_record_format() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), "s", SessionConfig::default(), None).unwrap();

        session.write(&site(), "hello world", Level::Info).unwrap();
        session.write(&site(), "careful", Level::Warning).unwrap();
        session.flush().unwrap();

        let path = session.volume_path().unwrap();
        let lines = read_lines(&volume::active_path(&path));
        assert_eq!(lines.len(), 2);

        // [2018.12.11-13.58.59][I][main.rs:42][run]: hello world
        assert_eq!(lines[0].len(), 1 + 19 + "][I][main.rs:42][run]: hello world".len());
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("][I][main.rs:42][run]: hello world"));
        assert!(lines[1].ends_with("][W][main.rs:42][run]: careful"));
    }

    #[test]
    fn test_full_names_option() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new()
            .with_options(Options::MSEC_RES | Options::FULL_SOURCE_NAME | Options::FULL_FUNC_NAME);
        let session = Session::create(dir.path(), "s", config, None).unwrap();

        session.write(&site(), "x", Level::Info).unwrap();
        session.flush().unwrap();

        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert!(lines[0].ends_with("][I][src/app/main.rs:42][app::main::run]: x"));
        assert_eq!(lines[0].find(']'), Some(1 + 23));
    }

    #[test]
    fn test_rotation_scenario() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new().with_volume_size(100);
        let session = Session::create(dir.path(), "s", config, None).unwrap();
        assert_eq!(session.volume_number(), 0);

        // every record is 31 bytes plus the message with an empty call site
        let empty = CallSite::default();
        session.write(&empty, "a", Level::Info).unwrap();
        session.write(&empty, "bb", Level::Debug).unwrap();
        session.write(&empty, "c", Level::Warning).unwrap();
        assert_eq!(session.volume_number(), 0);
        session.write(&empty, "dd", Level::Error).unwrap();
        assert_eq!(session.volume_number(), 1);
        session.flush().unwrap();

        let names = files(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("s-00000-"));
        assert!(!names[0].ends_with(volume::ACTIVE_SUFFIX));
        assert!(names[1].starts_with("s-00001-"));
        assert!(names[1].ends_with(volume::ACTIVE_SUFFIX));

        assert_eq!(fs::metadata(dir.path().join(&names[0])).unwrap().len(), 130);
        assert_eq!(fs::metadata(dir.path().join(&names[1])).unwrap().len(), 0);

        let stats = session.stats();
        assert_eq!(stats.records_written, 4);
        assert_eq!(stats.bytes_written, 130);
        assert_eq!(stats.volumes_opened, 2);
    }

    #[test]
    fn test_drop_finishes_active_volume() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), "s", SessionConfig::default(), None).unwrap();
        session.write(&site(), "bye", Level::Info).unwrap();
        let path = session.volume_path().unwrap();
        drop(session);

        assert!(path.exists());
        assert!(!volume::active_path(&path).exists());
        assert_eq!(read_lines(&path).len(), 1);
    }

    #[test]
    fn test_level_filter() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new().with_level(Level::Warning);
        let session = Session::create(dir.path(), "s", config, None).unwrap();
        assert_eq!(session.level_str(), "warning");

        for level in Level::ALL {
            session.write(&site(), level.as_str(), level).unwrap();
        }
        session.flush().unwrap();

        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": error"));
        assert!(lines[1].ends_with(": warning"));
        assert_eq!(session.stats().records_filtered, 3);

        session.set_level(Level::Disable);
        session.write(&site(), "dropped", Level::Error).unwrap();
        session.set_level(Level::Info);
        session.write(&site(), "kept", Level::Info).unwrap();
        session.flush().unwrap();

        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with(": kept"));
    }

    #[test]
    fn test_recovery_continues_numbering() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("s-00000-2018.12.11-13.58.59"), b"old\n").unwrap();
        fs::write(dir.path().join("s-00001-2018.12.11-13.59.00"), b"old\n").unwrap();
        fs::write(dir.path().join("s-00002-2018.12.11-13.59.01.active"), b"crashed\n").unwrap();

        let session = Session::create(dir.path(), "s", SessionConfig::default(), None).unwrap();
        assert_eq!(session.volume_number(), 3);
        assert!(dir.path().join("s-00002-2018.12.11-13.59.01").exists());
        assert!(!dir.path().join("s-00002-2018.12.11-13.59.01.active").exists());

        drop(session);
        let session = Session::create(dir.path(), "s", SessionConfig::default(), None).unwrap();
        assert_eq!(session.volume_number(), 4);
    }

    #[test]
    fn test_remove_empty_logs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("s-00000-2018.12.11-13.58.59"), b"old\n").unwrap();
        fs::write(dir.path().join("s-00001-2018.12.11-13.59.00"), b"").unwrap();

        let config = SessionConfig::new().with_options(Options::SEC_RES | Options::REMOVE_EMPTY_LOGS);
        let session = Session::create(dir.path(), "s", config, None).unwrap();
        assert_eq!(session.volume_number(), 1);
        assert!(!dir.path().join("s-00001-2018.12.11-13.59.00").exists());
    }

    #[test]
    fn test_subdirectory_name_and_extension() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), "net/client.log", SessionConfig::default(), None).unwrap();

        let path = session.volume_path().unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join("net"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("client-00000-"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_index_round_trip() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new().with_options(Options::USEC_RES | Options::CREATE_INDEX_FILE);
        let session = Session::create(dir.path(), "s.log", config, None).unwrap();

        let long_func = "f".repeat(400);
        let sites = [
            CallSite::new("a.rs:1", "m::alpha"),
            CallSite::new("b.rs:2", "m::beta"),
            CallSite::new("c.rs:3", &long_func),
        ];
        let messages = ["first", "second with [brackets]", ""];

        for (site, msg) in sites.iter().zip(messages) {
            session.write(site, msg, Level::Debug).unwrap();
        }
        let volume_path = session.volume_path().unwrap();
        assert_eq!(session.index_path().unwrap(), volume::index_path(&volume_path));
        drop(session);

        let mut reader = IndexReader::open(&volume_path).unwrap();
        assert_eq!(reader.len(), 3);

        let records: Vec<_> = reader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(records[0].file_line, "a.rs:1");
        assert_eq!(records[0].func, "alpha");
        assert_eq!(records[0].level, 'D');
        assert_eq!(records[0].data, "first");
        assert_eq!(records[0].datetime.len(), 26);
        assert_eq!(records[1].data, "second with [brackets]");
        assert_eq!(records[2].func.len(), 255);
        assert_eq!(records[2].data, "");
    }

    #[test]
    fn test_compressed_session() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new()
            .with_options(Options::SEC_RES | Options::COMPRESS | Options::CREATE_INDEX_FILE)
            .with_compression_algorithm(CompressionAlgorithm::Lz4);
        let session = Session::create(dir.path(), "z", config, None).unwrap();

        for i in 0..50 {
            session.write(&site(), &format!("record number {}", i), Level::Info).unwrap();
        }
        session.flush().unwrap();
        let volume_path = session.volume_path().unwrap();
        assert!(volume_path.to_str().unwrap().ends_with(".lz4"));
        drop(session);

        let mut reader = IndexReader::open(&volume_path).unwrap();
        assert_eq!(reader.len(), 50);
        assert_eq!(reader.get(49).unwrap().data, "record number 49");
    }

    #[test]
    fn test_compressed_session_defaults_to_gzip() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new()
            .with_volume_size(200)
            .with_options(Options::SEC_RES | Options::COMPRESS | Options::CREATE_INDEX_FILE);
        let session = Session::create(dir.path(), "g.log", config, None).unwrap();

        let first = session.volume_path().unwrap();
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("g-00000-"));
        assert!(name.ends_with(".log.gz"));

        for i in 0..10 {
            session.write(&site(), &format!("gzip record {}", i), Level::Info).unwrap();
        }
        assert!(session.volume_number() > 0);
        drop(session);

        assert!(first.exists());
        assert!(!volume::active_path(&first).exists());
        let mut reader = IndexReader::open(&first).unwrap();
        assert!(reader.len() > 0);
        assert_eq!(reader.get(0).unwrap().data, "gzip record 0");
    }

    #[test]
    fn test_buffer_transform() {
        let dir = tempdir().unwrap();
        let transform: BufferTransform = Box::new(|bytes: &[u8]| bytes.to_ascii_uppercase());
        let session = Session::create(dir.path(), "t", SessionConfig::default(), Some(transform)).unwrap();

        session.write(&site(), "quiet", Level::Info).unwrap();
        session.flush().unwrap();

        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert!(lines[0].ends_with("][I][MAIN.RS:42][RUN]: QUIET"));
    }

    #[test]
    fn test_length_preserving_transform_keeps_index_usable() {
        let dir = tempdir().unwrap();
        let transform: BufferTransform = Box::new(|bytes: &[u8]| bytes.to_ascii_uppercase());
        let config = SessionConfig::new().with_options(Options::SEC_RES | Options::CREATE_INDEX_FILE);
        let session = Session::create(dir.path(), "t", config, Some(transform)).unwrap();

        session.write(&site(), "one", Level::Info).unwrap();
        session.write(&site(), "two", Level::Warning).unwrap();
        let volume_path = session.volume_path().unwrap();
        drop(session);

        let mut reader = IndexReader::open(&volume_path).unwrap();
        assert_eq!(reader.len(), 2);
        let second = reader.get(1).unwrap();
        assert_eq!(second.file_line, "MAIN.RS:42");
        assert_eq!(second.data, "TWO");
    }

    #[test]
    fn test_sync_each_record() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new()
            .with_options(Options::SEC_RES | Options::FSYNC_EACH_RECORD | Options::UNBUFFERED);
        let session = Session::create(dir.path(), "s", config, None).unwrap();

        session.write(&site(), "durable", Level::Info).unwrap();
        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert_eq!(lines.len(), 1);
        assert_eq!(session.stats().syncs, 1);
    }

    #[test]
    fn test_disabled_session() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), DISABLED_SESSION_NAME, SessionConfig::default(), None).unwrap();

        assert!(session.is_disabled());
        assert_eq!(session.level(), Level::Disable);
        assert!(session.volume_path().is_none());

        session.write(&site(), "nothing", Level::Error).unwrap();
        session.flush().unwrap();
        assert!(files(dir.path()).is_empty());
    }

    #[test]
    fn test_disabled_session_ignores_level_changes() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), DISABLED_SESSION_NAME, SessionConfig::default(), None).unwrap();

        session.set_level(Level::Info);
        assert_eq!(session.level(), Level::Disable);

        session.write(&site(), "still nothing", Level::Info).unwrap();
        session.flush().unwrap();
        assert_eq!(session.stats().records_written, 0);
        assert!(files(dir.path()).is_empty());
    }

    #[test]
    fn test_terminal_echo_does_not_disturb_volume() {
        let dir = tempdir().unwrap();
        let session = Session::create(dir.path(), "s", SessionConfig::default(), None).unwrap();
        session.to_term(true, "test");

        session.write(&site(), "to both", Level::Info).unwrap();
        session.write(&site(), "to both, on stderr", Level::Error).unwrap();
        session.to_term(false, "");
        session.flush().unwrap();

        let lines = read_lines(&volume::active_path(&session.volume_path().unwrap()));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_concurrent_writers() {
        let dir = tempdir().unwrap();
        let config = SessionConfig::new().with_volume_size(4096);
        let session = Arc::new(Session::create(dir.path(), "s", config, None).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let session = session.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        session.write(&site(), &format!("thread {} line {}", t, i), Level::Info).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(session);

        let mut total = 0;
        for name in files(dir.path()) {
            assert!(!name.ends_with(volume::ACTIVE_SUFFIX));
            let lines = read_lines(&dir.path().join(name));
            assert!(lines.iter().all(|l| l.contains("][I][main.rs:42][run]: thread ")));
            total += lines.len();
        }
        assert_eq!(total, 400);
    }
}
