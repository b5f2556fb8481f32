//! Volume files and volume naming
//!
//! A volume is one physical file of a session, named
//! `<dir>/<stem>-<N>-<timestamp><ext>[.gz]`, or `.zst`/`.lz4` for the
//! other compression algorithms. While it is written the file
//! carries an extra `.active` suffix, which is removed by an atomic rename when
//! the volume is closed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::compression::StreamEncoder;
use crate::config::CompressionAlgorithm;
use crate::error::{Error, Result};

/// Suffix carried by a volume until it is closed
pub const ACTIVE_SUFFIX: &str = ".active";

/// Suffix appended to a volume path to name its index file
pub const INDEX_SUFFIX: &str = ".idx";

/// Split a session file name into the stem and the extension, at the first `.`
pub fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.find('.') {
        Some(pos) => file_name.split_at(pos),
        None => (file_name, ""),
    }
}

/// Number of digits used to render volume numbers up to `shift_after`
pub fn number_width(shift_after: u64) -> usize {
    shift_after.checked_ilog10().map_or(1, |d| d as usize + 1)
}

/// Path of the file while it is being written
pub fn active_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(ACTIVE_SUFFIX);
    PathBuf::from(name)
}

/// Path of an `.active` file once it is finished, `None` if it carries no suffix
pub fn finished_path(path: &Path) -> Option<PathBuf> {
    let name = path.to_str()?;
    name.strip_suffix(ACTIVE_SUFFIX).map(PathBuf::from)
}

/// Path of the index file paired with a volume
pub fn index_path(volume_path: &Path) -> PathBuf {
    let mut name = volume_path.as_os_str().to_os_string();
    name.push(INDEX_SUFFIX);
    PathBuf::from(name)
}

/// Produces the file names of one session's volumes
#[derive(Debug, Clone)]
pub struct VolumeNamer {
    dir: PathBuf,
    stem: String,
    ext: String,
    shift_after: u64,
}

impl VolumeNamer {
    /// Namer for volumes of `file_name` inside `dir`
    pub fn new(dir: impl Into<PathBuf>, file_name: &str, max_volume_number: u64) -> Self {
        let (stem, ext) = split_name(file_name);
        Self {
            dir: dir.into(),
            stem: stem.to_string(),
            ext: ext.to_string(),
            shift_after: max_volume_number.max(1),
        }
    }

    /// Directory holding the volumes
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session file name without extension
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Session file name extension, including the leading `.`
    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Largest number rendered with the current width
    pub fn shift_after(&self) -> u64 {
        self.shift_after
    }

    /// Current width of rendered volume numbers
    pub fn digits(&self) -> usize {
        number_width(self.shift_after)
    }

    /// Final path of volume `number`, widening the digit count when `number` outgrows it
    pub fn volume_path(&mut self, number: u64, timestamp: &str) -> PathBuf {
        while number > self.shift_after {
            self.shift_after = self.shift_after.saturating_mul(10).saturating_add(9);
        }

        let file_name = format!(
            "{}-{:0width$}-{}{}",
            self.stem,
            number,
            timestamp,
            self.ext,
            width = self.digits()
        );
        self.dir.join(file_name)
    }
}

/// How a volume file stores its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Compress through this algorithm, plain file if `None`
    pub compression: Option<CompressionAlgorithm>,
    /// Compression level
    pub level: i32,
    /// User-space buffer size, 0 for unbuffered writes
    pub buffer_size: usize,
}

impl VolumeSpec {
    /// Plain, unbuffered file
    pub fn plain() -> Self {
        Self {
            compression: None,
            level: 0,
            buffer_size: 0,
        }
    }

    /// Extension added for the compression algorithm, if any
    pub fn extension(&self) -> &'static str {
        self.compression.map_or("", |algo| algo.extension())
    }
}

/// An open volume
#[derive(Debug)]
pub enum VolumeFile {
    /// Bytes go to the file as they are
    Plain(PlainVolume),
    /// Bytes go through a compression stream
    Compressed(CompressedVolume),
}

/// Plain volume
#[derive(Debug)]
pub struct PlainVolume {
    writer: BufWriter<File>,
    path: PathBuf,
    active: PathBuf,
    pos: u64,
}

/// Compressed volume
#[derive(Debug)]
pub struct CompressedVolume {
    encoder: StreamEncoder,
    path: PathBuf,
    active: PathBuf,
    pos: u64,
    flush_each_write: bool,
}

/// Create `<path>.active` for exclusive writing
fn open_active(path: &Path) -> Result<(File, PathBuf)> {
    let active = active_path(path);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&active)
        .map_err(|e| Error::file(&active, e))?;

    file.try_lock_exclusive().map_err(|e| Error::file(&active, e))?;

    Ok((file, active))
}

impl VolumeFile {
    /// Create the volume that will be finished as `path` (plus the compression extension)
    pub fn create(path: &Path, spec: VolumeSpec) -> Result<Self> {
        match spec.compression {
            None => {
                let (file, active) = open_active(path)?;
                Ok(Self::Plain(PlainVolume {
                    writer: BufWriter::with_capacity(spec.buffer_size, file),
                    path: path.to_path_buf(),
                    active,
                    pos: 0,
                }))
            }
            Some(algorithm) => {
                let mut name = path.as_os_str().to_os_string();
                name.push(algorithm.extension());
                let path = PathBuf::from(name);

                let (file, active) = open_active(&path)?;
                let encoder = StreamEncoder::new(file, algorithm, spec.level)
                    .map_err(|e| Error::file(&active, e))?;
                Ok(Self::Compressed(CompressedVolume {
                    encoder,
                    path,
                    active,
                    pos: 0,
                    flush_each_write: spec.buffer_size == 0,
                }))
            }
        }
    }

    /// Append `buf`; a short write is an error
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Self::Plain(v) => {
                v.writer.write_all(buf).map_err(|e| Error::file(&v.active, e))?;
                v.pos += buf.len() as u64;
            }
            Self::Compressed(v) => {
                v.encoder.write_all(buf).map_err(|e| Error::file(&v.active, e))?;
                if v.flush_each_write {
                    v.encoder.flush().map_err(|e| Error::file(&v.active, e))?;
                }
                v.pos += buf.len() as u64;
            }
        }
        Ok(())
    }

    /// Push buffered bytes to the OS and wait until the data is durable
    pub fn fsync(&mut self) -> Result<()> {
        match self {
            Self::Plain(v) => {
                v.writer.flush().map_err(|e| Error::file(&v.active, e))?;
                v.writer.get_ref().sync_data().map_err(|e| Error::file(&v.active, e))?;
            }
            Self::Compressed(v) => {
                v.encoder.flush().map_err(|e| Error::file(&v.active, e))?;
                v.encoder.file().sync_data().map_err(|e| Error::file(&v.active, e))?;
            }
        }
        Ok(())
    }

    /// Bytes written so far; for compressed volumes this is the uncompressed stream position
    pub fn fpos(&self) -> u64 {
        match self {
            Self::Plain(v) => v.pos,
            Self::Compressed(v) => v.pos,
        }
    }

    /// Path the volume gets once closed
    pub fn path(&self) -> &Path {
        match self {
            Self::Plain(v) => &v.path,
            Self::Compressed(v) => &v.path,
        }
    }

    /// Path of the file while it is open
    pub fn active_path(&self) -> &Path {
        match self {
            Self::Plain(v) => &v.active,
            Self::Compressed(v) => &v.active,
        }
    }

    /// Whether bytes go through a compression stream
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed(_))
    }

    /// Flush, close the handle and rename the file to its final name
    pub fn close(self) -> Result<PathBuf> {
        let (active, path) = match self {
            Self::Plain(v) => {
                let file = v
                    .writer
                    .into_inner()
                    .map_err(|e| Error::file(&v.active, e.into_error()))?;
                drop(file);
                (v.active, v.path)
            }
            Self::Compressed(v) => {
                let file = v.encoder.finish().map_err(|e| Error::file(&v.active, e))?;
                drop(file);
                (v.active, v.path)
            }
        };

        fs::rename(&active, &path).map_err(|e| Error::file(&active, e))?;
        tracing::debug!(volume = %path.display(), "volume closed");

        Ok(path)
    }
}
