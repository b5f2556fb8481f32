//! Configuration for cocoon_log sessions
//!
//! This module provides the option flags and the per-session configuration
//! applied when a session is created.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::datetime::{DateOrder, Resolution, TimestampFormat};
use crate::error::{Error, Result};
use crate::level::Level;

/// Largest volume number written with the initial digit width
pub const DEFAULT_MAX_VOLUME_NUMBER: u64 = 99_999;

/// Default size of the user-space write buffer of plain volumes
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

bitflags! {
    /// Behaviour switches fixed at session creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Options: u32 {
        /// Seconds timestamp resolution (default)
        const SEC_RES = 1 << 0;
        /// Milliseconds timestamp resolution
        const MSEC_RES = 1 << 1;
        /// Microseconds timestamp resolution
        const USEC_RES = 1 << 2;
        /// Nanoseconds timestamp resolution
        const NSEC_RES = 1 << 3;
        /// Delete zero-length volumes left by a previous run
        const REMOVE_EMPTY_LOGS = 1 << 4;
        /// Sync the volume to disk after every record
        const FSYNC_EACH_RECORD = 1 << 5;
        /// Same as `FSYNC_EACH_RECORD`
        const FLUSH_EACH_RECORD = 1 << 6;
        /// Compress volumes
        const COMPRESS = 1 << 7;
        /// Keep the full source path instead of the file name
        const FULL_SOURCE_NAME = 1 << 8;
        /// Use the fully qualified function name
        const FULL_FUNC_NAME = 1 << 9;
        /// Maintain a binary index next to each volume
        const CREATE_INDEX_FILE = 1 << 10;
        /// Bypass the user-space write buffer
        const UNBUFFERED = 1 << 11;
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::SEC_RES
    }
}

impl Options {
    /// All resolution flags
    pub const RESOLUTIONS: Options = Options::SEC_RES
        .union(Options::MSEC_RES)
        .union(Options::USEC_RES)
        .union(Options::NSEC_RES);

    /// Whether every record is followed by a sync
    pub fn sync_each_record(&self) -> bool {
        self.intersects(Self::FSYNC_EACH_RECORD | Self::FLUSH_EACH_RECORD)
    }
}

/// Compression algorithms available for compressed volumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum CompressionAlgorithm {
    /// gzip stream, readable by standard tools
    Gzip,
    /// LZ4 frames, fastest
    Lz4,
    /// Zstandard, better ratio than LZ4
    Zstd,
}

impl Default for CompressionAlgorithm {
    fn default() -> Self {
        Self::Gzip
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl CompressionAlgorithm {
    /// Parse a compression algorithm from a string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gzip" | "gz" => Ok(Self::Gzip),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            _ => Err(Error::config(format!("Unknown compression algorithm: {}", s))),
        }
    }

    /// Get the name of the compression algorithm
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// File extension appended to compressed volumes
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => ".gz",
            Self::Lz4 => ".lz4",
            Self::Zstd => ".zst",
        }
    }

    /// Detect the algorithm from a finished volume's file name
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        [Self::Gzip, Self::Lz4, Self::Zstd]
            .into_iter()
            .find(|algo| name.ends_with(algo.extension()))
    }
}

/// Configuration of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct SessionConfig {
    /// A volume is closed once this many bytes were written into it
    pub volume_size: u64,
    /// Largest volume number rendered with the initial digit width
    pub max_volume_number: u64,
    /// Behaviour switches
    pub options: Options,
    /// Initial threshold level
    pub level: Level,
    /// Algorithm used when `Options::COMPRESS` is set
    pub compression_algorithm: CompressionAlgorithm,
    /// Compression level (0-9, higher = better compression)
    pub compression_level: i32,
    /// Size of the write buffer of plain volumes in bytes
    pub buffer_size: usize,
    /// Order of the calendar fields in timestamps
    pub date_order: DateOrder,
    /// Render timestamps in UTC instead of local time
    pub utc: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            volume_size: u32::MAX as u64,
            max_volume_number: DEFAULT_MAX_VOLUME_NUMBER,
            options: Options::default(),
            level: Level::default(),
            compression_algorithm: CompressionAlgorithm::default(),
            compression_level: 3,
            buffer_size: DEFAULT_BUFFER_SIZE,
            date_order: DateOrder::default(),
            utc: false,
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the volume size in bytes
    pub fn with_volume_size(mut self, size: u64) -> Self {
        self.volume_size = size;
        self
    }

    /// Set the largest volume number rendered with the initial digit width
    pub fn with_max_volume_number(mut self, number: u64) -> Self {
        self.max_volume_number = number;
        self
    }

    /// Replace the option flags
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set the initial threshold level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the compression algorithm
    pub fn with_compression_algorithm(mut self, algorithm: CompressionAlgorithm) -> Self {
        self.compression_algorithm = algorithm;
        self
    }

    /// Set the compression level
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Set the write buffer size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the order of the calendar fields
    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    /// Render timestamps in UTC
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.volume_size == 0 {
            return Err(Error::config("Volume size must be at least 1 byte"));
        }

        if self.max_volume_number == 0 {
            return Err(Error::config("Maximum volume number must be at least 1"));
        }

        if (self.options & Options::RESOLUTIONS).bits().count_ones() > 1 {
            return Err(Error::config(format!(
                "Only one timestamp resolution may be selected, got {:?}",
                self.options & Options::RESOLUTIONS
            )));
        }

        if self.compression_level < 0 || self.compression_level > 9 {
            return Err(Error::config("Compression level must be between 0 and 9"));
        }

        Ok(())
    }

    /// Timestamp resolution selected by the options
    pub fn resolution(&self) -> Resolution {
        Resolution::from_options(self.options)
    }

    /// Layout of the `[timestamp]` field of records
    pub fn record_timestamp_format(&self) -> TimestampFormat {
        TimestampFormat::new(self.date_order, self.resolution())
    }

    /// Layout of the timestamp embedded in volume file names
    pub fn volume_timestamp_format(&self) -> TimestampFormat {
        TimestampFormat::new(self.date_order, Resolution::Seconds)
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== Session Configuration ===\n\n");

        result.push_str("Volumes:\n");
        result.push_str(&format!("  Volume Size: {} bytes\n", self.volume_size));
        result.push_str(&format!("  Max Volume Number: {}\n", self.max_volume_number));
        result.push_str(&format!("  Buffer Size: {} bytes\n", self.buffer_size));
        result.push_str(&format!("  Unbuffered: {}\n", self.options.contains(Options::UNBUFFERED)));
        result.push_str(&format!("  Remove Empty Logs: {}\n", self.options.contains(Options::REMOVE_EMPTY_LOGS)));
        result.push_str(&format!("  Sync Each Record: {}\n", self.options.sync_each_record()));

        result.push_str("\nCompression:\n");
        result.push_str(&format!("  Enabled: {}\n", self.options.contains(Options::COMPRESS)));
        result.push_str(&format!("  Algorithm: {}\n", self.compression_algorithm));
        result.push_str(&format!("  Level: {}\n", self.compression_level));

        result.push_str("\nRecords:\n");
        result.push_str(&format!("  Level: {}\n", self.level));
        result.push_str(&format!("  Resolution: {:?}\n", self.resolution()));
        result.push_str(&format!("  Date Order: {:?}\n", self.date_order));
        result.push_str(&format!("  UTC: {}\n", self.utc));
        result.push_str(&format!("  Full Source Name: {}\n", self.options.contains(Options::FULL_SOURCE_NAME)));
        result.push_str(&format!("  Full Function Name: {}\n", self.options.contains(Options::FULL_FUNC_NAME)));
        result.push_str(&format!("  Index File: {}\n", self.options.contains(Options::CREATE_INDEX_FILE)));

        result
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::file(path.as_ref(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(feature = "toml")]
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize to TOML: {}", e)))?;

        std::fs::write(path.as_ref(), content).map_err(|e| Error::file(path.as_ref(), e))?;

        Ok(())
    }
}
