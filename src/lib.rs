//! # cocoon_log
//!
//! Embeddable structured logger. Records are written by named sessions into
//! rotating volumes on disk, optionally compressed and optionally paired with a
//! binary index for random access.
//!
//! ## Features
//!
//! - **Sessions**: independent log streams with their own volume size, level
//!   threshold and options, discoverable by name through a registry
//! - **Rotation**: numbered volumes with a growing digit width, written under
//!   an `.active` suffix and renamed when finished
//! - **Recovery**: interrupted volumes from a previous run are finished and
//!   numbering continues after the last volume
//! - **Compression**: gzip, zstd or LZ4 streams per volume
//! - **Index**: fixed-size records locating every field of every line
//!
//! ## Example
//!
//! ```no_run
//! use cocoon_log::{log_info, Level, Options, SessionConfig, SessionRegistry};
//!
//! # fn main() -> cocoon_log::Result<()> {
//! let registry = SessionRegistry::with_root("logs")?;
//! let config = SessionConfig::new()
//!     .with_volume_size(64 * 1024 * 1024)
//!     .with_options(Options::MSEC_RES | Options::CREATE_INDEX_FILE)
//!     .with_level(Level::Debug);
//!
//! let session = registry.create("app.log", config)?;
//! log_info!(session, "started with {} workers", 4)?;
//! session.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod config;
pub mod datetime;
pub mod error;
pub mod index;
pub mod level;
pub mod logger;
pub mod recovery;
pub mod registry;
pub mod session;
pub mod stats;
pub mod volume;

mod lock;

pub use config::{CompressionAlgorithm, Options, SessionConfig};
pub use datetime::{DateOrder, Resolution, TimestampFormat};
pub use error::{Error, Result};
pub use index::{IndexData, IndexReader, IndexRecord};
pub use level::Level;
pub use logger::{FlushGuard, Logger};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{BufferTransform, CallSite, Session};
pub use stats::StatsSnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
