//! Process-wide logger
//!
//! [`Logger`] forwards to a [`SessionRegistry`] created on first use and kept
//! for the lifetime of the process. Libraries and tests that want isolation
//! should own a `SessionRegistry` instead.
//!
//! The `log_*!` macros capture the call site and format the message:
//!
//! ```no_run
//! use cocoon_log::{log_info, log_error, Logger, SessionConfig};
//!
//! # fn main() -> cocoon_log::Result<()> {
//! let _flush = Logger::flush_on_exit();
//! Logger::set_root_path("logs")?;
//! let net = Logger::create("net/client.log", SessionConfig::default())?;
//!
//! // to one session
//! log_info!(net, "connected to {}", "10.0.0.1")?;
//! // to every session of the process-wide registry
//! log_error!("shutting down after {} retries", 3)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::level::Level;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::{BufferTransform, CallSite};

static REGISTRY: Lazy<SessionRegistry> = Lazy::new(SessionRegistry::new);

/// Entry point to the process-wide session registry
#[derive(Debug, Clone, Copy)]
pub struct Logger;

impl Logger {
    /// The process-wide registry
    pub fn registry() -> &'static SessionRegistry {
        &REGISTRY
    }

    /// Directory sessions are created under
    pub fn root_path() -> PathBuf {
        REGISTRY.root_path()
    }

    /// Change the root directory, creating it if needed
    pub fn set_root_path(path: impl AsRef<Path>) -> Result<()> {
        REGISTRY.set_root_path(path)
    }

    /// Create the session `name`
    pub fn create(name: &str, config: SessionConfig) -> Result<SessionHandle> {
        REGISTRY.create(name, config)
    }

    /// Create the session `name` with a hook applied to every rendered record
    ///
    /// See [`SessionRegistry::create_with_transform`] for how this interacts
    /// with the index.
    pub fn create_with_transform(
        name: &str,
        config: SessionConfig,
        transform: BufferTransform,
    ) -> Result<SessionHandle> {
        REGISTRY.create_with_transform(name, config, transform)
    }

    /// Live session named `name`
    pub fn get(name: &str) -> Option<SessionHandle> {
        REGISTRY.get(name)
    }

    /// Write one record to every live session whose level permits it
    pub fn write(site: &CallSite<'_>, message: &str, level: Level) -> Result<()> {
        REGISTRY.write(site, message, level)
    }

    /// Sync every live session
    pub fn flush() -> Result<()> {
        REGISTRY.flush()
    }

    /// Guard that syncs every live session when dropped
    ///
    /// The registry itself is never dropped, so keep the guard at the top of
    /// `main` to get the final flush at exit.
    #[must_use = "sessions are flushed when the guard is dropped"]
    pub fn flush_on_exit() -> FlushGuard {
        FlushGuard { _private: () }
    }
}

/// Syncs every live session of the process-wide registry on drop
#[derive(Debug)]
pub struct FlushGuard {
    _private: (),
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if let Err(e) = Logger::flush() {
            tracing::warn!(error = %e, "final flush failed");
        }
    }
}

/// Fully qualified path of the enclosing function
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

/// [`CallSite`](crate::CallSite) of the macro invocation
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(
            ::std::concat!(::std::file!(), ":", ::std::line!()),
            $crate::function_name!(),
        )
    };
}

/// Write a formatted record at `level`, to a session or registry, or to the process-wide logger
#[macro_export]
macro_rules! log_at {
    ($level:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::Logger::write(&$crate::call_site!(), &::std::format!($fmt $(, $arg)*), $level)
    };
    ($level:expr, $target:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $target.write(&$crate::call_site!(), &::std::format!($fmt $(, $arg)*), $level)
    };
}

/// Write an info record
#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => {
        $crate::log_at!($crate::Level::Info, $($args)*)
    };
}

/// Write a debug record
#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => {
        $crate::log_at!($crate::Level::Debug, $($args)*)
    };
}

/// Write a warning record
#[macro_export]
macro_rules! log_warning {
    ($($args:tt)*) => {
        $crate::log_at!($crate::Level::Warning, $($args)*)
    };
}

/// Write an error record
#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => {
        $crate::log_at!($crate::Level::Error, $($args)*)
    };
}
