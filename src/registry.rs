//! Table of named sessions
//!
//! The registry resolves session names to live sessions without keeping them
//! alive: it stores weak references and hands out strong [`SessionHandle`]s.
//! Entries whose session was dropped are pruned lazily, whenever the table is
//! walked.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::level::Level;
use crate::lock::Lock;
use crate::session::{BufferTransform, CallSite, Session};

/// Shared handle to a session
pub type SessionHandle = Arc<Session>;

#[derive(Debug)]
struct RegistryInner {
    root_path: PathBuf,
    sessions: HashMap<String, Weak<Session>>,
}

impl RegistryInner {
    fn prune(&mut self) {
        self.sessions.retain(|name, session| {
            let alive = session.strong_count() > 0;
            if !alive {
                tracing::trace!(session = %name, "pruned dropped session");
            }
            alive
        });
    }

    fn live(&mut self) -> impl Iterator<Item = SessionHandle> + '_ {
        self.prune();
        self.sessions.values().filter_map(Weak::upgrade)
    }
}

/// Registry of named sessions sharing one root directory
#[derive(Debug)]
pub struct SessionRegistry {
    inner: Lock<RegistryInner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create a registry rooted at the current directory
    pub fn new() -> Self {
        Self {
            inner: Lock::new(RegistryInner {
                root_path: PathBuf::from("."),
                sessions: HashMap::new(),
            }),
        }
    }

    /// Create a registry rooted at `path`, creating the directory if needed
    pub fn with_root(path: impl AsRef<Path>) -> Result<Self> {
        let registry = Self::new();
        registry.set_root_path(path)?;
        Ok(registry)
    }

    /// Directory sessions are created under
    pub fn root_path(&self) -> PathBuf {
        self.inner.lock().root_path.clone()
    }

    /// Change the root directory for sessions created from now on
    pub fn set_root_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::create_dir_all(path).map_err(|e| Error::file(path, e))?;
        self.inner.lock().root_path = path.to_path_buf();
        Ok(())
    }

    /// Create the session `name`
    ///
    /// Fails with [`Error::SessionExists`] while a session of that name is
    /// still referenced. The returned handle is what keeps the session alive.
    pub fn create(&self, name: &str, config: SessionConfig) -> Result<SessionHandle> {
        self.create_session(name, config, None)
    }

    /// Create the session `name` with a hook applied to every rendered record
    ///
    /// Index entries keep describing the untransformed record, so with
    /// `Options::CREATE_INDEX_FILE` the transform must not change the record
    /// length or the index stops matching the volume.
    pub fn create_with_transform(
        &self,
        name: &str,
        config: SessionConfig,
        transform: BufferTransform,
    ) -> Result<SessionHandle> {
        self.create_session(name, config, Some(transform))
    }

    fn create_session(
        &self,
        name: &str,
        config: SessionConfig,
        transform: Option<BufferTransform>,
    ) -> Result<SessionHandle> {
        let mut inner = self.inner.lock();

        if inner
            .sessions
            .get(name)
            .map_or(false, |session| session.strong_count() > 0)
        {
            return Err(Error::session_exists(name));
        }

        let session = Arc::new(Session::create(&inner.root_path, name, config, transform)?);
        inner
            .sessions
            .insert(name.to_string(), Arc::downgrade(&session));

        Ok(session)
    }

    /// Live session named `name`
    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        let mut inner = self.inner.lock();

        let session = inner.sessions.get(name).and_then(Weak::upgrade);
        if session.is_none() {
            inner.sessions.remove(name);
        }
        session
    }

    /// Write one record to every live session whose level permits it
    ///
    /// Every permitted session is attempted; the first failure is returned.
    pub fn write(&self, site: &CallSite<'_>, message: &str, level: Level) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut first_error = None;

        for session in inner.live() {
            if !session.level().permits(level) {
                continue;
            }
            if let Err(e) = session.write(site, message, level) {
                tracing::warn!(session = %session.name(), error = %e, "write failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Sync every live session
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut first_error = None;

        for session in inner.live() {
            if let Err(e) = session.flush() {
                tracing::warn!(session = %session.name(), error = %e, "flush failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Names of the live sessions, sorted
    pub fn session_names(&self) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.prune();

        let mut names: Vec<String> = inner.sessions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.prune();
        inner.sessions.len()
    }

    /// Whether no session is alive
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush sessions on registry drop");
        }
    }
}
