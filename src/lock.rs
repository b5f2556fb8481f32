//! Lock used around registry and session state
//!
//! A `parking_lot::Mutex`. With the `thread-safe` feature (the default) callers
//! block on it. Without the feature it is only ever try-locked, and a second
//! holder panics instead of waiting, so misuse from several threads is caught.

use parking_lot::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub(crate) struct Lock<T>(Mutex<T>);

impl<T> Lock<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    #[cfg(feature = "thread-safe")]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    #[cfg(not(feature = "thread-safe"))]
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        match self.0.try_lock() {
            Some(guard) => guard,
            None => panic!("cocoon_log built without `thread-safe` was entered concurrently or reentrantly"),
        }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }
}
